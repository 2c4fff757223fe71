use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{Fils, NewWalletTransaction, Wallet, WalletTransaction, WalletTxType},
    traits::{IntegrityReport, PaymentLedgerDatabase, PaymentLedgerError},
};

/// How many times a same-wallet race is retried before giving up. Conflicts are rare and resolve
/// on the first retry in practice.
const MAX_CONFLICT_RETRIES: usize = 3;

/// `WalletApi` is the ledger-engine entry point for wallet balance arithmetic.
pub struct WalletApi<B> {
    db: B,
}

impl<B> Debug for WalletApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WalletApi")
    }
}

impl<B> WalletApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> WalletApi<B>
where B: PaymentLedgerDatabase
{
    pub async fn wallet(&self, customer_id: &str) -> Result<Option<Wallet>, PaymentLedgerError> {
        self.db.fetch_wallet(customer_id).await
    }

    /// The customer's spendable balance. A customer without a wallet has a zero balance.
    pub async fn balance(&self, customer_id: &str) -> Result<Fils, PaymentLedgerError> {
        let balance = self.db.fetch_wallet(customer_id).await?.map(|w| w.balance).unwrap_or_default();
        Ok(balance)
    }

    /// Applies a ledger entry to the customer's wallet, creating the wallet on first use.
    ///
    /// The write is atomic; when a concurrent finalization moves the balance first, the whole
    /// unit is recomputed and retried rather than patched, so the arithmetic never drifts.
    pub async fn apply_transaction(
        &self,
        customer_id: &str,
        tx_type: WalletTxType,
        amount: Fils,
        description: Option<String>,
        reference: Option<String>,
        metadata: Option<String>,
    ) -> Result<WalletTransaction, PaymentLedgerError> {
        let wallet = self.db.fetch_or_create_wallet(customer_id).await?;
        let mut attempt = 0;
        loop {
            let mut transaction = NewWalletTransaction::new(wallet.id, tx_type, amount);
            transaction.description = description.clone();
            transaction.reference = reference.clone();
            transaction.metadata = metadata.clone();
            match self.db.apply_wallet_transaction(transaction).await {
                Err(PaymentLedgerError::ConcurrencyConflict(id)) if attempt < MAX_CONFLICT_RETRIES => {
                    attempt += 1;
                    debug!("👛️ Wallet #{id} was modified concurrently. Retrying ({attempt}/{MAX_CONFLICT_RETRIES})");
                },
                other => return other,
            }
        }
    }

    pub async fn history(&self, customer_id: &str) -> Result<Vec<WalletTransaction>, PaymentLedgerError> {
        self.db.wallet_history(customer_id).await
    }

    /// Replays the customer's ledger and checks it against the stored balance. A failure here is
    /// structural corruption: the wallet is deactivated pending manual review, and the error must
    /// never be "fixed" by overwriting the balance.
    pub async fn verify_integrity(&self, customer_id: &str) -> Result<IntegrityReport, PaymentLedgerError> {
        let report = self.db.verify_wallet_integrity(customer_id).await?;
        info!(
            "👛️ Ledger verified for {}: {} transactions replay to {}",
            report.customer_id, report.transaction_count, report.replayed_balance
        );
        Ok(report)
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
