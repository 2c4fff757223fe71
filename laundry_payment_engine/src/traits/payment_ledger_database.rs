use chrono::Duration;
use log::warn;
use thiserror::Error;

use crate::{
    db_types::{
        Fils,
        NewPaymentRecord,
        NewWalletTransaction,
        Order,
        OrderId,
        OrderItem,
        PaymentMethod,
        PaymentRecord,
        PaymentStatus,
        Wallet,
        WalletTransaction,
        WalletTxStatus,
    },
    traits::data_objects::{FinalizeOutcome, IntegrityReport, OrderUpdate, RecordQueryFilter, RemoteStatusOutcome},
};

/// This trait defines the storage behaviour backing the payment engine.
///
/// This behaviour includes:
/// * Wallet ledger arithmetic: applying, reserving and finalizing ledger entries as single atomic
///   units, serialized per wallet.
/// * Payment record lifecycle: creation, idempotent remote-status application, and search.
/// * The derived order payment status, recomputed from the record set and written nowhere else.
///
/// Every mutation is independently atomic: a batch caller may be stopped between calls without
/// corrupting state, and two overlapping callers racing on the same record must converge because
/// each transition is guarded by an is-already-in-target-state check before side effects apply.
#[allow(async_fn_in_trait)]
pub trait PaymentLedgerDatabase: Clone {
    /// The URL of the database
    fn url(&self) -> &str;

    //--------------------------------------   Wallet ledger   ---------------------------------------------------

    /// Fetches the wallet for the given customer, if one exists.
    async fn fetch_wallet(&self, customer_id: &str) -> Result<Option<Wallet>, PaymentLedgerError>;

    /// Fetches the wallet for the given customer, creating an empty active wallet if none exists.
    async fn fetch_or_create_wallet(&self, customer_id: &str) -> Result<Wallet, PaymentLedgerError>;

    /// Applies a ledger entry immediately: computes the new balance from the entry type, writes
    /// the Completed `WalletTransaction` and the updated `Wallet` row as one atomic unit.
    ///
    /// Preconditions: the wallet must be active and the amount non-negative; for Withdrawal,
    /// Payment and Transfer entries the amount must not exceed the current balance
    /// (`InsufficientBalance` otherwise). Adjustment entries set the balance to `amount` directly.
    ///
    /// A concurrent balance write on the same wallet surfaces as `ConcurrencyConflict`; the
    /// caller retries the whole unit.
    async fn apply_wallet_transaction(
        &self,
        transaction: NewWalletTransaction,
    ) -> Result<WalletTransaction, PaymentLedgerError>;

    /// Records intent without moving money: writes a Pending ledger entry whose delta will be
    /// applied if and when [`Self::finalize_wallet_transaction`] completes it. Used to reserve a
    /// wallet top-up at gateway-charge initiation time.
    async fn reserve_wallet_transaction(
        &self,
        transaction: NewWalletTransaction,
    ) -> Result<WalletTransaction, PaymentLedgerError>;

    /// Settles a Pending ledger entry to Completed (applying its delta to the wallet balance
    /// exactly once) or Failed (leaving the balance untouched), in a single atomic unit.
    ///
    /// Idempotent: finalizing an entry that is already final reports
    /// [`FinalizeOutcome::AlreadyFinal`] and changes nothing. `outcome` must be a final status.
    async fn finalize_wallet_transaction(
        &self,
        transaction_id: i64,
        outcome: WalletTxStatus,
    ) -> Result<FinalizeOutcome, PaymentLedgerError>;

    /// Replays the wallet's Completed entries in creation order, asserting that every
    /// balance_before/balance_after pair chains correctly and that the final replayed balance
    /// equals the stored balance.
    ///
    /// Any mismatch is structural corruption, not a retryable error: the wallet is deactivated to
    /// halt further automatic mutation, and `IntegrityError` is returned for manual review.
    async fn verify_wallet_integrity(&self, customer_id: &str) -> Result<IntegrityReport, PaymentLedgerError>;

    /// All ledger entries for the customer's wallet, in creation order.
    async fn wallet_history(&self, customer_id: &str) -> Result<Vec<WalletTransaction>, PaymentLedgerError>;

    //--------------------------------------  Payment records  ---------------------------------------------------

    /// Persists a new payment record with Pending status.
    async fn insert_payment_record(&self, record: NewPaymentRecord) -> Result<PaymentRecord, PaymentLedgerError>;

    async fn fetch_payment_record(&self, id: i64) -> Result<Option<PaymentRecord>, PaymentLedgerError>;

    /// Finds the record carrying the given gateway correlation id (charge or invoice id).
    async fn fetch_record_by_correlation(&self, correlation_id: &str)
        -> Result<Option<PaymentRecord>, PaymentLedgerError>;

    /// The most recent record of the given method for the order. Used by invoice deduplication.
    async fn latest_record_for_order(
        &self,
        order_id: &OrderId,
        method: PaymentMethod,
    ) -> Result<Option<PaymentRecord>, PaymentLedgerError>;

    /// All records for the order, in creation order.
    async fn records_for_order(&self, order_id: &OrderId) -> Result<Vec<PaymentRecord>, PaymentLedgerError>;

    /// Open (Pending/InProgress) gateway-backed records created within the given window. This is
    /// the batch sweep's work list; the window bound keeps the scan from growing without limit.
    async fn open_gateway_records(&self, window: Duration) -> Result<Vec<PaymentRecord>, PaymentLedgerError>;

    /// Records matching the filter, in creation order.
    async fn search_payment_records(&self, filter: RecordQueryFilter)
        -> Result<Vec<PaymentRecord>, PaymentLedgerError>;

    /// Stores a recovered gateway correlation id on a record that was created without one.
    async fn set_correlation_id(&self, record_id: i64, correlation_id: &str) -> Result<(), PaymentLedgerError>;

    /// The single idempotent status-application routine shared by the batch sweep, the targeted
    /// sync and the webhook path. In one atomic unit it:
    /// * is a no-op if the record is already in `new_status`;
    /// * rejects non-monotonic transitions (`IllegalStatusTransition`), except that a downgrade
    ///   towards an open state is swallowed as a no-op since remote truth may simply be lagging;
    /// * persists the new status and the raw response snapshot;
    /// * on a transition into Paid with a linked Pending wallet transaction, finalizes that
    ///   transaction (applying the ledger delta exactly once); on a transition into Failed, marks
    ///   the linked Pending transaction Failed.
    async fn apply_remote_status(
        &self,
        record_id: i64,
        new_status: PaymentStatus,
        raw_response: Option<&str>,
        failure_reason: Option<&str>,
    ) -> Result<RemoteStatusOutcome, PaymentLedgerError>;

    /// Settles the order's deferred wallet contributions once gateway money has arrived.
    ///
    /// A Wallet-method record created at invoice time only reserves the customer's balance; the
    /// reserved funds move exactly once, when the gateway side of the split settles and this is
    /// called. Idempotent (already-settled contributions are untouched); a contribution that can
    /// no longer settle (the wallet was spent or frozen in the meantime) is logged and skipped,
    /// leaving the order partial for manual review.
    async fn collect_wallet_contributions(&self, order_id: &OrderId) -> Result<usize, PaymentLedgerError> {
        let records = self.records_for_order(order_id).await?;
        let mut settled = 0;
        for record in records
            .into_iter()
            .filter(|r| {
                r.method == PaymentMethod::Wallet
                    && r.status.is_open()
                    && r.wallet_transaction_id.is_some()
                    && !r.is_refund()
            })
        {
            match self.apply_remote_status(record.id, PaymentStatus::Paid, None, None).await {
                Ok(outcome) if outcome.changed => settled += 1,
                Ok(_) => {},
                Err(e) => {
                    warn!("👛️ Could not settle wallet contribution #{} for order {order_id}: {e}", record.id)
                },
            }
        }
        Ok(settled)
    }

    //--------------------------------------       Orders      ---------------------------------------------------

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, PaymentLedgerError>;

    async fn fetch_order_items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>, PaymentLedgerError>;

    /// Sets the payment method on the order. The payment *status* is not writable through this
    /// call; it only ever changes through [`Self::recompute_order_payment`].
    async fn set_order_payment_method(
        &self,
        order_id: &OrderId,
        method: PaymentMethod,
    ) -> Result<Order, PaymentLedgerError>;

    /// Recomputes the order's derived payment status from its full record set and persists it.
    /// This is the only writer of `orders.payment_status`.
    async fn recompute_order_payment(&self, order_id: &OrderId) -> Result<OrderUpdate, PaymentLedgerError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), PaymentLedgerError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum PaymentLedgerError {
    #[error("We have an internal database engine error (configuration/uptime etc.): {0}")]
    DatabaseError(String),
    #[error("No wallet exists for customer {0}")]
    WalletNotFound(String),
    #[error("The wallet for customer {0} is inactive and cannot be mutated")]
    WalletInactive(String),
    #[error("Insufficient balance: {requested} requested but only {available} available")]
    InsufficientBalance { available: Fils, requested: Fils },
    #[error("Ledger integrity violation: {0}")]
    IntegrityError(String),
    #[error("Concurrent modification of wallet {0}. Retry the operation.")]
    ConcurrencyConflict(i64),
    #[error("Invalid request: {0}")]
    ValidationError(String),
    #[error("Payment status may not move from {from} to {to}")]
    IllegalStatusTransition { from: PaymentStatus, to: PaymentStatus },
    #[error("The requested payment record {0} does not exist")]
    RecordNotFound(i64),
    #[error("The requested wallet transaction {0} does not exist")]
    TransactionNotFound(i64),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
}

impl From<sqlx::Error> for PaymentLedgerError {
    fn from(e: sqlx::Error) -> Self {
        PaymentLedgerError::DatabaseError(e.to_string())
    }
}
