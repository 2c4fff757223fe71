//! `SqliteDatabase` is the concrete SQLite backend for the laundry payment engine.
//!
//! Every mutating method is a single `pool.begin()` … `commit()` unit, so a reconciliation batch
//! can be stopped between records without corrupting state, and a timeout inside one record's
//! update rolls the whole record back rather than leaving it half-written.
use std::fmt::Debug;

use chrono::Duration;
use log::*;
use sqlx::{SqliteConnection, SqlitePool};

use super::db::{db_url, new_pool, orders, payment_records, wallets};
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
        WalletTxType,
    },
    helpers::aggregate_order_payment,
    traits::{
        FinalizeOutcome,
        IntegrityReport,
        OrderUpdate,
        PaymentLedgerDatabase,
        PaymentLedgerError,
        RecordQueryFilter,
        RemoteStatusOutcome,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

/// Computes the balance a Completed entry of this type leaves behind, enforcing the ledger
/// preconditions. `Adjustment` sets the balance to the amount directly; everything else moves it
/// by the amount in the direction the type implies.
fn applied_balance(wallet: &Wallet, tx_type: WalletTxType, amount: Fils) -> Result<Fils, PaymentLedgerError> {
    if amount.is_negative() {
        return Err(PaymentLedgerError::ValidationError(format!(
            "Transaction amounts are magnitudes and may not be negative (got {amount})"
        )));
    }
    let new_balance = match tx_type {
        WalletTxType::Deposit | WalletTxType::Refund => wallet.balance + amount,
        WalletTxType::Withdrawal | WalletTxType::Payment | WalletTxType::Transfer => {
            if amount > wallet.balance {
                return Err(PaymentLedgerError::InsufficientBalance {
                    available: wallet.balance,
                    requested: amount,
                });
            }
            wallet.balance - amount
        },
        WalletTxType::Adjustment => amount,
    };
    Ok(new_balance)
}

async fn active_wallet(wallet_id: i64, conn: &mut SqliteConnection) -> Result<Wallet, PaymentLedgerError> {
    let wallet = wallets::fetch_wallet_by_id(wallet_id, conn)
        .await?
        .ok_or_else(|| PaymentLedgerError::WalletNotFound(format!("wallet id {wallet_id}")))?;
    if !wallet.is_active {
        return Err(PaymentLedgerError::WalletInactive(wallet.customer_id));
    }
    Ok(wallet)
}

/// Settles a Pending ledger row inside the caller's transaction. Returns the updated row and
/// whether the wallet balance moved.
async fn settle_pending_transaction(
    wtx: WalletTransaction,
    outcome: WalletTxStatus,
    conn: &mut SqliteConnection,
) -> Result<(WalletTransaction, bool), PaymentLedgerError> {
    match outcome {
        WalletTxStatus::Failed => {
            let row = wallets::finalize_transaction_row(
                wtx.id,
                WalletTxStatus::Failed,
                wtx.balance_before,
                wtx.balance_after,
                conn,
            )
            .await?;
            debug!("👛️ Wallet transaction #{} marked Failed. No balance movement.", row.id);
            Ok((row, false))
        },
        WalletTxStatus::Completed => {
            let wallet = active_wallet(wtx.wallet_id, &mut *conn).await?;
            let new_balance = applied_balance(&wallet, wtx.tx_type, wtx.amount)?;
            let row = wallets::finalize_transaction_row(
                wtx.id,
                WalletTxStatus::Completed,
                wallet.balance,
                new_balance,
                &mut *conn,
            )
            .await?;
            wallets::update_balance(wallet.id, wallet.balance, new_balance, conn).await?;
            debug!(
                "👛️ Wallet transaction #{} completed. Wallet #{} balance {} -> {new_balance}",
                row.id, wallet.id, wallet.balance
            );
            Ok((row, true))
        },
        WalletTxStatus::Pending => Err(PaymentLedgerError::ValidationError(
            "A transaction cannot be finalized to Pending".to_string(),
        )),
    }
}

impl PaymentLedgerDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn fetch_wallet(&self, customer_id: &str) -> Result<Option<Wallet>, PaymentLedgerError> {
        let mut conn = self.pool.acquire().await?;
        let wallet = wallets::fetch_wallet_for_customer(customer_id, &mut conn).await?;
        Ok(wallet)
    }

    async fn fetch_or_create_wallet(&self, customer_id: &str) -> Result<Wallet, PaymentLedgerError> {
        let mut tx = self.pool.begin().await?;
        let wallet = wallets::fetch_or_create_wallet(customer_id, &mut tx).await?;
        tx.commit().await?;
        Ok(wallet)
    }

    async fn apply_wallet_transaction(
        &self,
        transaction: NewWalletTransaction,
    ) -> Result<WalletTransaction, PaymentLedgerError> {
        let mut tx = self.pool.begin().await?;
        let wallet = active_wallet(transaction.wallet_id, &mut tx).await?;
        let new_balance = applied_balance(&wallet, transaction.tx_type, transaction.amount)?;
        if transaction.tx_type == WalletTxType::Adjustment {
            warn!(
                "👛️ ADJUSTMENT on wallet #{} ({}): balance set from {} to {new_balance}. Reference: {}",
                wallet.id,
                wallet.customer_id,
                wallet.balance,
                transaction.reference.as_deref().unwrap_or("none")
            );
        }
        let row =
            wallets::insert_transaction(&transaction, WalletTxStatus::Completed, wallet.balance, new_balance, &mut tx)
                .await?;
        wallets::update_balance(wallet.id, wallet.balance, new_balance, &mut tx).await?;
        tx.commit().await?;
        debug!(
            "👛️ {} of {} applied to wallet #{}. Balance: {} -> {new_balance}",
            row.tx_type, row.amount, wallet.id, wallet.balance
        );
        Ok(row)
    }

    async fn reserve_wallet_transaction(
        &self,
        transaction: NewWalletTransaction,
    ) -> Result<WalletTransaction, PaymentLedgerError> {
        if transaction.amount.is_negative() {
            return Err(PaymentLedgerError::ValidationError(format!(
                "Transaction amounts are magnitudes and may not be negative (got {})",
                transaction.amount
            )));
        }
        let mut tx = self.pool.begin().await?;
        let wallet = active_wallet(transaction.wallet_id, &mut tx).await?;
        // No balance movement: a pending row records the balance at reservation time in both
        // balance fields, and the authoritative pair is written at settlement.
        let row =
            wallets::insert_transaction(&transaction, WalletTxStatus::Pending, wallet.balance, wallet.balance, &mut tx)
                .await?;
        tx.commit().await?;
        debug!("👛️ Reserved {} of {} on wallet #{} as transaction #{}", row.tx_type, row.amount, wallet.id, row.id);
        Ok(row)
    }

    async fn finalize_wallet_transaction(
        &self,
        transaction_id: i64,
        outcome: WalletTxStatus,
    ) -> Result<FinalizeOutcome, PaymentLedgerError> {
        if !outcome.is_final() {
            return Err(PaymentLedgerError::ValidationError(
                "A transaction cannot be finalized to Pending".to_string(),
            ));
        }
        let mut tx = self.pool.begin().await?;
        let wtx = wallets::fetch_transaction(transaction_id, &mut tx)
            .await?
            .ok_or(PaymentLedgerError::TransactionNotFound(transaction_id))?;
        if wtx.status.is_final() {
            debug!(
                "👛️ Wallet transaction #{transaction_id} is already {}. Finalization request is a no-op.",
                wtx.status
            );
            return Ok(FinalizeOutcome::AlreadyFinal(wtx.status));
        }
        let (row, _credited) = settle_pending_transaction(wtx, outcome, &mut tx).await?;
        tx.commit().await?;
        Ok(FinalizeOutcome::Applied(row))
    }

    async fn verify_wallet_integrity(&self, customer_id: &str) -> Result<IntegrityReport, PaymentLedgerError> {
        let mut tx = self.pool.begin().await?;
        let wallet = wallets::fetch_wallet_for_customer(customer_id, &mut tx)
            .await?
            .ok_or_else(|| PaymentLedgerError::WalletNotFound(customer_id.to_string()))?;
        let entries = wallets::transactions_for_wallet(wallet.id, &mut tx).await?;
        let mut running = Fils::zero();
        let mut count = 0usize;
        let mut corruption = None;
        for entry in entries.iter().filter(|e| e.status == WalletTxStatus::Completed) {
            if entry.balance_before != running {
                corruption = Some(format!(
                    "transaction #{} starts at {} but the preceding entry left the balance at {running}",
                    entry.id, entry.balance_before
                ));
                break;
            }
            let expected_after = match entry.tx_type {
                WalletTxType::Adjustment => entry.amount,
                t if t.is_credit() => entry.balance_before + entry.amount,
                _ => entry.balance_before - entry.amount,
            };
            if entry.balance_after != expected_after {
                corruption = Some(format!(
                    "transaction #{} ({} of {}) ends at {} but should end at {expected_after}",
                    entry.id, entry.tx_type, entry.amount, entry.balance_after
                ));
                break;
            }
            running = entry.balance_after;
            count += 1;
        }
        if corruption.is_none() && running != wallet.balance {
            corruption =
                Some(format!("replayed balance {running} does not match stored wallet balance {}", wallet.balance));
        }
        if let Some(detail) = corruption {
            // Structural corruption: take the wallet out of automatic circulation before
            // reporting. This is not retryable and must not be auto-corrected.
            wallets::deactivate_wallet(wallet.id, &mut tx).await?;
            tx.commit().await?;
            error!("👛️ Ledger corruption on wallet #{} ({customer_id}): {detail}. Wallet deactivated.", wallet.id);
            return Err(PaymentLedgerError::IntegrityError(format!("wallet #{} ({customer_id}): {detail}", wallet.id)));
        }
        tx.commit().await?;
        Ok(IntegrityReport {
            customer_id: customer_id.to_string(),
            wallet_id: wallet.id,
            transaction_count: count,
            replayed_balance: running,
            stored_balance: wallet.balance,
        })
    }

    async fn wallet_history(&self, customer_id: &str) -> Result<Vec<WalletTransaction>, PaymentLedgerError> {
        let mut conn = self.pool.acquire().await?;
        let wallet = wallets::fetch_wallet_for_customer(customer_id, &mut conn)
            .await?
            .ok_or_else(|| PaymentLedgerError::WalletNotFound(customer_id.to_string()))?;
        let entries = wallets::transactions_for_wallet(wallet.id, &mut conn).await?;
        Ok(entries)
    }

    async fn insert_payment_record(&self, record: NewPaymentRecord) -> Result<PaymentRecord, PaymentLedgerError> {
        let mut conn = self.pool.acquire().await?;
        let record = payment_records::insert_record(record, &mut conn).await?;
        debug!("🗃️ Payment record #{} created ({} via {})", record.id, record.amount, record.method);
        Ok(record)
    }

    async fn fetch_payment_record(&self, id: i64) -> Result<Option<PaymentRecord>, PaymentLedgerError> {
        let mut conn = self.pool.acquire().await?;
        let record = payment_records::fetch_record(id, &mut conn).await?;
        Ok(record)
    }

    async fn fetch_record_by_correlation(
        &self,
        correlation_id: &str,
    ) -> Result<Option<PaymentRecord>, PaymentLedgerError> {
        let mut conn = self.pool.acquire().await?;
        let record = payment_records::fetch_by_correlation(correlation_id, &mut conn).await?;
        Ok(record)
    }

    async fn latest_record_for_order(
        &self,
        order_id: &OrderId,
        method: PaymentMethod,
    ) -> Result<Option<PaymentRecord>, PaymentLedgerError> {
        let mut conn = self.pool.acquire().await?;
        let record = payment_records::latest_for_order(order_id, method, &mut conn).await?;
        Ok(record)
    }

    async fn records_for_order(&self, order_id: &OrderId) -> Result<Vec<PaymentRecord>, PaymentLedgerError> {
        let mut conn = self.pool.acquire().await?;
        let records = payment_records::records_for_order(order_id, &mut conn).await?;
        Ok(records)
    }

    async fn open_gateway_records(&self, window: Duration) -> Result<Vec<PaymentRecord>, PaymentLedgerError> {
        let mut conn = self.pool.acquire().await?;
        let records = payment_records::open_gateway_records(window.num_seconds(), &mut conn).await?;
        Ok(records)
    }

    async fn search_payment_records(
        &self,
        filter: RecordQueryFilter,
    ) -> Result<Vec<PaymentRecord>, PaymentLedgerError> {
        let mut conn = self.pool.acquire().await?;
        let records = payment_records::search_records(filter, &mut conn).await?;
        Ok(records)
    }

    async fn set_correlation_id(&self, record_id: i64, correlation_id: &str) -> Result<(), PaymentLedgerError> {
        let mut tx = self.pool.begin().await?;
        let record = payment_records::fetch_record(record_id, &mut tx)
            .await?
            .ok_or(PaymentLedgerError::RecordNotFound(record_id))?;
        payment_records::set_correlation_id(&record, correlation_id, &mut tx).await?;
        tx.commit().await?;
        info!("🗃️ Recovered correlation id {correlation_id} stored on payment record #{record_id}");
        Ok(())
    }

    async fn apply_remote_status(
        &self,
        record_id: i64,
        new_status: PaymentStatus,
        raw_response: Option<&str>,
        failure_reason: Option<&str>,
    ) -> Result<RemoteStatusOutcome, PaymentLedgerError> {
        let mut tx = self.pool.begin().await?;
        let record = payment_records::fetch_record(record_id, &mut tx)
            .await?
            .ok_or(PaymentLedgerError::RecordNotFound(record_id))?;
        let previous_status = record.status;
        // Idempotency guard: overlapping reconciliation runs and duplicate webhooks land here.
        if previous_status == new_status {
            debug!("🗃️ Payment record #{record_id} is already {new_status}. Nothing to apply.");
            return Ok(RemoteStatusOutcome { record, previous_status, changed: false, wallet_credited: false });
        }
        if !previous_status.can_transition_to(new_status) {
            if new_status.is_open() {
                // Remote truth lags the local settlement (e.g. a stale webhook delivered after
                // polling already settled the record). Never revert a settled record.
                debug!(
                    "🗃️ Ignoring stale remote status for record #{record_id}: {previous_status} would revert to \
                     {new_status}"
                );
                return Ok(RemoteStatusOutcome { record, previous_status, changed: false, wallet_credited: false });
            }
            return Err(PaymentLedgerError::IllegalStatusTransition { from: previous_status, to: new_status });
        }
        let updated =
            payment_records::update_status(record_id, new_status, raw_response, failure_reason, &mut tx).await?;
        let mut wallet_credited = false;
        if let Some(wtx_id) = updated.wallet_transaction_id {
            if let Some(wtx) = wallets::fetch_transaction(wtx_id, &mut tx).await? {
                if wtx.status == WalletTxStatus::Pending {
                    let outcome = match new_status {
                        PaymentStatus::Paid => Some(WalletTxStatus::Completed),
                        PaymentStatus::Failed => Some(WalletTxStatus::Failed),
                        _ => None,
                    };
                    if let Some(outcome) = outcome {
                        let (_, credited) = settle_pending_transaction(wtx, outcome, &mut tx).await?;
                        wallet_credited = credited;
                    }
                } else {
                    trace!(
                        "🗃️ Wallet transaction #{wtx_id} linked to record #{record_id} is already {}. No ledger \
                         action to take.",
                        wtx.status
                    );
                }
            } else {
                warn!("🗃️ Payment record #{record_id} links to wallet transaction #{wtx_id}, which does not exist.");
            }
        }
        tx.commit().await?;
        debug!("🗃️ Payment record #{record_id} moved {previous_status} -> {new_status} (wallet credited: {wallet_credited})");
        Ok(RemoteStatusOutcome { record: updated, previous_status, changed: true, wallet_credited })
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, PaymentLedgerError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_order_id(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>, PaymentLedgerError> {
        let mut conn = self.pool.acquire().await?;
        let items = orders::fetch_order_items(order_id, &mut conn).await?;
        Ok(items)
    }

    async fn set_order_payment_method(
        &self,
        order_id: &OrderId,
        method: PaymentMethod,
    ) -> Result<Order, PaymentLedgerError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::update_payment_fields(order_id, None, Some(method), &mut conn).await?;
        Ok(order)
    }

    async fn recompute_order_payment(&self, order_id: &OrderId) -> Result<OrderUpdate, PaymentLedgerError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::fetch_order_by_order_id(order_id, &mut tx)
            .await?
            .ok_or_else(|| PaymentLedgerError::OrderNotFound(order_id.clone()))?;
        let records = payment_records::records_for_order(order_id, &mut tx).await?;
        let result = aggregate_order_payment(order.invoice_total, &records);
        let previous_status = order.payment_status;
        let order = if result.status != order.payment_status || result.method != order.payment_method {
            orders::update_payment_fields(order_id, Some(result.status), result.method, &mut tx).await?
        } else {
            order
        };
        tx.commit().await?;
        debug!(
            "🗃️ Order {} payment recomputed: {previous_status} -> {} (total paid {})",
            order.order_id, order.payment_status, result.total_paid
        );
        Ok(OrderUpdate { order, previous_status })
    }

    async fn close(&mut self) -> Result<(), PaymentLedgerError> {
        self.pool.close().await;
        Ok(())
    }
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Applies any outstanding embedded migrations.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
