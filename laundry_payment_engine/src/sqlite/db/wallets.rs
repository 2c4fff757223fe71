use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db_types::{Fils, NewWalletTransaction, Wallet, WalletTransaction, WalletTxStatus},
    traits::PaymentLedgerError,
};

pub async fn fetch_wallet_for_customer(
    customer_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Wallet>, sqlx::Error> {
    let wallet = sqlx::query_as("SELECT * FROM wallets WHERE customer_id = $1")
        .bind(customer_id)
        .fetch_optional(conn)
        .await?;
    Ok(wallet)
}

pub async fn fetch_wallet_by_id(id: i64, conn: &mut SqliteConnection) -> Result<Option<Wallet>, sqlx::Error> {
    let wallet = sqlx::query_as("SELECT * FROM wallets WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(wallet)
}

/// Fetches the customer's wallet, creating an empty active one if none exists yet.
pub async fn fetch_or_create_wallet(
    customer_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Wallet, PaymentLedgerError> {
    if let Some(wallet) = fetch_wallet_for_customer(customer_id, &mut *conn).await? {
        return Ok(wallet);
    }
    let wallet: Wallet = sqlx::query_as("INSERT INTO wallets (customer_id) VALUES ($1) RETURNING *")
        .bind(customer_id)
        .fetch_one(conn)
        .await?;
    debug!("👛️ Created wallet #{} for customer {customer_id}", wallet.id);
    Ok(wallet)
}

/// Writes a new wallet balance, guarded against concurrent writers: the update only applies if
/// the balance still holds the value this caller computed from. Zero rows affected means another
/// transaction moved the balance first, and the whole atomic unit must be retried.
pub async fn update_balance(
    wallet_id: i64,
    expected: Fils,
    new_balance: Fils,
    conn: &mut SqliteConnection,
) -> Result<(), PaymentLedgerError> {
    let result = sqlx::query(
        "UPDATE wallets SET balance = $1, last_transaction_at = CURRENT_TIMESTAMP, updated_at = CURRENT_TIMESTAMP \
         WHERE id = $2 AND balance = $3",
    )
    .bind(new_balance)
    .bind(wallet_id)
    .bind(expected)
    .execute(conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(PaymentLedgerError::ConcurrencyConflict(wallet_id));
    }
    trace!("👛️ Wallet #{wallet_id} balance updated from {expected} to {new_balance}");
    Ok(())
}

/// Takes a wallet out of automatic circulation. Called when ledger verification finds structural
/// corruption; reactivation is a manual operation.
pub async fn deactivate_wallet(wallet_id: i64, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE wallets SET is_active = 0, updated_at = CURRENT_TIMESTAMP WHERE id = $1")
        .bind(wallet_id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn insert_transaction(
    transaction: &NewWalletTransaction,
    status: WalletTxStatus,
    balance_before: Fils,
    balance_after: Fils,
    conn: &mut SqliteConnection,
) -> Result<WalletTransaction, PaymentLedgerError> {
    let row = sqlx::query_as(
        r#"
            INSERT INTO wallet_transactions
                (wallet_id, tx_type, amount, balance_before, balance_after, status, description, reference, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *;
        "#,
    )
    .bind(transaction.wallet_id)
    .bind(transaction.tx_type.to_string())
    .bind(transaction.amount)
    .bind(balance_before)
    .bind(balance_after)
    .bind(status.to_string())
    .bind(transaction.description.as_deref())
    .bind(transaction.reference.as_deref())
    .bind(transaction.metadata.as_deref())
    .fetch_one(conn)
    .await?;
    Ok(row)
}

pub async fn fetch_transaction(
    id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<WalletTransaction>, sqlx::Error> {
    let row = sqlx::query_as("SELECT * FROM wallet_transactions WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(row)
}

/// Settles a pending row. The balance fields are rewritten because a pending entry only records
/// the balance at reservation time; the authoritative pair is fixed at settlement.
pub async fn finalize_transaction_row(
    id: i64,
    status: WalletTxStatus,
    balance_before: Fils,
    balance_after: Fils,
    conn: &mut SqliteConnection,
) -> Result<WalletTransaction, PaymentLedgerError> {
    let row: Option<WalletTransaction> = sqlx::query_as(
        "UPDATE wallet_transactions SET status = $1, balance_before = $2, balance_after = $3, updated_at = \
         CURRENT_TIMESTAMP WHERE id = $4 RETURNING *",
    )
    .bind(status.to_string())
    .bind(balance_before)
    .bind(balance_after)
    .bind(id)
    .fetch_optional(conn)
    .await?;
    row.ok_or(PaymentLedgerError::TransactionNotFound(id))
}

/// All ledger entries for the wallet, oldest first. Insertion order is creation order because the
/// ledger is append-only.
pub async fn transactions_for_wallet(
    wallet_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<WalletTransaction>, sqlx::Error> {
    let rows = sqlx::query_as("SELECT * FROM wallet_transactions WHERE wallet_id = $1 ORDER BY id ASC")
        .bind(wallet_id)
        .fetch_all(conn)
        .await?;
    Ok(rows)
}
