use log::trace;
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{NewPaymentRecord, OrderId, PaymentMethod, PaymentRecord, PaymentStatus},
    traits::{PaymentLedgerError, RecordQueryFilter},
};

pub async fn insert_record(
    record: NewPaymentRecord,
    conn: &mut SqliteConnection,
) -> Result<PaymentRecord, PaymentLedgerError> {
    let row = sqlx::query_as(
        r#"
            INSERT INTO payment_records
                (customer_id, order_id, amount, currency, method, status, charge_id, authorize_id, gateway_tx_id,
                 invoice_id, wallet_transaction_id, raw_response, metadata)
            VALUES ($1, $2, $3, $4, $5, 'Pending', $6, $7, $8, $9, $10, $11, $12)
            RETURNING *;
        "#,
    )
    .bind(record.customer_id)
    .bind(record.order_id.map(|o| o.0))
    .bind(record.amount)
    .bind(record.currency)
    .bind(record.method.to_string())
    .bind(record.charge_id)
    .bind(record.authorize_id)
    .bind(record.gateway_tx_id)
    .bind(record.invoice_id)
    .bind(record.wallet_transaction_id)
    .bind(record.raw_response)
    .bind(record.metadata)
    .fetch_one(conn)
    .await?;
    Ok(row)
}

pub async fn fetch_record(id: i64, conn: &mut SqliteConnection) -> Result<Option<PaymentRecord>, sqlx::Error> {
    let row = sqlx::query_as("SELECT * FROM payment_records WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(row)
}

/// Finds the most recent record carrying the given gateway id in either correlation column.
pub async fn fetch_by_correlation(
    correlation_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentRecord>, sqlx::Error> {
    let row = sqlx::query_as(
        "SELECT * FROM payment_records WHERE charge_id = $1 OR invoice_id = $1 ORDER BY id DESC LIMIT 1",
    )
    .bind(correlation_id)
    .fetch_optional(conn)
    .await?;
    Ok(row)
}

/// The most recent record of the given method for an order. This is the record the invoice
/// deduplication step inspects.
pub async fn latest_for_order(
    order_id: &OrderId,
    method: PaymentMethod,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentRecord>, sqlx::Error> {
    let row = sqlx::query_as(
        "SELECT * FROM payment_records WHERE order_id = $1 AND method = $2 ORDER BY id DESC LIMIT 1",
    )
    .bind(order_id.as_str())
    .bind(method.to_string())
    .fetch_optional(conn)
    .await?;
    Ok(row)
}

pub async fn records_for_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<PaymentRecord>, sqlx::Error> {
    let rows = sqlx::query_as("SELECT * FROM payment_records WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await?;
    Ok(rows)
}

/// The batch sweep's work list: open gateway-backed records created within the window. Refund
/// records are skipped because the gateway exposes no read endpoint for refunds; they settle via
/// webhook or stay open for manual review.
pub async fn open_gateway_records(
    window_secs: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<PaymentRecord>, sqlx::Error> {
    let rows = sqlx::query_as(
        format!(
            "SELECT * FROM payment_records WHERE status IN ('Pending', 'InProgress') AND method IN \
             ('GatewayCharge', 'GatewayInvoice') AND (metadata IS NULL OR metadata NOT LIKE '%\"is_refund\":true%') \
             AND (unixepoch(CURRENT_TIMESTAMP) - unixepoch(created_at)) <= {} ORDER BY id ASC",
            window_secs
        )
        .as_str(),
    )
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

/// Fetches records according to criteria specified in the `RecordQueryFilter`.
///
/// Resulting records are ordered by creation, ascending.
pub async fn search_records(
    filter: RecordQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<PaymentRecord>, sqlx::Error> {
    let mut builder = QueryBuilder::new(
        r#"
    SELECT * FROM payment_records
    "#,
    );
    if !(filter.customer_id.is_none() && filter.order_id.is_none() && filter.method.is_none() && filter.status.is_none())
    {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(cid) = filter.customer_id {
        where_clause.push("customer_id = ");
        where_clause.push_bind_unseparated(cid);
    }
    if let Some(order_id) = filter.order_id {
        where_clause.push("order_id = ");
        where_clause.push_bind_unseparated(order_id);
    }
    if let Some(method) = filter.method {
        where_clause.push("method = ");
        where_clause.push_bind_unseparated(method.to_string());
    }
    if let Some(status) = filter.status {
        where_clause.push("status = ");
        where_clause.push_bind_unseparated(status.to_string());
    }
    builder.push(" ORDER BY id ASC");
    if let Some(limit) = filter.limit {
        builder.push(" LIMIT ");
        builder.push_bind(limit);
    }
    if let Some(offset) = filter.offset {
        builder.push(" OFFSET ");
        builder.push_bind(offset);
    }
    trace!("🗃️ Executing query: {}", builder.sql());
    let query = builder.build_query_as::<PaymentRecord>();
    let records = query.fetch_all(conn).await?;
    Ok(records)
}

/// Stores a recovered correlation id in the column that matches the record's method.
pub async fn set_correlation_id(
    record: &PaymentRecord,
    correlation_id: &str,
    conn: &mut SqliteConnection,
) -> Result<(), PaymentLedgerError> {
    let column = match record.method {
        PaymentMethod::GatewayInvoice => "invoice_id",
        PaymentMethod::GatewayCharge => "charge_id",
        other => {
            return Err(PaymentLedgerError::ValidationError(format!(
                "Records with method {other} carry no gateway correlation id"
            )))
        },
    };
    let sql = format!("UPDATE payment_records SET {column} = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2");
    sqlx::query(sql.as_str()).bind(correlation_id).bind(record.id).execute(conn).await?;
    Ok(())
}

pub async fn update_status(
    record_id: i64,
    status: PaymentStatus,
    raw_response: Option<&str>,
    failure_reason: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<PaymentRecord, PaymentLedgerError> {
    let row: Option<PaymentRecord> = sqlx::query_as(
        "UPDATE payment_records SET status = $1, raw_response = COALESCE($2, raw_response), failure_reason = \
         COALESCE($3, failure_reason), updated_at = CURRENT_TIMESTAMP WHERE id = $4 RETURNING *",
    )
    .bind(status.to_string())
    .bind(raw_response)
    .bind(failure_reason)
    .bind(record_id)
    .fetch_optional(conn)
    .await?;
    row.ok_or(PaymentLedgerError::RecordNotFound(record_id))
}
