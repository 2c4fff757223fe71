use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Order, OrderId, OrderItem, OrderPaymentStatus, PaymentMethod},
    traits::PaymentLedgerError,
};

/// Returns the order for the corresponding `order_id`.
pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order =
        sqlx::query_as("SELECT * FROM orders WHERE order_id = $1").bind(order_id.as_str()).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_order_items(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderItem>, sqlx::Error> {
    let items = sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await?;
    Ok(items)
}

/// Writes the order's derived payment fields. Only the aggregator recompute and the invoice flow
/// (method only) call this; nothing else in the system writes these columns.
pub async fn update_payment_fields(
    order_id: &OrderId,
    status: Option<OrderPaymentStatus>,
    method: Option<PaymentMethod>,
    conn: &mut SqliteConnection,
) -> Result<Order, PaymentLedgerError> {
    if status.is_none() && method.is_none() {
        return fetch_order_by_order_id(order_id, conn)
            .await?
            .ok_or_else(|| PaymentLedgerError::OrderNotFound(order_id.clone()));
    }
    let row: Option<Order> = sqlx::query_as(
        "UPDATE orders SET payment_status = COALESCE($1, payment_status), payment_method = COALESCE($2, \
         payment_method), updated_at = CURRENT_TIMESTAMP WHERE order_id = $3 RETURNING *",
    )
    .bind(status.map(|s| s.to_string()))
    .bind(method.map(|m| m.to_string()))
    .bind(order_id.as_str())
    .fetch_optional(conn)
    .await?;
    let order = row.ok_or_else(|| PaymentLedgerError::OrderNotFound(order_id.clone()))?;
    debug!("🗃️ Order {} payment fields updated: {} / {:?}", order.order_id, order.payment_status, order.payment_method);
    Ok(order)
}
