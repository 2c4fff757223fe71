use log::*;
use lps_common::Fils;

use crate::SqliteDatabase;

/// Creates a fresh in-memory database with the schema applied. The pool is capped at a single
/// connection so every caller sees the same in-memory database.
pub async fn new_test_db() -> SqliteDatabase {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    debug!("🚀️ Logging initialised");
    let db = SqliteDatabase::new_with_url("sqlite::memory:", 1).await.expect("Error creating in-memory database");
    db.run_migrations().await.expect("Error running DB migrations");
    info!("🚀️ Migrations complete");
    db
}

/// Inserts an order row with full customer identity, ready for invoicing.
pub async fn seed_order(db: &SqliteDatabase, order_id: &str, customer_id: &str, invoice_total: Fils) {
    sqlx::query(
        "INSERT INTO orders (order_id, customer_id, customer_name, customer_email, invoice_total) VALUES ($1, $2, \
         $3, $4, $5)",
    )
    .bind(order_id)
    .bind(customer_id)
    .bind(format!("Customer {customer_id}"))
    .bind(format!("{customer_id}@example.com"))
    .bind(invoice_total)
    .execute(db.pool())
    .await
    .expect("Error seeding order");
}

/// Inserts an order row that is missing the customer identity fields.
pub async fn seed_anonymous_order(db: &SqliteDatabase, order_id: &str, customer_id: &str, invoice_total: Fils) {
    sqlx::query("INSERT INTO orders (order_id, customer_id, invoice_total) VALUES ($1, $2, $3)")
        .bind(order_id)
        .bind(customer_id)
        .bind(invoice_total)
        .execute(db.pool())
        .await
        .expect("Error seeding order");
}

pub async fn seed_order_item(db: &SqliteDatabase, order_id: &str, description: &str, quantity: i64, unit_price: Fils) {
    let line_total = unit_price * quantity;
    sqlx::query(
        "INSERT INTO order_items (order_id, description, quantity, unit_price, line_total) VALUES ($1, $2, $3, $4, \
         $5)",
    )
    .bind(order_id)
    .bind(description)
    .bind(quantity)
    .bind(unit_price)
    .bind(line_total)
    .execute(db.pool())
    .await
    .expect("Error seeding order item");
}
