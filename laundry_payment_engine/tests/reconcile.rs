//! End-to-end flow tests over the invoice lifecycle, the reconciler and the webhook path,
//! against an in-memory database and a scripted gateway.
mod support;

use laundry_payment_engine::{
    db_types::{Fils, OrderId, OrderPaymentStatus, PaymentMethod, PaymentStatus, WalletTxType},
    events::EventProducers,
    test_utils::prepare_env::{new_test_db, seed_anonymous_order, seed_order, seed_order_item},
    traits::{PaymentLedgerDatabase, RecordQueryFilter},
    InvoiceFlowApi,
    PaymentFlowApi,
    PaymentFlowError,
    ReconcileApi,
    RefundDestination,
    WalletApi,
    WebhookEvent,
    WebhookMetadata,
    SqliteDatabase,
};
use support::StubGateway;

async fn seed_invoiceable_order(db: &SqliteDatabase, order_id: &str, customer_id: &str, total: Fils) {
    seed_order(db, order_id, customer_id, total).await;
    seed_order_item(db, order_id, "Wash & fold (5kg)", 1, total).await;
}

fn webhook(correlation_id: &str, status: &str, record_id: Option<i64>) -> WebhookEvent {
    WebhookEvent {
        correlation_id: Some(correlation_id.to_string()),
        status: status.to_string(),
        metadata: WebhookMetadata { record_id, wallet_transaction_id: None, order_id: None },
    }
}

#[tokio::test]
async fn happy_path_wallet_short_order_gets_invoiced_and_paid() {
    let db = new_test_db().await;
    let gateway = StubGateway::new();
    seed_invoiceable_order(&db, "ord-1", "cust-1", Fils::from(10_000)).await;
    let wallets = WalletApi::new(db.clone());
    wallets.apply_transaction("cust-1", WalletTxType::Deposit, Fils::from(3_000), None, None, None).await.unwrap();

    let invoices = InvoiceFlowApi::new(db.clone(), gateway.clone(), EventProducers::default());
    let result = invoices.ensure_invoice(&OrderId("ord-1".to_string())).await.unwrap();
    assert!(result.requires_payment);
    assert_eq!(result.wallet_balance, Fils::from(3_000));
    assert_eq!(result.invoice_total, Fils::from(10_000));
    assert_eq!(result.amount_to_charge, Some(Fils::from(7_000)));
    let invoice_id = result.invoice_id.clone().unwrap();
    let record_id = result.record_id.unwrap();

    // The customer pays; the gateway now reports the invoice settled
    gateway.set_invoice_status(&invoice_id, "PAID");
    let reconciler = ReconcileApi::new(db.clone(), gateway.clone(), EventProducers::default());
    let report = reconciler.sync_by_ids(&[record_id]).await;
    assert_eq!(report.total_checked, 1);
    assert_eq!(report.updated, 1);
    assert_eq!(report.status_mismatches, 1);

    let record = db.fetch_payment_record(record_id).await.unwrap().unwrap();
    assert_eq!(record.status, PaymentStatus::Paid);
    let order = db.fetch_order(&OrderId("ord-1".to_string())).await.unwrap().unwrap();
    assert_eq!(order.payment_status, OrderPaymentStatus::Paid);
    // Wallet + invoice settled the order together, so the order carries the split-payment marker
    assert_eq!(order.payment_method, Some(PaymentMethod::Wallet));

    // The reserved wallet share moved exactly when the invoice settled
    assert_eq!(db.fetch_wallet("cust-1").await.unwrap().unwrap().balance, Fils::zero());
    let records = db.records_for_order(&OrderId("ord-1".to_string())).await.unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.status == PaymentStatus::Paid));
    assert!(db.verify_wallet_integrity("cust-1").await.is_ok());
}

#[tokio::test]
async fn ensure_invoice_is_deduplicated() {
    let db = new_test_db().await;
    let gateway = StubGateway::new();
    seed_invoiceable_order(&db, "ord-1", "cust-1", Fils::from(10_000)).await;

    let invoices = InvoiceFlowApi::new(db.clone(), gateway.clone(), EventProducers::default());
    let first = invoices.ensure_invoice(&OrderId("ord-1".to_string())).await.unwrap();
    let second = invoices.ensure_invoice(&OrderId("ord-1".to_string())).await.unwrap();
    assert_eq!(first.invoice_id, second.invoice_id);
    assert_eq!(first.record_id, second.record_id);
    assert_eq!(gateway.created_invoices(), 1);
    let records = db.records_for_order(&OrderId("ord-1".to_string())).await.unwrap();
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn stale_invoice_is_cancelled_and_replaced() {
    let db = new_test_db().await;
    let gateway = StubGateway::new();
    seed_invoiceable_order(&db, "ord-1", "cust-1", Fils::from(10_000)).await;

    let invoices = InvoiceFlowApi::new(db.clone(), gateway.clone(), EventProducers::default());
    let first = invoices.ensure_invoice(&OrderId("ord-1".to_string())).await.unwrap();
    let first_id = first.invoice_id.unwrap();
    gateway.set_invoice_status(&first_id, "EXPIRED");

    let second = invoices.ensure_invoice(&OrderId("ord-1".to_string())).await.unwrap();
    let second_id = second.invoice_id.unwrap();
    assert_ne!(first_id, second_id);
    assert!(gateway.cancelled().contains(&first_id));

    let records = db.records_for_order(&OrderId("ord-1".to_string())).await.unwrap();
    assert_eq!(records.len(), 2);
    let open: Vec<_> = records.iter().filter(|r| r.status.is_open()).collect();
    assert_eq!(open.len(), 1, "exactly one live invoice must remain");
    assert_eq!(open[0].invoice_id.as_deref(), Some(second_id.as_str()));
    assert_eq!(records.iter().filter(|r| r.status == PaymentStatus::Failed).count(), 1);
}

#[tokio::test]
async fn remote_check_outage_falls_through_to_a_new_invoice() {
    let db = new_test_db().await;
    let gateway = StubGateway::new();
    seed_invoiceable_order(&db, "ord-1", "cust-1", Fils::from(10_000)).await;

    let invoices = InvoiceFlowApi::new(db.clone(), gateway.clone(), EventProducers::default());
    let first = invoices.ensure_invoice(&OrderId("ord-1".to_string())).await.unwrap();
    let first_id = first.invoice_id.unwrap();
    gateway.fail_gets_for(&first_id);

    // The customer must not be blocked on an invoice the gateway will not show us
    let second = invoices.ensure_invoice(&OrderId("ord-1".to_string())).await.unwrap();
    assert_ne!(second.invoice_id.unwrap(), first_id);
    assert_eq!(gateway.created_invoices(), 2);
}

#[tokio::test]
async fn wallet_covered_order_needs_no_invoice() {
    let db = new_test_db().await;
    let gateway = StubGateway::new();
    seed_invoiceable_order(&db, "ord-1", "cust-1", Fils::from(10_000)).await;
    let wallets = WalletApi::new(db.clone());
    wallets.apply_transaction("cust-1", WalletTxType::Deposit, Fils::from(12_000), None, None, None).await.unwrap();

    let invoices = InvoiceFlowApi::new(db.clone(), gateway.clone(), EventProducers::default());
    let result = invoices.ensure_invoice(&OrderId("ord-1".to_string())).await.unwrap();
    assert!(!result.requires_payment);
    assert_eq!(gateway.created_invoices(), 0);
}

#[tokio::test]
async fn missing_customer_identity_fails_fast() {
    let db = new_test_db().await;
    let gateway = StubGateway::new();
    seed_anonymous_order(&db, "ord-1", "cust-1", Fils::from(10_000)).await;
    seed_order_item(&db, "ord-1", "Duvet cleaning", 1, Fils::from(10_000)).await;

    let invoices = InvoiceFlowApi::new(db.clone(), gateway.clone(), EventProducers::default());
    let err = invoices.ensure_invoice(&OrderId("ord-1".to_string())).await.unwrap_err();
    assert!(matches!(err, PaymentFlowError::Validation(_)));
    assert!(!err.is_retryable());
    assert_eq!(gateway.created_invoices(), 0);
}

#[tokio::test]
async fn order_without_items_fails_fast() {
    let db = new_test_db().await;
    let gateway = StubGateway::new();
    seed_order(&db, "ord-1", "cust-1", Fils::from(10_000)).await;

    let invoices = InvoiceFlowApi::new(db.clone(), gateway.clone(), EventProducers::default());
    let err = invoices.ensure_invoice(&OrderId("ord-1".to_string())).await.unwrap_err();
    assert!(matches!(err, PaymentFlowError::Validation(_)));
}

#[tokio::test]
async fn invoice_total_is_derived_from_items_when_unset() {
    let db = new_test_db().await;
    let gateway = StubGateway::new();
    seed_order(&db, "ord-1", "cust-1", Fils::zero()).await;
    seed_order_item(&db, "ord-1", "Shirts (x12)", 12, Fils::from(350)).await;
    seed_order_item(&db, "ord-1", "Suit, 2-piece", 1, Fils::from(4_800)).await;

    let invoices = InvoiceFlowApi::new(db.clone(), gateway.clone(), EventProducers::default());
    let result = invoices.ensure_invoice(&OrderId("ord-1".to_string())).await.unwrap();
    assert_eq!(result.invoice_total, Fils::from(12 * 350 + 4_800));
    assert_eq!(result.amount_to_charge, Some(Fils::from(12 * 350 + 4_800)));
}

#[tokio::test]
async fn duplicate_webhook_credits_the_wallet_once() {
    let db = new_test_db().await;
    let gateway = StubGateway::new();
    let flows = PaymentFlowApi::new(db.clone(), gateway.clone());
    let top_up = flows.initiate_top_up("cust-1", Fils::from(20_000)).await.unwrap();
    assert_eq!(top_up.status, PaymentStatus::Pending);
    assert_eq!(db.fetch_wallet("cust-1").await.unwrap().unwrap().balance, Fils::zero());

    let reconciler = ReconcileApi::new(db.clone(), gateway.clone(), EventProducers::default());
    let first = reconciler
        .process_webhook(webhook(&top_up.charge_id, "CAPTURED", Some(top_up.record_id)))
        .await
        .unwrap();
    assert!(first.updated);
    assert!(first.wallet_credited);
    assert_eq!(db.fetch_wallet("cust-1").await.unwrap().unwrap().balance, Fils::from(20_000));

    // The gateway redelivers the same event
    let second = reconciler
        .process_webhook(webhook(&top_up.charge_id, "CAPTURED", Some(top_up.record_id)))
        .await
        .unwrap();
    assert!(!second.updated);
    assert!(!second.wallet_credited);
    assert_eq!(db.fetch_wallet("cust-1").await.unwrap().unwrap().balance, Fils::from(20_000));
}

#[tokio::test]
async fn failed_charge_webhook_abandons_the_reservation() {
    let db = new_test_db().await;
    let gateway = StubGateway::new();
    let flows = PaymentFlowApi::new(db.clone(), gateway.clone());
    let top_up = flows.initiate_top_up("cust-1", Fils::from(5_000)).await.unwrap();

    let reconciler = ReconcileApi::new(db.clone(), gateway.clone(), EventProducers::default());
    let result = reconciler
        .process_webhook(webhook(&top_up.charge_id, "DECLINED", Some(top_up.record_id)))
        .await
        .unwrap();
    assert!(result.updated);
    assert!(!result.wallet_credited);
    assert_eq!(result.new_status, PaymentStatus::Failed);
    assert_eq!(db.fetch_wallet("cust-1").await.unwrap().unwrap().balance, Fils::zero());
    // A late "captured" webhook for the same record must not resurrect it
    let late = reconciler.process_webhook(webhook(&top_up.charge_id, "CAPTURED", Some(top_up.record_id))).await;
    assert!(late.is_err());
    assert_eq!(db.fetch_wallet("cust-1").await.unwrap().unwrap().balance, Fils::zero());
}

#[tokio::test]
async fn sweep_isolates_per_record_failures() {
    let db = new_test_db().await;
    let gateway = StubGateway::new();
    seed_invoiceable_order(&db, "ord-1", "cust-1", Fils::from(10_000)).await;
    seed_invoiceable_order(&db, "ord-2", "cust-2", Fils::from(8_000)).await;

    let invoices = InvoiceFlowApi::new(db.clone(), gateway.clone(), EventProducers::default());
    let first = invoices.ensure_invoice(&OrderId("ord-1".to_string())).await.unwrap();
    let second = invoices.ensure_invoice(&OrderId("ord-2".to_string())).await.unwrap();

    gateway.fail_gets_for(&first.invoice_id.unwrap());
    gateway.set_invoice_status(&second.invoice_id.unwrap(), "PAID");

    let reconciler = ReconcileApi::new(db.clone(), gateway.clone(), EventProducers::default());
    let summary = reconciler.sweep(chrono::Duration::hours(48)).await;
    assert_eq!(summary.checked, 2);
    assert_eq!(summary.updated_count, 1);
    assert_eq!(summary.errors.len(), 1);
    assert!(!summary.success);

    // The failing record is untouched; its sibling settled
    let order2 = db.fetch_order(&OrderId("ord-2".to_string())).await.unwrap().unwrap();
    assert_eq!(order2.payment_status, OrderPaymentStatus::Paid);
    let order1 = db.fetch_order(&OrderId("ord-1".to_string())).await.unwrap().unwrap();
    assert_eq!(order1.payment_status, OrderPaymentStatus::Pending);
}

#[tokio::test]
async fn unknown_remote_status_never_settles_a_record() {
    let db = new_test_db().await;
    let gateway = StubGateway::new();
    seed_invoiceable_order(&db, "ord-1", "cust-1", Fils::from(10_000)).await;

    let invoices = InvoiceFlowApi::new(db.clone(), gateway.clone(), EventProducers::default());
    let result = invoices.ensure_invoice(&OrderId("ord-1".to_string())).await.unwrap();
    gateway.set_invoice_status(result.invoice_id.as_deref().unwrap(), "SOMETHING_NEW");

    let reconciler = ReconcileApi::new(db.clone(), gateway.clone(), EventProducers::default());
    let report = reconciler.sync_by_ids(&[result.record_id.unwrap()]).await;
    assert_eq!(report.updated, 0);
    assert_eq!(report.status_mismatches, 0);
    let record = db.fetch_payment_record(result.record_id.unwrap()).await.unwrap().unwrap();
    assert_eq!(record.status, PaymentStatus::Pending);
}

#[tokio::test]
async fn targeted_sync_honours_filters() {
    let db = new_test_db().await;
    let gateway = StubGateway::new();
    seed_invoiceable_order(&db, "ord-1", "cust-1", Fils::from(10_000)).await;
    seed_invoiceable_order(&db, "ord-2", "cust-2", Fils::from(6_000)).await;
    let invoices = InvoiceFlowApi::new(db.clone(), gateway.clone(), EventProducers::default());
    let first = invoices.ensure_invoice(&OrderId("ord-1".to_string())).await.unwrap();
    let _second = invoices.ensure_invoice(&OrderId("ord-2".to_string())).await.unwrap();
    gateway.set_invoice_status(first.invoice_id.as_deref().unwrap(), "PAID");

    let reconciler = ReconcileApi::new(db.clone(), gateway.clone(), EventProducers::default());
    let filter = RecordQueryFilter::default()
        .with_method(PaymentMethod::GatewayInvoice)
        .with_status(PaymentStatus::Pending)
        .with_limit(1);
    let report = reconciler.sync_by_filter(filter).await;
    assert_eq!(report.total_checked, 1);
    assert_eq!(report.updated, 1);
}

#[tokio::test]
async fn gateway_refund_marks_the_original_record() {
    let db = new_test_db().await;
    let gateway = StubGateway::new();
    gateway.new_charges_report("CAPTURED");
    let flows = PaymentFlowApi::new(db.clone(), gateway.clone());
    let top_up = flows.initiate_top_up("cust-1", Fils::from(10_000)).await.unwrap();
    assert_eq!(top_up.status, PaymentStatus::Paid);
    assert_eq!(db.fetch_wallet("cust-1").await.unwrap().unwrap().balance, Fils::from(10_000));

    let refund = flows
        .issue_refund(top_up.record_id, Some(Fils::from(4_000)), "damaged garment", RefundDestination::Gateway)
        .await
        .unwrap();
    assert_eq!(refund.original_status, PaymentStatus::PartialRefund);
    assert_eq!(gateway.refunds(), vec![(top_up.charge_id.clone(), Fils::from(4_000))]);

    // Refunding the remainder closes the record out
    let full = flows
        .issue_refund(top_up.record_id, None, "order cancelled", RefundDestination::Gateway)
        .await
        .unwrap();
    assert_eq!(full.amount, Fils::from(6_000));
    assert_eq!(full.original_status, PaymentStatus::Refunded);
    // And a fully refunded record cannot be refunded again
    let again = flows.issue_refund(top_up.record_id, None, "oops", RefundDestination::Gateway).await;
    assert!(again.is_err());
}

#[tokio::test]
async fn wallet_refund_credits_the_ledger() {
    let db = new_test_db().await;
    let gateway = StubGateway::new();
    gateway.new_charges_report("CAPTURED");
    let flows = PaymentFlowApi::new(db.clone(), gateway.clone());
    let top_up = flows.initiate_top_up("cust-1", Fils::from(10_000)).await.unwrap();
    let balance_before = db.fetch_wallet("cust-1").await.unwrap().unwrap().balance;

    let refund = flows
        .issue_refund(top_up.record_id, Some(Fils::from(2_500)), "loyalty credit", RefundDestination::Wallet)
        .await
        .unwrap();
    assert!(refund.wallet_transaction_id.is_some());
    let balance_after = db.fetch_wallet("cust-1").await.unwrap().unwrap().balance;
    assert_eq!(balance_after, balance_before + Fils::from(2_500));
    assert!(db.verify_wallet_integrity("cust-1").await.is_ok());
}
