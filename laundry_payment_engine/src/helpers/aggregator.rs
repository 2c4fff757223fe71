//! Order payment aggregation.
//!
//! An order's payment status is derived, not authoritative: it is always recomputed from the full
//! set of the order's payment records. This module holds the pure decision logic; persistence
//! lives in the storage layer, which is the only writer of `orders.payment_status`.

use crate::db_types::{Fils, OrderPaymentStatus, PaymentMethod, PaymentRecord, PaymentStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateResult {
    pub status: OrderPaymentStatus,
    /// The method to record on the order, or `None` when nothing has settled yet.
    pub method: Option<PaymentMethod>,
    pub total_paid: Fils,
}

/// Recomputes an order's payment status from its records.
///
/// Records marked as refunds in their metadata are excluded from the "original" set: they never
/// reduce `total_paid`, so an order that reached Paid stays Paid across refund bookkeeping.
/// `records` must be in creation order (the storage layer returns them that way); the most
/// recently settled record decides the order's method, with `Wallet` standing in as the marker
/// for split payments across several methods.
pub fn aggregate_order_payment(invoice_total: Fils, records: &[PaymentRecord]) -> AggregateResult {
    let originals: Vec<&PaymentRecord> = records.iter().filter(|r| !r.is_refund()).collect();
    let paid: Vec<&PaymentRecord> = originals.iter().copied().filter(|r| r.status == PaymentStatus::Paid).collect();
    let total_paid: Fils = paid.iter().map(|r| r.amount).sum();

    let status = if originals.is_empty() {
        OrderPaymentStatus::Pending
    } else if total_paid.is_positive() && total_paid >= invoice_total {
        OrderPaymentStatus::Paid
    } else if total_paid.is_positive() {
        // Partial payment
        if originals.iter().any(|r| r.status.is_open()) {
            OrderPaymentStatus::Pending
        } else if originals
            .iter()
            .filter(|r| r.status != PaymentStatus::Paid)
            .all(|r| r.status == PaymentStatus::Failed)
        {
            OrderPaymentStatus::Failed
        } else {
            OrderPaymentStatus::Pending
        }
    } else if originals.iter().all(|r| r.status == PaymentStatus::Failed) {
        OrderPaymentStatus::Failed
    } else {
        OrderPaymentStatus::Pending
    };

    let mut methods = paid.iter().map(|r| r.method).collect::<Vec<_>>();
    methods.dedup();
    let method = match methods.as_slice() {
        [] => None,
        [one] => Some(*one),
        _ if methods.iter().all(|m| *m == methods[0]) => Some(methods[0]),
        _ => Some(PaymentMethod::Wallet),
    };

    AggregateResult { status, method, total_paid }
}

#[cfg(test)]
mod test {
    use chrono::Utc;

    use super::*;
    use crate::db_types::OrderId;

    fn record(amount: i64, method: PaymentMethod, status: PaymentStatus) -> PaymentRecord {
        PaymentRecord {
            id: 0,
            customer_id: "cust-1".to_string(),
            order_id: Some(OrderId("ord-1".to_string())),
            amount: Fils::from(amount),
            currency: "KWD".to_string(),
            method,
            status,
            charge_id: None,
            authorize_id: None,
            gateway_tx_id: None,
            invoice_id: None,
            wallet_transaction_id: None,
            raw_response: None,
            failure_reason: None,
            metadata: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn refund(amount: i64) -> PaymentRecord {
        let mut r = record(amount, PaymentMethod::GatewayCharge, PaymentStatus::Paid);
        r.metadata = Some(r#"{"is_refund":true}"#.to_string());
        r
    }

    #[test]
    fn no_records_is_pending() {
        let result = aggregate_order_payment(Fils::from(10_000), &[]);
        assert_eq!(result.status, OrderPaymentStatus::Pending);
        assert_eq!(result.method, None);
    }

    #[test]
    fn fully_paid_single_method() {
        let records = [record(10_000, PaymentMethod::GatewayInvoice, PaymentStatus::Paid)];
        let result = aggregate_order_payment(Fils::from(10_000), &records);
        assert_eq!(result.status, OrderPaymentStatus::Paid);
        assert_eq!(result.method, Some(PaymentMethod::GatewayInvoice));
        assert_eq!(result.total_paid, Fils::from(10_000));
    }

    #[test]
    fn partial_payment_with_pending_remainder_is_pending() {
        let records = [
            record(4_000, PaymentMethod::GatewayCharge, PaymentStatus::Paid),
            record(6_000, PaymentMethod::GatewayInvoice, PaymentStatus::Pending),
        ];
        let result = aggregate_order_payment(Fils::from(10_000), &records);
        assert_eq!(result.status, OrderPaymentStatus::Pending);
    }

    #[test]
    fn partial_payment_with_all_failures_is_failed() {
        let records = [
            record(4_000, PaymentMethod::GatewayCharge, PaymentStatus::Paid),
            record(6_000, PaymentMethod::GatewayInvoice, PaymentStatus::Failed),
        ];
        let result = aggregate_order_payment(Fils::from(10_000), &records);
        assert_eq!(result.status, OrderPaymentStatus::Failed);
    }

    #[test]
    fn partial_payment_no_pending_not_all_failed_is_pending() {
        let records = [
            record(4_000, PaymentMethod::GatewayCharge, PaymentStatus::Paid),
            record(2_000, PaymentMethod::Card, PaymentStatus::Refunded),
            record(4_000, PaymentMethod::GatewayInvoice, PaymentStatus::Failed),
        ];
        let result = aggregate_order_payment(Fils::from(10_000), &records);
        assert_eq!(result.status, OrderPaymentStatus::Pending);
    }

    #[test]
    fn nothing_paid_all_failed_is_failed() {
        let records = [
            record(5_000, PaymentMethod::GatewayInvoice, PaymentStatus::Failed),
            record(5_000, PaymentMethod::GatewayCharge, PaymentStatus::Failed),
        ];
        let result = aggregate_order_payment(Fils::from(10_000), &records);
        assert_eq!(result.status, OrderPaymentStatus::Failed);
    }

    #[test]
    fn nothing_paid_with_pending_is_pending() {
        let records = [
            record(5_000, PaymentMethod::GatewayInvoice, PaymentStatus::Failed),
            record(10_000, PaymentMethod::GatewayInvoice, PaymentStatus::Pending),
        ];
        let result = aggregate_order_payment(Fils::from(10_000), &records);
        assert_eq!(result.status, OrderPaymentStatus::Pending);
    }

    #[test]
    fn split_payment_marks_wallet_method() {
        let records = [
            record(4_000, PaymentMethod::Card, PaymentStatus::Paid),
            record(6_000, PaymentMethod::GatewayInvoice, PaymentStatus::Paid),
        ];
        let result = aggregate_order_payment(Fils::from(10_000), &records);
        assert_eq!(result.status, OrderPaymentStatus::Paid);
        assert_eq!(result.method, Some(PaymentMethod::Wallet));
    }

    #[test]
    fn paid_order_stays_paid_when_refund_records_arrive() {
        let records = [record(10_000, PaymentMethod::GatewayInvoice, PaymentStatus::Paid), refund(10_000)];
        let result = aggregate_order_payment(Fils::from(10_000), &records);
        assert_eq!(result.status, OrderPaymentStatus::Paid);
    }

    #[test]
    fn overpayment_is_paid() {
        let records = [record(12_000, PaymentMethod::GatewayCharge, PaymentStatus::Paid)];
        let result = aggregate_order_payment(Fils::from(10_000), &records);
        assert_eq!(result.status, OrderPaymentStatus::Paid);
    }
}
