use crate::db_types::{Order, PaymentRecord};

/// Published when an order's derived payment status transitions into Paid. Subscribers kick off
/// fulfilment-side effects (notifying the processing pipeline, customer emails, and so on);
/// nothing in this engine depends on them.
#[derive(Debug, Clone)]
pub struct OrderPaidEvent {
    pub order: Order,
}

impl OrderPaidEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

/// Published when a payment record settles (Paid or Failed) through reconciliation.
#[derive(Debug, Clone)]
pub struct PaymentSettledEvent {
    pub record: PaymentRecord,
}

impl PaymentSettledEvent {
    pub fn new(record: PaymentRecord) -> Self {
        Self { record }
    }
}
