use serde::{Deserialize, Serialize};

use crate::db_types::{
    Fils,
    Order,
    OrderPaymentStatus,
    PaymentMethod,
    PaymentRecord,
    PaymentStatus,
    WalletTransaction,
    WalletTxStatus,
};

/// Result of finalizing a pending wallet transaction. Finalization is idempotent, so callers can
/// distinguish "this call moved money" from "someone already settled this".
#[derive(Debug, Clone)]
pub enum FinalizeOutcome {
    /// This call applied the outcome. The updated ledger entry is returned.
    Applied(WalletTransaction),
    /// The transaction had already been finalized earlier; nothing was changed.
    AlreadyFinal(WalletTxStatus),
}

impl FinalizeOutcome {
    pub fn was_applied(&self) -> bool {
        matches!(self, FinalizeOutcome::Applied(_))
    }
}

/// Result of replaying a wallet's ledger. Only produced when the replay is consistent; any
/// mismatch surfaces as an `IntegrityError` instead.
#[derive(Debug, Clone, Serialize)]
pub struct IntegrityReport {
    pub customer_id: String,
    pub wallet_id: i64,
    /// Number of Completed entries replayed.
    pub transaction_count: usize,
    pub replayed_balance: Fils,
    pub stored_balance: Fils,
}

/// Result of applying a remote status to a payment record.
#[derive(Debug, Clone)]
pub struct RemoteStatusOutcome {
    pub record: PaymentRecord,
    pub previous_status: PaymentStatus,
    /// False when the record was already in the target state (duplicate webhook, overlapping
    /// reconciliation runs) and nothing was written.
    pub changed: bool,
    /// True when this call finalized the linked wallet transaction and moved the balance.
    pub wallet_credited: bool,
}

/// Result of recomputing an order's derived payment status.
#[derive(Debug, Clone)]
pub struct OrderUpdate {
    pub order: Order,
    pub previous_status: OrderPaymentStatus,
}

impl OrderUpdate {
    pub fn newly_paid(&self) -> bool {
        self.previous_status != OrderPaymentStatus::Paid && self.order.payment_status == OrderPaymentStatus::Paid
    }
}

/// Filter for searching payment records. Used by the targeted sync trigger.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordQueryFilter {
    pub customer_id: Option<String>,
    pub order_id: Option<String>,
    pub method: Option<PaymentMethod>,
    pub status: Option<PaymentStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl RecordQueryFilter {
    pub fn is_empty(&self) -> bool {
        self.customer_id.is_none()
            && self.order_id.is_none()
            && self.method.is_none()
            && self.status.is_none()
            && self.limit.is_none()
            && self.offset.is_none()
    }

    pub fn with_customer_id<S: Into<String>>(mut self, customer_id: S) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }

    pub fn with_order_id<S: Into<String>>(mut self, order_id: S) -> Self {
        self.order_id = Some(order_id.into());
        self
    }

    pub fn with_method(mut self, method: PaymentMethod) -> Self {
        self.method = Some(method);
        self
    }

    pub fn with_status(mut self, status: PaymentStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }
}
