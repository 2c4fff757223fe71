use serde::{Deserialize, Serialize};

use crate::db_types::{OrderPaymentStatus, PaymentMethod, PaymentStatus};

/// Outcome of the batch sweep, returned to the scheduler trigger.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepSummary {
    pub success: bool,
    pub checked: usize,
    pub updated_count: usize,
    pub errors: Vec<String>,
}

/// Per-record outcome of a reconciliation pass.
#[derive(Debug, Clone, Serialize)]
pub struct RecordSyncResult {
    pub record_id: i64,
    pub method: PaymentMethod,
    pub remote_status: String,
    pub old_status: PaymentStatus,
    pub new_status: PaymentStatus,
    /// False when the record was already in the mapped state (idempotent no-op).
    pub updated: bool,
    /// True when this pass finalized the linked wallet transaction and moved the balance.
    pub wallet_credited: bool,
    pub order_status: Option<OrderPaymentStatus>,
}

impl RecordSyncResult {
    pub fn status_mismatch(&self) -> bool {
        self.old_status != self.new_status
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncError {
    pub record_id: Option<i64>,
    pub message: String,
}

/// Outcome of a targeted sync run, returned to operators and webhook-driven rechecks.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub total_checked: usize,
    pub status_mismatches: usize,
    pub updated: usize,
    pub errors: Vec<SyncError>,
    pub results: Vec<RecordSyncResult>,
}

impl SyncReport {
    pub fn absorb(&mut self, result: Result<RecordSyncResult, (Option<i64>, String)>) {
        self.total_checked += 1;
        match result {
            Ok(r) => {
                if r.status_mismatch() {
                    self.status_mismatches += 1;
                }
                if r.updated {
                    self.updated += 1;
                }
                self.results.push(r);
            },
            Err((record_id, message)) => self.errors.push(SyncError { record_id, message }),
        }
    }
}

/// An asynchronous push notification from the gateway. The payload carries the same status
/// vocabulary as the polling endpoints plus a metadata bag identifying the local record (and,
/// for wallet top-ups, the reserved wallet transaction).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// The gateway object id (charge or invoice id).
    #[serde(default)]
    pub correlation_id: Option<String>,
    pub status: String,
    #[serde(default)]
    pub metadata: WebhookMetadata,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookMetadata {
    #[serde(default)]
    pub record_id: Option<i64>,
    #[serde(default)]
    pub wallet_transaction_id: Option<i64>,
    #[serde(default)]
    pub order_id: Option<String>,
}
