use std::fmt::Debug;

use gateway_tools::GatewayClient;
use log::*;

use crate::{
    db_types::{Order, PaymentRecord, PaymentStatus},
    events::{EventProducers, OrderPaidEvent, PaymentSettledEvent},
    helpers::{map_remote_status, recover_correlation_id},
    lpe_api::{
        errors::PaymentFlowError,
        sync_objects::{RecordSyncResult, SweepSummary, SyncReport, WebhookEvent},
    },
    traits::{PaymentLedgerDatabase, PaymentLedgerError, RecordQueryFilter},
};

/// `ReconcileApi` resolves local payment state against the gateway's authoritative state.
///
/// It has three triggers: the scheduled batch sweep over all open gateway records, the targeted
/// sync for one or many records, and the webhook push path. All three funnel into the same
/// per-record routine, so the mapping tables and ledger-finalization rules are enforced in
/// exactly one place and every trigger is idempotent with respect to the others.
pub struct ReconcileApi<B, G> {
    db: B,
    gateway: G,
    producers: EventProducers,
    /// Pause between consecutive gateway reads in a batch. Politeness towards the gateway's rate
    /// limiter, not a correctness requirement.
    poll_delay: std::time::Duration,
}

impl<B, G> Debug for ReconcileApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconcileApi")
    }
}

impl<B, G> ReconcileApi<B, G>
where
    B: PaymentLedgerDatabase,
    G: GatewayClient,
{
    pub fn new(db: B, gateway: G, producers: EventProducers) -> Self {
        Self { db, gateway, producers, poll_delay: std::time::Duration::from_millis(0) }
    }

    pub fn with_poll_delay(mut self, delay: std::time::Duration) -> Self {
        self.poll_delay = delay;
        self
    }

    /// The scheduled batch sweep. Processes every open gateway-backed record in the window,
    /// isolating failures: one record's error is logged and reported, and its siblings are
    /// untouched by it. The batch may be stopped between records without corrupting state.
    pub async fn sweep(&self, window: chrono::Duration) -> SweepSummary {
        let mut summary = SweepSummary { success: true, ..Default::default() };
        let records = match self.db.open_gateway_records(window).await {
            Ok(records) => records,
            Err(e) => {
                error!("🔄️ Could not load the sweep work list: {e}");
                summary.success = false;
                summary.errors.push(format!("loading work list: {e}"));
                return summary;
            },
        };
        debug!("🔄️ Sweep starting over {} open gateway records", records.len());
        let total = records.len();
        for (i, record) in records.into_iter().enumerate() {
            let record_id = record.id;
            match self.reconcile_record(record).await {
                Ok(result) => {
                    if result.updated {
                        summary.updated_count += 1;
                    }
                },
                Err(e) => {
                    warn!("🔄️ Sweep: record #{record_id} failed: {e}");
                    summary.errors.push(format!("record #{record_id}: {e}"));
                },
            }
            summary.checked += 1;
            if i + 1 < total && !self.poll_delay.is_zero() {
                tokio::time::sleep(self.poll_delay).await;
            }
        }
        summary.success = summary.errors.is_empty();
        info!(
            "🔄️ Sweep complete. {} checked, {} updated, {} errors",
            summary.checked,
            summary.updated_count,
            summary.errors.len()
        );
        summary
    }

    /// Targeted sync over explicit record ids.
    pub async fn sync_by_ids(&self, record_ids: &[i64]) -> SyncReport {
        let mut report = SyncReport::default();
        for (i, &id) in record_ids.iter().enumerate() {
            let result = match self.db.fetch_payment_record(id).await {
                Ok(Some(record)) => self.reconcile_record(record).await.map_err(|e| (Some(id), e.to_string())),
                Ok(None) => Err((Some(id), PaymentLedgerError::RecordNotFound(id).to_string())),
                Err(e) => Err((Some(id), e.to_string())),
            };
            report.absorb(result);
            if i + 1 < record_ids.len() && !self.poll_delay.is_zero() {
                tokio::time::sleep(self.poll_delay).await;
            }
        }
        report
    }

    /// Targeted sync over a search filter (method, status, pagination).
    pub async fn sync_by_filter(&self, filter: RecordQueryFilter) -> SyncReport {
        let mut report = SyncReport::default();
        let records = match self.db.search_payment_records(filter).await {
            Ok(records) => records,
            Err(e) => {
                report.errors.push(crate::lpe_api::sync_objects::SyncError { record_id: None, message: e.to_string() });
                return report;
            },
        };
        let total = records.len();
        for (i, record) in records.into_iter().enumerate() {
            let id = record.id;
            let result = self.reconcile_record(record).await.map_err(|e| (Some(id), e.to_string()));
            report.absorb(result);
            if i + 1 < total && !self.poll_delay.is_zero() {
                tokio::time::sleep(self.poll_delay).await;
            }
        }
        report
    }

    /// The webhook push path. The payload carries the remote status directly, so no gateway read
    /// is needed; the mapping and ledger rules are identical to the pull path, and receiving the
    /// same event twice is a no-op.
    pub async fn process_webhook(&self, event: WebhookEvent) -> Result<RecordSyncResult, PaymentFlowError> {
        let record = self.resolve_webhook_record(&event).await?;
        debug!(
            "🔄️ Webhook for record #{} ({}): remote status '{}'",
            record.id, record.method, event.status
        );
        let raw = serde_json::to_string(&event).unwrap_or_default();
        self.apply_status_update(record, &event.status, &raw).await
    }

    async fn resolve_webhook_record(&self, event: &WebhookEvent) -> Result<PaymentRecord, PaymentFlowError> {
        if let Some(record_id) = event.metadata.record_id {
            if let Some(record) = self.db.fetch_payment_record(record_id).await? {
                return Ok(record);
            }
            warn!("🔄️ Webhook names payment record #{record_id}, which does not exist. Trying the correlation id.");
        }
        if let Some(correlation_id) = event.correlation_id.as_deref() {
            if let Some(record) = self.db.fetch_record_by_correlation(correlation_id).await? {
                return Ok(record);
            }
        }
        Err(PaymentFlowError::Validation(
            "Webhook payload does not identify any known payment record".to_string(),
        ))
    }

    /// The per-record pull routine: establish the correlation id (recovering it from the cached
    /// raw snapshot if the original call never recorded one), fetch remote truth, and apply it.
    async fn reconcile_record(&self, record: PaymentRecord) -> Result<RecordSyncResult, PaymentFlowError> {
        if !record.method.is_gateway_backed() {
            return Err(PaymentFlowError::Validation(format!(
                "Record #{} is a {} payment; there is no remote state to reconcile",
                record.id, record.method
            )));
        }
        let record = match record.correlation_id() {
            Some(_) => record,
            None => match recover_correlation_id(&record) {
                Some(id) => {
                    info!("🔄️ Recovered correlation id {id} for record #{} from its raw snapshot", record.id);
                    self.db.set_correlation_id(record.id, &id).await?;
                    self.db
                        .fetch_payment_record(record.id)
                        .await?
                        .ok_or(PaymentLedgerError::RecordNotFound(record.id))?
                },
                None => {
                    return Err(PaymentFlowError::Validation(format!(
                        "Record #{} has no gateway correlation id and none could be recovered",
                        record.id
                    )))
                },
            },
        };
        let correlation_id = match record.correlation_id() {
            Some(id) => id.to_string(),
            None => {
                return Err(PaymentFlowError::Validation(format!(
                    "Record #{} lost its correlation id between writes",
                    record.id
                )))
            },
        };
        let (remote_status, snapshot) = if record.method == crate::db_types::PaymentMethod::GatewayInvoice {
            let invoice = self.gateway.get_invoice(&correlation_id).await?;
            (invoice.status.clone(), invoice.snapshot())
        } else {
            let charge = self.gateway.get_charge(&correlation_id).await?;
            (charge.status.clone(), charge.snapshot())
        };
        self.apply_status_update(record, &remote_status, &snapshot).await
    }

    /// Maps a remote status and hands it to the storage layer's single idempotent application
    /// routine, then recomputes the linked order and fires hooks on the transitions that matter.
    async fn apply_status_update(
        &self,
        record: PaymentRecord,
        remote_status: &str,
        raw: &str,
    ) -> Result<RecordSyncResult, PaymentFlowError> {
        let expected = map_remote_status(record.method, remote_status).ok_or_else(|| {
            PaymentFlowError::Validation(format!(
                "Record #{} is a {} payment; there is no remote vocabulary for it",
                record.id, record.method
            ))
        })?;
        let old_status = record.status;
        let mut result = RecordSyncResult {
            record_id: record.id,
            method: record.method,
            remote_status: remote_status.to_string(),
            old_status,
            new_status: old_status,
            updated: false,
            wallet_credited: false,
            order_status: None,
        };
        if expected == old_status {
            trace!("🔄️ Record #{} already matches remote truth ({old_status}). Nothing to do.", record.id);
            return Ok(result);
        }
        let failure_reason =
            (expected == PaymentStatus::Failed).then(|| format!("gateway reported '{remote_status}'"));
        let outcome =
            self.db.apply_remote_status(record.id, expected, Some(raw), failure_reason.as_deref()).await?;
        result.new_status = outcome.record.status;
        result.updated = outcome.changed;
        result.wallet_credited = outcome.wallet_credited;
        if outcome.changed && !outcome.record.status.is_open() {
            self.call_payment_settled_hook(&outcome.record).await;
        }
        if let Some(order_id) = outcome.record.order_id.clone() {
            if outcome.changed
                && outcome.record.status == PaymentStatus::Paid
                && outcome.record.method.is_gateway_backed()
            {
                // The gateway side of a split payment settled; the wallet's reserved share moves now.
                let settled = self.db.collect_wallet_contributions(&order_id).await?;
                if settled > 0 {
                    debug!("🔄️ Settled {settled} wallet contribution(s) for order {order_id}");
                }
            }
            let update = self.db.recompute_order_payment(&order_id).await?;
            result.order_status = Some(update.order.payment_status);
            if update.newly_paid() {
                info!("🔄️ Order {} is now fully paid", update.order.order_id);
                self.call_order_paid_hook(&update.order).await;
            }
        }
        Ok(result)
    }

    async fn call_order_paid_hook(&self, order: &Order) {
        for producer in &self.producers.order_paid_producer {
            debug!("🔄️ Notifying order paid hook subscribers for {}", order.order_id);
            producer.publish_event(OrderPaidEvent::new(order.clone())).await;
        }
    }

    async fn call_payment_settled_hook(&self, record: &PaymentRecord) {
        for producer in &self.producers.payment_settled_producer {
            producer.publish_event(PaymentSettledEvent::new(record.clone())).await;
        }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
