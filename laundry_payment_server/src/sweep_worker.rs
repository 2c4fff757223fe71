use gateway_tools::PaymentGatewayApi;
use laundry_payment_engine::{events::EventProducers, ReconcileApi, SqliteDatabase};
use log::*;
use tokio::task::JoinHandle;

use crate::config::SweepConfig;

/// Starts the background reconciliation sweep. Do not await the returned JoinHandle, as it runs
/// indefinitely. The sweep may be interrupted between records at any time without corrupting
/// state, so no shutdown coordination is needed.
pub fn start_sweep_worker(
    db: SqliteDatabase,
    gateway: PaymentGatewayApi,
    producers: EventProducers,
    config: SweepConfig,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(config.interval);
        let api = ReconcileApi::new(db, gateway, producers).with_poll_delay(config.poll_delay);
        info!("🕰️ Payment status sweep worker started (every {:?})", config.interval);
        loop {
            timer.tick().await;
            debug!("🕰️ Running payment status sweep");
            let summary = api.sweep(config.window).await;
            if summary.success {
                info!("🕰️ Sweep done: {} checked, {} updated", summary.checked, summary.updated_count);
            } else {
                warn!(
                    "🕰️ Sweep finished with errors: {} checked, {} updated, {} errors. First error: {}",
                    summary.checked,
                    summary.updated_count,
                    summary.errors.len(),
                    summary.errors.first().map(String::as_str).unwrap_or("?")
                );
            }
        }
    })
}
