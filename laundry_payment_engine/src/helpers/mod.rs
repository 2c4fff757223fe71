mod aggregator;
mod recovery;
mod status_map;

pub use aggregator::{aggregate_order_payment, AggregateResult};
pub use recovery::recover_correlation_id;
pub use status_map::{invoice_still_open, map_charge_status, map_invoice_status, map_remote_status};
