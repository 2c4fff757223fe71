//! Laundry Payment Engine
//!
//! The payment engine keeps the local ledger of customer wallet balances and order payment state
//! consistent with the state held by the external payment gateway, despite asynchronous webhooks,
//! polling delays, partial failures and duplicate invoice creation attempts.
//!
//! The library is divided into three main sections:
//! 1. Database management and control ([`mod@sqlite`]). SQLite is the supported backend. You
//!    should never need to access the database directly. Instead, use the public API provided by
//!    the engine. The exception is the data types used in the database, which are defined in the
//!    [`mod@db_types`] module and are public.
//! 2. The engine public API ([`mod@lpe_api`]). This provides the public-facing functionality:
//!    wallet ledger operations, invoice lifecycle management and status reconciliation. Backends
//!    implement the traits in the [`mod@traits`] module to drive it.
//! 3. A set of events that can be subscribed to ([`mod@events`]). These are emitted when certain
//!    state transitions occur, e.g. when an order's payment completes, an `OrderPaidEvent` is
//!    published. A simple actor framework lets you hook into these events.
pub mod db_types;
pub mod events;
pub mod helpers;
mod lpe_api;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub mod sqlite;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;

pub use lpe_api::{
    errors::PaymentFlowError,
    invoice_flow_api::{EnsureInvoiceResult, InvoiceFlowApi},
    payment_flow_api::{PaymentFlowApi, RefundDestination, RefundResult, TopUpResult},
    reconcile_api::ReconcileApi,
    sync_objects::{RecordSyncResult, SweepSummary, SyncError, SyncReport, WebhookEvent, WebhookMetadata},
    wallet_api::WalletApi,
};
