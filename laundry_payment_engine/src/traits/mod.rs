//! Behaviour definitions for payment-engine backends.
//!
//! Backends (SQLite is the in-tree implementation) implement [`PaymentLedgerDatabase`] to provide
//! atomic storage for wallets, ledger entries, payment records and the payment slice of orders.
//! The API layer in [`crate::lpe_api`] is written against this trait only.
mod data_objects;
mod payment_ledger_database;

pub use data_objects::{
    FinalizeOutcome,
    IntegrityReport,
    OrderUpdate,
    RecordQueryFilter,
    RemoteStatusOutcome,
};
pub use payment_ledger_database::{PaymentLedgerDatabase, PaymentLedgerError};
