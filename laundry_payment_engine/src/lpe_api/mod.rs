//! The payment engine public API.
//!
//! Each API struct is generic over a [`crate::traits::PaymentLedgerDatabase`] backend (and, where
//! the flow talks to the gateway, a [`gateway_tools::GatewayClient`]), so the flows can be tested
//! against in-memory stubs and wired to real implementations in the server.
pub mod errors;
pub mod invoice_flow_api;
pub mod payment_flow_api;
pub mod reconcile_api;
pub mod sync_objects;
pub mod wallet_api;
