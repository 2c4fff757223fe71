//! # Laundry payment server
//! This crate hosts the HTTP surface of the payment platform. It is responsible for:
//! * Listening for incoming webhook notifications from the payment gateway.
//! * Exposing the batch-sweep and targeted-sync reconciliation triggers to the scheduler and to
//!   operators.
//! * Exposing the invoice, top-up, refund and wallet operator endpoints.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more
//! information.
//!
//! ## Routes
//! * `/health`: liveness probe.
//! * `/webhook/gateway`: the gateway's push channel. HMAC-authenticated.
//! * `/api/...`: operator endpoints, guarded by the `lps-api-key` header.
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;

pub mod helpers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod sweep_worker;
