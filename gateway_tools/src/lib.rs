//! Client library for the card/invoice payment gateway.
//!
//! The gateway is an external system and everything it reports is treated as the authoritative
//! truth about money movement. This crate exposes a deliberately narrow surface: typed
//! request/response objects, the [`GatewayClient`] trait that the payment engine consumes, and
//! [`PaymentGatewayApi`], an HTTP implementation of that trait.
//!
//! Remote status values are free-form strings. This crate passes them through untouched; mapping
//! them onto local payment statuses is the engine's job.
mod api;
mod client;
mod config;
mod error;

mod data_objects;

pub use api::PaymentGatewayApi;
pub use client::{GatewayClient, NotifyChannel};
pub use config::GatewayConfig;
pub use data_objects::{
    ChargeRequest,
    CustomerInfo,
    InvoiceLine,
    InvoiceRequest,
    RemoteCharge,
    RemoteInvoice,
    RemoteRefund,
    RemoteResponse,
    MAX_RAW_SNAPSHOT_BYTES,
};
pub use error::GatewayApiError;
