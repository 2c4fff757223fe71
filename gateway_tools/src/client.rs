use std::fmt::Display;

use lps_common::Fils;

use crate::{
    data_objects::{ChargeRequest, InvoiceRequest, RemoteCharge, RemoteInvoice, RemoteRefund},
    error::GatewayApiError,
};

/// Channels the gateway can use to (re-)deliver an invoice to a customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyChannel {
    Sms,
    Email,
}

impl Display for NotifyChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotifyChannel::Sms => write!(f, "sms"),
            NotifyChannel::Email => write!(f, "email"),
        }
    }
}

/// The narrow interface through which the payment engine talks to the external gateway.
///
/// Every call crosses a network boundary: all of them are fallible, none of them may be assumed
/// to have succeeded, and callers must treat returned status strings as free-form remote
/// vocabulary. Implementations must not log card data or credentials.
#[allow(async_fn_in_trait)]
pub trait GatewayClient: Clone + Send + Sync {
    async fn create_charge(&self, request: &ChargeRequest) -> Result<RemoteCharge, GatewayApiError>;

    async fn get_charge(&self, charge_id: &str) -> Result<RemoteCharge, GatewayApiError>;

    async fn create_invoice(&self, request: &InvoiceRequest) -> Result<RemoteInvoice, GatewayApiError>;

    async fn get_invoice(&self, invoice_id: &str) -> Result<RemoteInvoice, GatewayApiError>;

    /// Cancels an open invoice. Cancelling an invoice that is already closed is a remote-side
    /// error; callers that only need best-effort cleanup should log and ignore failures.
    async fn cancel_invoice(&self, invoice_id: &str) -> Result<(), GatewayApiError>;

    /// Asks the gateway to re-deliver an open invoice over the given channels.
    async fn resend_invoice(&self, invoice_id: &str, channels: &[NotifyChannel]) -> Result<(), GatewayApiError>;

    async fn create_refund(&self, charge_id: &str, amount: Fils, reason: &str)
        -> Result<RemoteRefund, GatewayApiError>;
}
