use std::sync::Arc;

use log::*;
use lps_common::Fils;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Method,
};
use serde::Serialize;
use serde_json::Value;

use crate::{
    client::{GatewayClient, NotifyChannel},
    config::GatewayConfig,
    data_objects::{ChargeRequest, InvoiceRequest, RemoteCharge, RemoteInvoice, RemoteRefund, RemoteResponse},
    GatewayApiError,
};

/// HTTP implementation of [`GatewayClient`].
///
/// The client is cheap to clone (the underlying connection pool is shared) and carries its bearer
/// credential in the default headers, so individual calls never handle the secret.
#[derive(Clone)]
pub struct PaymentGatewayApi {
    config: GatewayConfig,
    client: Arc<Client>,
}

impl PaymentGatewayApi {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayApiError> {
        let mut headers = HeaderMap::with_capacity(2);
        let bearer = format!("Bearer {}", config.api_key.reveal());
        let mut val =
            HeaderValue::from_str(bearer.as_str()).map_err(|e| GatewayApiError::Initialization(e.to_string()))?;
        val.set_sensitive(true);
        headers.insert("Authorization", val);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client =
            Client::builder().default_headers(headers).build().map_err(|e| GatewayApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    /// Sends a request and returns the raw JSON payload. Success is a 2xx response; anything else
    /// is surfaced as [`GatewayApiError::QueryError`] with the remote message attached.
    pub async fn rest_query<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<B>,
    ) -> Result<Value, GatewayApiError> {
        let url = self.url(path);
        trace!("🌐️ Sending {method} {url}");
        let mut req = self.client.request(method, url);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(|e| GatewayApiError::ResponseError(e.to_string()))?;
        if response.status().is_success() {
            trace!("🌐️ Query successful. {}", response.status());
            response.json::<Value>().await.map_err(|e| GatewayApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| GatewayApiError::ResponseError(e.to_string()))?;
            Err(GatewayApiError::QueryError { status, message })
        }
    }
}

/// Decodes a charge payload, degrading to the minimal `id`/`status` shape when the gateway sends
/// something this client does not recognize.
fn charge_from_value(value: Value) -> Result<RemoteCharge, GatewayApiError> {
    match RemoteResponse::classify(&value) {
        RemoteResponse::Charge(c) => Ok(c),
        RemoteResponse::Unrecognized { id: Some(id), status: Some(status) } => {
            debug!("🌐️ Unrecognized charge payload shape for {id}. Proceeding with id and status only.");
            Ok(RemoteCharge { id, status, raw: value, ..Default::default() })
        },
        other => Err(GatewayApiError::ResponseError(format!(
            "Expected a charge object, got {:?} without id/status",
            other.id()
        ))),
    }
}

fn invoice_from_value(value: Value) -> Result<RemoteInvoice, GatewayApiError> {
    match RemoteResponse::classify(&value) {
        RemoteResponse::Invoice(i) => Ok(i),
        RemoteResponse::Unrecognized { id: Some(id), status: Some(status) } => {
            debug!("🌐️ Unrecognized invoice payload shape for {id}. Proceeding with id and status only.");
            Ok(RemoteInvoice { id, status, raw: value, ..Default::default() })
        },
        other => Err(GatewayApiError::ResponseError(format!(
            "Expected an invoice object, got {:?} without id/status",
            other.id()
        ))),
    }
}

impl GatewayClient for PaymentGatewayApi {
    async fn create_charge(&self, request: &ChargeRequest) -> Result<RemoteCharge, GatewayApiError> {
        debug!("🌐️ Creating charge of {} for customer {}", request.amount, request.customer_id);
        let value = self.rest_query(Method::POST, "/charges", Some(request)).await?;
        let charge = charge_from_value(value)?;
        info!("🌐️ Charge {} created with remote status {}", charge.id, charge.status);
        Ok(charge)
    }

    async fn get_charge(&self, charge_id: &str) -> Result<RemoteCharge, GatewayApiError> {
        let path = format!("/charges/{charge_id}");
        let value = self.rest_query::<()>(Method::GET, &path, None).await?;
        let charge = charge_from_value(value)?;
        debug!("🌐️ Fetched charge {}. Remote status: {}", charge.id, charge.status);
        Ok(charge)
    }

    async fn create_invoice(&self, request: &InvoiceRequest) -> Result<RemoteInvoice, GatewayApiError> {
        debug!("🌐️ Creating invoice of {} for order {}", request.amount, request.order_ref);
        let value = self.rest_query(Method::POST, "/invoices", Some(request)).await?;
        let invoice = invoice_from_value(value)?;
        info!("🌐️ Invoice {} created with remote status {}", invoice.id, invoice.status);
        Ok(invoice)
    }

    async fn get_invoice(&self, invoice_id: &str) -> Result<RemoteInvoice, GatewayApiError> {
        let path = format!("/invoices/{invoice_id}");
        let value = self.rest_query::<()>(Method::GET, &path, None).await?;
        let invoice = invoice_from_value(value)?;
        debug!("🌐️ Fetched invoice {}. Remote status: {}", invoice.id, invoice.status);
        Ok(invoice)
    }

    async fn cancel_invoice(&self, invoice_id: &str) -> Result<(), GatewayApiError> {
        let path = format!("/invoices/{invoice_id}/cancel");
        let _ = self.rest_query::<()>(Method::POST, &path, None).await?;
        info!("🌐️ Cancelled invoice {invoice_id}");
        Ok(())
    }

    async fn resend_invoice(&self, invoice_id: &str, channels: &[NotifyChannel]) -> Result<(), GatewayApiError> {
        let channels = channels.iter().map(|c| c.to_string()).collect::<Vec<_>>();
        let path = format!("/invoices/{invoice_id}/resend");
        let body = serde_json::json!({ "channels": channels });
        let _ = self.rest_query(Method::POST, &path, Some(body)).await?;
        info!("🌐️ Resent invoice {invoice_id} over [{}]", channels.join(", "));
        Ok(())
    }

    async fn create_refund(&self, charge_id: &str, amount: Fils, reason: &str) -> Result<RemoteRefund, GatewayApiError> {
        debug!("🌐️ Creating refund of {amount} against charge {charge_id}");
        let body = serde_json::json!({ "charge_id": charge_id, "amount": amount, "reason": reason });
        let value = self.rest_query(Method::POST, "/refunds", Some(body)).await?;
        let refund = match RemoteResponse::classify(&value) {
            RemoteResponse::Refund(r) => r,
            RemoteResponse::Unrecognized { id: Some(id), status: Some(status) } => {
                debug!("🌐️ Unrecognized refund payload shape for {id}. Proceeding with id and status only.");
                RemoteRefund { id, status, raw: value, ..Default::default() }
            },
            other => {
                return Err(GatewayApiError::ResponseError(format!(
                    "Expected a refund object, got {:?} without id/status",
                    other.id()
                )))
            },
        };
        info!("🌐️ Refund {} created with remote status {}", refund.id, refund.status);
        Ok(refund)
    }
}
