//! A scripted in-memory gateway for flow tests. Remote state is set by the test and the stub
//! answers like the real gateway would, including scripted outages.
use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};

use gateway_tools::{
    ChargeRequest,
    GatewayApiError,
    GatewayClient,
    InvoiceRequest,
    NotifyChannel,
    RemoteCharge,
    RemoteInvoice,
    RemoteRefund,
};
use lps_common::Fils;

#[derive(Default)]
struct StubState {
    next_id: u64,
    invoices: HashMap<String, String>,
    charges: HashMap<String, String>,
    created_invoices: usize,
    created_charges: usize,
    cancelled: Vec<String>,
    resent: Vec<String>,
    refunds: Vec<(String, Fils)>,
    failing_gets: HashSet<String>,
    new_invoice_status: Option<String>,
    new_charge_status: Option<String>,
}

#[derive(Clone, Default)]
pub struct StubGateway {
    state: Arc<Mutex<StubState>>,
}

#[allow(dead_code)]
impl StubGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_invoice_status(&self, id: &str, status: &str) {
        self.state.lock().unwrap().invoices.insert(id.to_string(), status.to_string());
    }

    pub fn set_charge_status(&self, id: &str, status: &str) {
        self.state.lock().unwrap().charges.insert(id.to_string(), status.to_string());
    }

    /// Newly created invoices will report this status instead of the default "SENT".
    pub fn new_invoices_report(&self, status: &str) {
        self.state.lock().unwrap().new_invoice_status = Some(status.to_string());
    }

    /// Newly created charges will report this status instead of the default "INITIATED".
    pub fn new_charges_report(&self, status: &str) {
        self.state.lock().unwrap().new_charge_status = Some(status.to_string());
    }

    /// Reads of this object id will fail with a 503 until cleared.
    pub fn fail_gets_for(&self, id: &str) {
        self.state.lock().unwrap().failing_gets.insert(id.to_string());
    }

    pub fn created_invoices(&self) -> usize {
        self.state.lock().unwrap().created_invoices
    }

    pub fn created_charges(&self) -> usize {
        self.state.lock().unwrap().created_charges
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.state.lock().unwrap().cancelled.clone()
    }

    pub fn resent(&self) -> Vec<String> {
        self.state.lock().unwrap().resent.clone()
    }

    pub fn refunds(&self) -> Vec<(String, Fils)> {
        self.state.lock().unwrap().refunds.clone()
    }
}

fn unavailable() -> GatewayApiError {
    GatewayApiError::QueryError { status: 503, message: "scripted outage".to_string() }
}

impl GatewayClient for StubGateway {
    async fn create_charge(&self, request: &ChargeRequest) -> Result<RemoteCharge, GatewayApiError> {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        state.created_charges += 1;
        let id = format!("chg_{}", state.next_id);
        let status = state.new_charge_status.clone().unwrap_or_else(|| "INITIATED".to_string());
        state.charges.insert(id.clone(), status.clone());
        Ok(RemoteCharge { id, status, amount: Some(request.amount), ..Default::default() })
    }

    async fn get_charge(&self, charge_id: &str) -> Result<RemoteCharge, GatewayApiError> {
        let state = self.state.lock().unwrap();
        if state.failing_gets.contains(charge_id) {
            return Err(unavailable());
        }
        let status = state
            .charges
            .get(charge_id)
            .cloned()
            .ok_or(GatewayApiError::QueryError { status: 404, message: "no such charge".to_string() })?;
        Ok(RemoteCharge { id: charge_id.to_string(), status, ..Default::default() })
    }

    async fn create_invoice(&self, request: &InvoiceRequest) -> Result<RemoteInvoice, GatewayApiError> {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        state.created_invoices += 1;
        let id = format!("inv_{}", state.next_id);
        let status = state.new_invoice_status.clone().unwrap_or_else(|| "SENT".to_string());
        state.invoices.insert(id.clone(), status.clone());
        Ok(RemoteInvoice {
            id: id.clone(),
            status,
            amount: Some(request.amount),
            url: Some(format!("https://pay.example/i/{id}")),
            order_ref: Some(request.order_ref.clone()),
            ..Default::default()
        })
    }

    async fn get_invoice(&self, invoice_id: &str) -> Result<RemoteInvoice, GatewayApiError> {
        let state = self.state.lock().unwrap();
        if state.failing_gets.contains(invoice_id) {
            return Err(unavailable());
        }
        let status = state
            .invoices
            .get(invoice_id)
            .cloned()
            .ok_or(GatewayApiError::QueryError { status: 404, message: "no such invoice".to_string() })?;
        Ok(RemoteInvoice { id: invoice_id.to_string(), status, ..Default::default() })
    }

    async fn cancel_invoice(&self, invoice_id: &str) -> Result<(), GatewayApiError> {
        let mut state = self.state.lock().unwrap();
        if state.failing_gets.contains(invoice_id) {
            return Err(unavailable());
        }
        state.invoices.insert(invoice_id.to_string(), "CANCELLED".to_string());
        state.cancelled.push(invoice_id.to_string());
        Ok(())
    }

    async fn resend_invoice(&self, invoice_id: &str, _channels: &[NotifyChannel]) -> Result<(), GatewayApiError> {
        let mut state = self.state.lock().unwrap();
        if !state.invoices.contains_key(invoice_id) {
            return Err(GatewayApiError::QueryError { status: 404, message: "no such invoice".to_string() });
        }
        state.resent.push(invoice_id.to_string());
        Ok(())
    }

    async fn create_refund(
        &self,
        charge_id: &str,
        amount: Fils,
        _reason: &str,
    ) -> Result<RemoteRefund, GatewayApiError> {
        let mut state = self.state.lock().unwrap();
        if !state.charges.contains_key(charge_id) {
            return Err(GatewayApiError::QueryError { status: 404, message: "no such charge".to_string() });
        }
        state.next_id += 1;
        let id = format!("ref_{}", state.next_id);
        state.refunds.push((charge_id.to_string(), amount));
        Ok(RemoteRefund {
            id,
            status: "CAPTURED".to_string(),
            amount: Some(amount),
            charge_id: Some(charge_id.to_string()),
            ..Default::default()
        })
    }
}
