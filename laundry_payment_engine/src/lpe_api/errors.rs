use gateway_tools::GatewayApiError;
use thiserror::Error;

use crate::traits::PaymentLedgerError;

#[derive(Debug, Error)]
pub enum PaymentFlowError {
    #[error("{0}")]
    Ledger(#[from] PaymentLedgerError),
    /// The gateway could not be reached or answered abnormally. Retryable: local state is
    /// unchanged and the next sweep or webhook will try again.
    #[error("Gateway call failed: {0}")]
    Gateway(#[from] GatewayApiError),
    /// The request can never succeed as posed (missing customer data, empty order, bad amount).
    /// Surfaced to the caller immediately and never retried by the reconciler.
    #[error("Invalid request: {0}")]
    Validation(String),
}

impl PaymentFlowError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PaymentFlowError::Gateway(_) | PaymentFlowError::Ledger(PaymentLedgerError::ConcurrencyConflict(_))
        )
    }
}
