use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use laundry_payment_engine::{traits::PaymentLedgerError, PaymentFlowError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Payload deserialization error")]
    CouldNotDeserializePayload,
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    #[error("{0}")]
    PaymentError(#[from] PaymentFlowError),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::CouldNotDeserializePayload => StatusCode::BAD_REQUEST,
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            Self::PaymentError(e) => payment_status_code(e),
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

fn payment_status_code(e: &PaymentFlowError) -> StatusCode {
    match e {
        PaymentFlowError::Validation(_) => StatusCode::BAD_REQUEST,
        PaymentFlowError::Gateway(_) => StatusCode::BAD_GATEWAY,
        PaymentFlowError::Ledger(le) => match le {
            PaymentLedgerError::WalletNotFound(_)
            | PaymentLedgerError::RecordNotFound(_)
            | PaymentLedgerError::TransactionNotFound(_)
            | PaymentLedgerError::OrderNotFound(_) => StatusCode::NOT_FOUND,
            PaymentLedgerError::ValidationError(_) => StatusCode::BAD_REQUEST,
            PaymentLedgerError::InsufficientBalance { .. } => StatusCode::CONFLICT,
            PaymentLedgerError::ConcurrencyConflict(_) => StatusCode::CONFLICT,
            PaymentLedgerError::WalletInactive(_) => StatusCode::CONFLICT,
            PaymentLedgerError::IllegalStatusTransition { .. } => StatusCode::CONFLICT,
            PaymentLedgerError::IntegrityError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PaymentLedgerError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        },
    }
}

impl From<PaymentLedgerError> for ServerError {
    fn from(e: PaymentLedgerError) -> Self {
        ServerError::PaymentError(PaymentFlowError::Ledger(e))
    }
}
