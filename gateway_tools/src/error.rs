use thiserror::Error;

/// Errors raised by the gateway client. All of these represent a failure to obtain remote truth
/// and are safe to retry; none of them imply anything about the local ledger.
#[derive(Debug, Error)]
pub enum GatewayApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Invalid request: {0}")]
    RequestError(String),
    #[error("Invalid response: {0}")]
    ResponseError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("The gateway returned an empty response")]
    EmptyResponse,
}
