use thiserror::Error;

/// Failures surfaced by coordinator operations.
///
/// Every variant carries the collaborator's message so it can be shown as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("contract setup failed: {0}")]
    ContractSetup(String),
    #[error("submission failed: {0}")]
    Submission(String),
    #[error("query failed: {0}")]
    Query(String),
}

impl ClientError {
    pub fn message(&self) -> &str {
        match self {
            ClientError::Connection(message)
            | ClientError::ContractSetup(message)
            | ClientError::Submission(message)
            | ClientError::Query(message) => message,
        }
    }
}
