use std::io;

/// Outcome of a failed artifact lookup against the remote listing API
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("no artifact found for {artifact_name}")]
    NotFound { artifact_name: String },

    #[error("artifact listing request failed: {0}")]
    Transient(String),

    #[error("an unexpected event occurred, no url found and no error returned")]
    NoUrl,
}

/// Custom error type for artifact_relay operations
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid push payload: {0}")]
    DecodeError(String),

    #[error("Artifact resolution failed: {0}")]
    ResolutionFailed(#[from] ResolveError),

    #[error("Publish failed: {0}")]
    PublishError(String),

    #[error("Broker connection failed: {0}")]
    BrokerError(String),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

impl From<serde_json::Error> for RelayError {
    fn from(e: serde_json::Error) -> Self {
        RelayError::DecodeError(e.to_string())
    }
}

/// Helper type for Results that use RelayError
pub type Result<T> = std::result::Result<T, RelayError>;
