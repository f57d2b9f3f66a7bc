//! Error taxonomy for the relay.
//!
//! Per-message failures (`Decode`, `Encode`, `Publish`, `MissingIdentity`) are
//! recovered by logging and dropping the single message. Only
//! `Configuration` is fatal, and only at startup.

use thiserror::Error;

/// A payload could not be turned into usable fields.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("payload is a JSON {0}, expected an object")]
    NotAnObject(&'static str),

    #[error("required field '{0}' is missing")]
    MissingField(String),

    #[error("field '{field}' must be numeric, found {found}")]
    NonNumericField { field: String, found: String },
}

/// Failure reported by a message client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request for topic '{topic}' rejected: {reason}")]
    Rejected { topic: String, reason: String },

    #[error("message client is disconnected")]
    Disconnected,
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("failed to encode outbound payload: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to publish to '{topic}': {source}")]
    Publish {
        topic: String,
        #[source]
        source: ClientError,
    },

    #[error("failed to subscribe to '{topic}': {source}")]
    Subscribe {
        topic: String,
        #[source]
        source: ClientError,
    },

    #[error("outbound message for '{topic}' has no '{field}' identity")]
    MissingIdentity { topic: String, field: String },

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl RelayError {
    /// Short, stable label used as the `error_kind` log field.
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::Decode(_) => "decode_error",
            RelayError::Encode(_) => "encode_error",
            RelayError::Publish { .. } => "publish_error",
            RelayError::Subscribe { .. } => "subscribe_error",
            RelayError::MissingIdentity { .. } => "missing_identity",
            RelayError::Configuration(_) => "configuration_error",
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        RelayError::Configuration(message.into())
    }
}

pub type RelayResult<T> = Result<T, RelayError>;
