use serde_json::Value;
use thiserror::Error;

/// Errors returned by gateway operations.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Transport failure or an error object reported by the node.
    ///
    /// `payload` holds the node's error body when one was returned.
    #[error("RPC error: {message}")]
    Rpc {
        message: String,
        payload: Option<Value>,
    },

    /// The node answered but `result` was missing, null or unusable.
    #[error("{method}: result is null")]
    EmptyResult { method: String },

    #[error("Can't find {0} in abi")]
    AbiMethodNotFound(String),

    #[error("{0} is not supported")]
    UnsupportedChain(String),

    #[error("No event with topic {0} in abi")]
    EventNotFound(String),

    #[error("Failed to encode call: {0}")]
    Encoding(String),

    #[error("Failed to decode {what}: {reason}")]
    Decoding { what: String, reason: String },

    #[error("Invalid private key: {0}")]
    InvalidKey(String),

    #[error("Failed to sign transaction: {0}")]
    Signing(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl GatewayError {
    pub(crate) fn rpc(message: impl Into<String>) -> Self {
        Self::Rpc {
            message: message.into(),
            payload: None,
        }
    }

    pub(crate) fn empty(method: &str) -> Self {
        Self::EmptyResult {
            method: method.to_string(),
        }
    }

    pub(crate) fn decoding(what: impl Into<String>, reason: impl ToString) -> Self {
        Self::Decoding {
            what: what.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether a failed request to the primary node should be repeated on the
    /// fallback. Answers an operation cannot parse are always repeated.
    pub fn is_retryable_on_fallback(&self) -> bool {
        matches!(self, Self::Rpc { .. } | Self::EmptyResult { .. })
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;
