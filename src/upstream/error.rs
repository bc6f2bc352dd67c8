use thiserror::Error;

use super::Endpoint;

/// Upstream request and decoding errors
#[derive(Error, Debug)]
pub enum UpstreamError {
    /// Transport failure before a response was received
    #[error("Network error calling {endpoint}: {reason}")]
    Network { endpoint: Endpoint, reason: String },

    /// Request exceeded the configured timeout
    #[error("Timeout calling {endpoint}")]
    Timeout { endpoint: Endpoint },

    /// Non-success HTTP status
    #[error("Invalid HTTP status {status} from {endpoint}")]
    Status { endpoint: Endpoint, status: u16 },

    /// Response body was empty
    #[error("Empty response body from {endpoint}")]
    EmptyBody { endpoint: Endpoint },

    /// Response body is not syntactically valid JSON
    #[error("Invalid JSON response from {endpoint}: {snippet}")]
    InvalidJson { endpoint: Endpoint, snippet: String },

    /// Valid JSON with an unexpected shape
    #[error("Unexpected response shape from {endpoint}: {reason}")]
    Decode { endpoint: Endpoint, reason: String },

    /// A numeric field could not be parsed
    #[error("Field {field} is not numeric: {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    /// Cycle cancellation observed mid-request
    #[error("Request cancelled")]
    Cancelled,
}

impl UpstreamError {
    /// Network-level failures that may clear up by the next cycle
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            UpstreamError::Network { .. }
                | UpstreamError::Timeout { .. }
                | UpstreamError::Status { .. }
        )
    }

    /// Short label used as the `error_type` metric label
    pub fn kind(&self) -> &'static str {
        match self {
            UpstreamError::Network { .. } => "network",
            UpstreamError::Timeout { .. } => "timeout",
            UpstreamError::Status { .. } => "http_status",
            UpstreamError::EmptyBody { .. } => "empty_body",
            UpstreamError::InvalidJson { .. } => "invalid_json",
            UpstreamError::Decode { .. } => "decode",
            UpstreamError::InvalidNumber { .. } => "invalid_number",
            UpstreamError::Cancelled => "cancelled",
        }
    }
}
