//! Transport error types.

use thiserror::Error;

use crate::resync::Generation;

/// Errors produced while performing or applying a request.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The response belongs to a superseded generation and must not be applied.
    ///
    /// Callers drop this silently; it is not a failure.
    #[error("stale response for generation {generation} dropped")]
    Stale { generation: Generation },

    /// The server answered with a non-success status code.
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// The request could not be sent or the body could not be read.
    #[error("request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    /// The response body was not what the caller expected.
    #[error("failed to decode response from {url}: {reason}")]
    Decode { url: String, reason: String },

    /// The HTTP client could not be constructed.
    #[error("failed to create HTTP client: {0}")]
    Client(String),

    /// No Tokio runtime was available to run request tasks.
    #[error("no async runtime available: {0}")]
    Runtime(String),
}

impl TransportError {
    /// Returns true if this error only signals a superseded response.
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::Stale { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_classification() {
        let stale = TransportError::Stale {
            generation: Generation::mint(),
        };
        assert!(stale.is_stale());

        let status = TransportError::Status {
            status: 500,
            url: "/sst/regions/".to_string(),
        };
        assert!(!status.is_stale());
        assert_eq!(status.to_string(), "HTTP 500 from /sst/regions/");
    }
}
