//! Geocoding error types

use thiserror::Error;

/// Errors that can occur during geocoding operations
#[derive(Debug, Error)]
pub enum GeocodingError {
    /// Connection to the geocoding service failed (refused, unreachable, DNS)
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Request timeout
    #[error("Request timed out after {timeout_secs} seconds")]
    Timeout {
        /// The per-request timeout in seconds
        timeout_secs: u64,
    },

    /// Rate limit exceeded (HTTP 429)
    #[error("Rate limit exceeded, retry after {retry_after_secs:?} seconds")]
    RateLimited {
        /// Seconds to wait before retrying (if provided by the service)
        retry_after_secs: Option<u64>,
    },

    /// The service answered with a 5xx status
    #[error("Server error: HTTP {status}")]
    ServerError {
        /// HTTP status code
        status: u16,
    },

    /// The service rejected the request with a 4xx status (other than 429)
    #[error("Request rejected: HTTP {status}")]
    ClientError {
        /// HTTP status code
        status: u16,
    },

    /// Failed to parse the response body
    #[error("Parse error: {0}")]
    ParseError(String),

    /// The service had no result for the lookup
    #[error("Not found: {0}")]
    NotFound(String),

    /// The request was superseded by a newer one
    #[error("Request cancelled")]
    Cancelled,

    /// The persistent store failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl GeocodingError {
    /// Build an error from an HTTP status that is not a success
    #[must_use]
    pub const fn from_status(status: u16, retry_after_secs: Option<u64>) -> Self {
        match status {
            429 => Self::RateLimited { retry_after_secs },
            500..=599 => Self::ServerError { status },
            _ => Self::ClientError { status },
        }
    }

    /// Returns true if this error is retryable
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed(_)
                | Self::Timeout { .. }
                | Self::RateLimited { .. }
                | Self::ServerError { .. }
        )
    }

    /// Returns true if the request was superseded rather than failed
    #[must_use]
    pub const fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns true if the failure says nothing reached the service
    ///
    /// Timeouts and connection errors mean unreachable; an HTTP error status
    /// means the service answered.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::ConnectionFailed(_) | Self::Timeout { .. })
    }
}

impl From<crate::store::StorageError> for GeocodingError {
    fn from(err: crate::store::StorageError) -> Self {
        Self::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(GeocodingError::ConnectionFailed("refused".to_string()).is_retryable());
        assert!(GeocodingError::Timeout { timeout_secs: 10 }.is_retryable());
        assert!(GeocodingError::ServerError { status: 503 }.is_retryable());
        assert!(
            GeocodingError::RateLimited {
                retry_after_secs: Some(1)
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_non_retryable_errors() {
        assert!(!GeocodingError::ClientError { status: 404 }.is_retryable());
        assert!(!GeocodingError::ParseError("bad json".to_string()).is_retryable());
        assert!(!GeocodingError::NotFound("123".to_string()).is_retryable());
        assert!(!GeocodingError::Cancelled.is_retryable());
        assert!(!GeocodingError::Storage("disk full".to_string()).is_retryable());
        assert!(!GeocodingError::Configuration("empty".to_string()).is_retryable());
    }

    #[test]
    fn test_from_status() {
        assert!(matches!(
            GeocodingError::from_status(429, Some(30)),
            GeocodingError::RateLimited {
                retry_after_secs: Some(30)
            }
        ));
        assert!(matches!(
            GeocodingError::from_status(503, None),
            GeocodingError::ServerError { status: 503 }
        ));
        assert!(matches!(
            GeocodingError::from_status(404, None),
            GeocodingError::ClientError { status: 404 }
        ));
        assert!(matches!(
            GeocodingError::from_status(400, None),
            GeocodingError::ClientError { status: 400 }
        ));
    }

    #[test]
    fn test_cancellation() {
        assert!(GeocodingError::Cancelled.is_cancellation());
        assert!(!GeocodingError::Timeout { timeout_secs: 1 }.is_cancellation());
    }

    #[test]
    fn test_transport() {
        assert!(GeocodingError::Timeout { timeout_secs: 1 }.is_transport());
        assert!(GeocodingError::ConnectionFailed("x".to_string()).is_transport());
        assert!(!GeocodingError::ServerError { status: 500 }.is_transport());
    }

    #[test]
    fn test_error_display() {
        let err = GeocodingError::ServerError { status: 503 };
        assert!(err.to_string().contains("503"));

        let err = GeocodingError::RateLimited {
            retry_after_secs: Some(60),
        };
        assert!(err.to_string().contains("60"));

        let err = GeocodingError::Timeout { timeout_secs: 10 };
        assert!(err.to_string().contains("10"));
    }
}
