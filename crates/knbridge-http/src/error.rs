//! Runtime error type for the HTTP transport.
//!
//! [`TransportError`] covers failures that occur once traffic actually
//! flows: missing sink addresses discovered at invocation time, rejected
//! payloads, upstream HTTP errors, network failures.  Definition-time
//! failures live in `knbridge-kernel`.

use std::net::SocketAddr;
use thiserror::Error;

use knbridge_kernel::error::EnvironmentError;

/// Runtime failure of an inbound or outbound operation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    /// The resolved sink has no host; checked at invocation time, before
    /// any HTTP attempt.
    #[error("HTTP operation failed because host is not defined")]
    HostNotDefined,

    /// Outbound messages must carry a payload.
    #[error("body must not be null")]
    BodyRequired,

    /// The remote host answered with a non-success status.
    #[error("HTTP operation failed invoking {url} with statusCode: {status}, statusMessage: {status_message}")]
    OperationFailed {
        url: String,
        status: u16,
        status_message: String,
    },

    /// The remote host could not be reached or the exchange broke midway.
    #[error("HTTP operation failed invoking {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The outbound request was cancelled by its deadline.
    #[error("HTTP operation failed invoking {url}: request cancelled")]
    Cancelled { url: String },

    /// The inbound listener could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Environment(#[from] EnvironmentError),

    /// Catch-all for internal failures with a human-readable message.
    #[error("transport error: {0}")]
    Internal(String),
}

/// Convenience alias.
pub type TransportResult<T> = Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_failed_message_format() {
        let err = TransportError::OperationFailed {
            url: "http://localhost:8080/".to_string(),
            status: 500,
            status_message: "Internal Server Error".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "HTTP operation failed invoking http://localhost:8080/ with statusCode: 500, statusMessage: Internal Server Error"
        );
    }

    #[test]
    fn precondition_messages() {
        assert_eq!(
            TransportError::HostNotDefined.to_string(),
            "HTTP operation failed because host is not defined"
        );
        assert_eq!(TransportError::BodyRequired.to_string(), "body must not be null");
    }
}
