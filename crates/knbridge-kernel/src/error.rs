//! Definition-time error types.
//!
//! Everything here can be detected before any network I/O happens: bad
//! endpoint URIs, unresolvable service names, malformed environment
//! documents, unsupported spec versions, undecodable event payloads.
//! Runtime failures (connection refused, upstream errors, …) belong to the
//! transport implementation crate.

use thiserror::Error;

use crate::environment::{ServiceKind, ServiceRole};

/// Errors arising from the service catalogue and endpoint URIs.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EnvironmentError {
    /// The endpoint URI does not follow `knative:<kind>/<name>[?…]`.
    #[error("invalid endpoint uri '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    /// No catalogue entry satisfies the requested kind, name and role.
    #[error("no {role} definition matching {kind}/{name}")]
    ServiceNotFound {
        role: ServiceRole,
        kind: ServiceKind,
        name: String,
    },

    /// The environment document could not be parsed.
    #[error("invalid environment document: {0}")]
    InvalidDocument(#[from] serde_json::Error),

    /// The environment document could not be read.
    #[error("failed to read environment document: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors arising from the CloudEvents mapping layer.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CloudEventError {
    /// The configured spec version is not one of 0.1, 0.2, 0.3.
    #[error("unknown CloudEvents spec version '{0}'")]
    UnknownSpecVersion(String),

    /// A structured-mode payload could not be decoded.
    #[error("malformed structured CloudEvent payload: {0}")]
    Decode(String),
}
