//! The in-process message exchanged between the transport and the routing
//! engine.
//!
//! All fields use owned, allocation-friendly types so messages can be sent
//! across async task boundaries without lifetime complications.  Header keys
//! live in two namespaces: wire-form HTTP names (matched case-insensitively)
//! and the internal `Camel*` names (matched exactly).  Internal headers never
//! appear on the wire.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The plain HTTP content type header.
pub const CONTENT_TYPE: &str = "Content-Type";

/// Reply header carrying the HTTP status of a completed outbound call.
pub const HTTP_RESPONSE_CODE: &str = "CamelHttpResponseCode";

/// Prefix of the internal (engine-facing) header namespace.
pub const INTERNAL_PREFIX: &str = "Camel";

/// Whether a header belongs to the internal namespace.
pub fn is_internal(name: &str) -> bool {
    name.starts_with(INTERNAL_PREFIX)
}

/// Case-insensitive header lookup, for wire-form names.
pub fn get_ignore_case<'a>(headers: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// A message flowing between the HTTP transport and the routing engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeMessage {
    /// Wire-form and internal-form headers.
    pub headers: HashMap<String, String>,
    /// Payload bytes; `None` when the message deliberately carries no body.
    pub body: Option<Vec<u8>>,
}

impl BridgeMessage {
    /// An empty message with no headers and no body.
    pub fn new() -> Self {
        Self::default()
    }

    /// A message whose body is the given UTF-8 text.
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            headers: HashMap::new(),
            body: Some(body.into().into_bytes()),
        }
    }

    /// Builder helper: attach a header.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Builder helper: set the body.
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(key.into(), value.into());
    }

    /// Exact-key header lookup (internal namespace).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Case-insensitive header lookup (wire namespace).
    pub fn header_ignore_case(&self, name: &str) -> Option<&str> {
        get_ignore_case(&self.headers, name)
    }

    /// The message content type, if any.
    pub fn content_type(&self) -> Option<&str> {
        self.header_ignore_case(CONTENT_TYPE)
    }

    /// The body decoded as UTF-8, replacing invalid sequences.
    pub fn body_text(&self) -> Option<String> {
        self.body
            .as_ref()
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }
}
