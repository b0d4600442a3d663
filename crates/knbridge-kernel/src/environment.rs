//! The service catalogue: named service definitions and lookups over them.
//!
//! An [`Environment`] is built once from configuration (typically a JSON
//! document) and never mutated afterwards, so it needs no synchronisation.
//! Lookups resolve ambiguity by declaration order: the first matching
//! definition wins.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::EnvironmentError;

/// Well-known metadata keys on a [`ServiceDefinition`].
pub mod meta {
    /// HTTP path the service is reachable at (defaults to `/`).
    pub const SERVICE_PATH: &str = "service.path";
    /// Default content type for payloads flowing through the service.
    pub const CONTENT_TYPE: &str = "content.type";
    /// Event type produced or consumed by the service.
    pub const EVENT_TYPE: &str = "knative.event.type";
    /// Kubernetes-style object kind backing the service.
    pub const KIND: &str = "knative.kind";
    /// API version of the object backing the service.
    pub const API_VERSION: &str = "knative.apiVersion";
    /// Prefix for required-header filters on sources: `filter.<header>`.
    pub const FILTER_PREFIX: &str = "filter.";
    /// Prefix for forced outbound headers on sinks: `ce.override.<header>`.
    pub const CE_OVERRIDE_PREFIX: &str = "ce.override.";
}

// ─────────────────────────────────────────────────────────────────────────────
// Kinds and roles
// ─────────────────────────────────────────────────────────────────────────────

/// The discovery flavour of a service.  All three kinds are wire-identical
/// HTTP POST targets; they differ only in how names resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    Endpoint,
    Channel,
    Event,
}

impl ServiceKind {
    /// Case-insensitive parse from a string slice.
    pub fn from_str_ci(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "endpoint" => Some(ServiceKind::Endpoint),
            "channel" => Some(ServiceKind::Channel),
            "event" => Some(ServiceKind::Event),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Endpoint => "endpoint",
            ServiceKind::Channel => "channel",
            ServiceKind::Event => "event",
        }
    }
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a service receives events (source) or is invoked (sink).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceRole {
    Source,
    Sink,
}

impl ServiceRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceRole::Source => "source",
            ServiceRole::Sink => "sink",
        }
    }
}

impl std::fmt::Display for ServiceRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Service definitions
// ─────────────────────────────────────────────────────────────────────────────

/// One named service in the catalogue.
///
/// `host`/`port` are only meaningful on sinks; their absence is not an
/// error until an outbound call actually targets the definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDefinition {
    pub name: String,
    pub kind: ServiceKind,
    pub role: ServiceRole,
    #[serde(default)]
    pub host: Option<String>,
    /// Port of the service; `-1` means unset.
    #[serde(default = "unset_port")]
    pub port: i32,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

fn unset_port() -> i32 {
    -1
}

impl ServiceDefinition {
    pub fn new(kind: ServiceKind, role: ServiceRole, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            role,
            host: None,
            port: -1,
            metadata: HashMap::new(),
        }
    }

    /// An endpoint definition with an explicit address.
    pub fn endpoint(
        role: ServiceRole,
        name: impl Into<String>,
        host: impl Into<String>,
        port: i32,
    ) -> Self {
        let mut def = Self::new(ServiceKind::Endpoint, role, name);
        def.host = Some(host.into());
        def.port = port;
        def
    }

    /// A channel definition with an explicit address.
    pub fn channel(
        role: ServiceRole,
        name: impl Into<String>,
        host: impl Into<String>,
        port: i32,
    ) -> Self {
        let mut def = Self::new(ServiceKind::Channel, role, name);
        def.host = Some(host.into());
        def.port = port;
        def
    }

    /// An event definition with an explicit address.
    pub fn event(
        role: ServiceRole,
        name: impl Into<String>,
        host: impl Into<String>,
        port: i32,
    ) -> Self {
        let mut def = Self::new(ServiceKind::Event, role, name);
        def.host = Some(host.into());
        def.port = port;
        def
    }

    /// A source endpoint (inbound only, no address).
    pub fn source_endpoint(name: impl Into<String>) -> Self {
        Self::new(ServiceKind::Endpoint, ServiceRole::Source, name)
    }

    /// A source channel (inbound only, no address).
    pub fn source_channel(name: impl Into<String>) -> Self {
        Self::new(ServiceKind::Channel, ServiceRole::Source, name)
    }

    /// A source event (inbound only, no address).
    pub fn source_event(name: impl Into<String>) -> Self {
        Self::new(ServiceKind::Event, ServiceRole::Source, name)
    }

    /// Builder helper: attach a metadata entry.
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    fn meta(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// Declared HTTP path, if any.
    pub fn path(&self) -> Option<&str> {
        self.meta(meta::SERVICE_PATH)
    }

    /// Declared default content type, if any.
    pub fn content_type(&self) -> Option<&str> {
        self.meta(meta::CONTENT_TYPE)
    }

    /// Declared event type, if any.
    pub fn event_type(&self) -> Option<&str> {
        self.meta(meta::EVENT_TYPE)
    }

    /// Declared inbound filters: `(header, required value)` pairs.
    pub fn filters(&self) -> impl Iterator<Item = (&str, &str)> {
        self.metadata.iter().filter_map(|(k, v)| {
            k.strip_prefix(meta::FILTER_PREFIX)
                .map(|header| (header, v.as_str()))
        })
    }

    /// Declared outbound overrides: `(header, forced value)` pairs.
    pub fn ce_overrides(&self) -> impl Iterator<Item = (&str, &str)> {
        self.metadata.iter().filter_map(|(k, v)| {
            k.strip_prefix(meta::CE_OVERRIDE_PREFIX)
                .map(|header| (header, v.as_str()))
        })
    }

    /// Match this definition against an object-kind/apiVersion selector.
    ///
    /// An unspecified selector component is a wildcard; a specified one
    /// requires strict equality with the corresponding metadata entry.
    pub fn matches_selector(&self, kind: Option<&str>, api_version: Option<&str>) -> bool {
        let strict = |selector: Option<&str>, value: Option<&str>| match selector {
            None => true,
            Some(wanted) => value == Some(wanted),
        };
        strict(kind, self.meta(meta::KIND)) && strict(api_version, self.meta(meta::API_VERSION))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Environment
// ─────────────────────────────────────────────────────────────────────────────

/// Ordered, immutable catalogue of service definitions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Environment {
    #[serde(default)]
    pub services: Vec<ServiceDefinition>,
}

impl Environment {
    pub fn new(services: Vec<ServiceDefinition>) -> Self {
        Self { services }
    }

    /// Parse an environment document such as
    /// `{"services":[{"name":"ep","kind":"endpoint","role":"source"}]}`.
    pub fn from_json(document: &str) -> Result<Self, EnvironmentError> {
        Ok(serde_json::from_str(document)?)
    }

    /// Load an environment document from a file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, EnvironmentError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    fn find(
        &self,
        kind: ServiceKind,
        role: ServiceRole,
        name: &str,
    ) -> Option<&ServiceDefinition> {
        self.services
            .iter()
            .find(|d| d.kind == kind && d.role == role && d.name == name)
    }

    /// First source definition matching kind and name.
    pub fn find_source(&self, kind: ServiceKind, name: &str) -> Option<&ServiceDefinition> {
        self.find(kind, ServiceRole::Source, name)
    }

    /// First sink definition matching kind and name.  The host is not
    /// validated here; a missing host fails at invocation time.
    pub fn find_sink(&self, kind: ServiceKind, name: &str) -> Option<&ServiceDefinition> {
        self.find(kind, ServiceRole::Sink, name)
    }

    /// All source definitions of a kind, in declaration order.
    pub fn find_sources_by_kind(
        &self,
        kind: ServiceKind,
    ) -> impl Iterator<Item = &ServiceDefinition> {
        self.services
            .iter()
            .filter(move |d| d.kind == kind && d.role == ServiceRole::Source)
    }
}
