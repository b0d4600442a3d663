//! The endpoint URI grammar consumed by the routing engine:
//! `knative:<kind>/<name>[?<key>=<value>(&<key>=<value>)*]`.
//!
//! The double-slash form `knative://<kind>/<name>` is accepted as an
//! equivalent spelling.  Query values are percent-decoded.

use crate::environment::{meta, ServiceKind};
use crate::error::EnvironmentError;

/// Query key selecting the backing object kind of a definition.
pub const PARAM_KIND: &str = "kind";
/// Query key selecting the backing object apiVersion of a definition.
pub const PARAM_API_VERSION: &str = "apiVersion";
/// Query key enabling full CloudEvent headers on consumer replies.
pub const PARAM_REPLY_WITH_CLOUD_EVENT: &str = "replyWithCloudEvent";

/// A parsed endpoint URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointUri {
    pub kind: ServiceKind,
    pub name: String,
    params: Vec<(String, String)>,
}

impl EndpointUri {
    pub fn parse(input: &str) -> Result<Self, EnvironmentError> {
        let invalid = |reason: &str| EnvironmentError::InvalidUri {
            uri: input.to_string(),
            reason: reason.to_string(),
        };

        let rest = input
            .strip_prefix("knative:")
            .ok_or_else(|| invalid("expected 'knative:' scheme"))?;
        let rest = rest.strip_prefix("//").unwrap_or(rest);
        let (path, query) = match rest.split_once('?') {
            Some((path, query)) => (path, query),
            None => (rest, ""),
        };

        let (kind, name) = path
            .split_once('/')
            .ok_or_else(|| invalid("expected '<kind>/<name>'"))?;
        let kind = ServiceKind::from_str_ci(kind)
            .ok_or_else(|| invalid("kind must be one of endpoint, channel, event"))?;
        if name.is_empty() {
            return Err(invalid("service name is empty"));
        }

        let params = url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();

        Ok(Self { kind, name: name.to_string(), params })
    }

    /// First value of a query parameter.
    pub fn query(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// The `kind` selector, matched against `knative.kind` metadata.
    pub fn selector_kind(&self) -> Option<&str> {
        self.query(PARAM_KIND)
    }

    /// The `apiVersion` selector, matched against `knative.apiVersion`
    /// metadata.
    pub fn selector_api_version(&self) -> Option<&str> {
        self.query(PARAM_API_VERSION)
    }

    /// Whether consumer replies should carry the full CloudEvent header
    /// set.  Defaults to `false`.
    pub fn reply_with_cloudevent(&self) -> bool {
        self.query(PARAM_REPLY_WITH_CLOUD_EVENT)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }

    /// Per-URI outbound header overrides: `(header, forced value)` pairs
    /// from `ce.override.<header>` query parameters.
    pub fn ce_overrides(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().filter_map(|(k, v)| {
            k.strip_prefix(meta::CE_OVERRIDE_PREFIX)
                .map(|header| (header, v.as_str()))
        })
    }
}

impl std::fmt::Display for EndpointUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "knative:{}/{}", self.kind, self.name)?;
        for (i, (k, v)) in self.params.iter().enumerate() {
            write!(f, "{}{}={}", if i == 0 { '?' } else { '&' }, k, v)?;
        }
        Ok(())
    }
}
