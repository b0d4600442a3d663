//! Inbound consumer registrations and their header filters.

use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;
use tracing::warn;

use knbridge_kernel::message;
use knbridge_kernel::receiver::EventReceiver;
use knbridge_kernel::ServiceDefinition;

/// A compiled predicate requiring one header to hold a given value.
///
/// Matching is literal-first: if the request header equals the declared
/// value verbatim, the regex engine is never consulted.  Otherwise the
/// declared value is interpreted as a regular expression anchored to the
/// full header value.
#[derive(Debug, Clone)]
pub struct HeaderFilter {
    name: String,
    literal: String,
    pattern: Option<Regex>,
}

impl HeaderFilter {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let literal = value.into();
        let pattern = match Regex::new(&format!("^(?:{literal})$")) {
            Ok(re) => Some(re),
            Err(_) => {
                warn!(
                    header = %name,
                    value = %literal,
                    "filter value is not a valid regular expression; matching literally"
                );
                None
            }
        };
        Self { name, literal, pattern }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the request headers satisfy this filter.
    pub fn matches(&self, headers: &HashMap<String, String>) -> bool {
        let Some(actual) = message::get_ignore_case(headers, &self.name) else {
            return false;
        };
        if actual == self.literal {
            return true;
        }
        self.pattern.as_ref().is_some_and(|re| re.is_match(actual))
    }
}

/// An active inbound consumer: a source definition bound to a receiver.
pub struct Consumer {
    pub definition: ServiceDefinition,
    /// `base_path + (service.path | "/")`; not necessarily unique — filters
    /// disambiguate consumers sharing a path.
    pub effective_path: String,
    pub reply_with_cloudevent: bool,
    filters: Vec<HeaderFilter>,
    pub receiver: Arc<dyn EventReceiver>,
}

impl Consumer {
    /// Bind a source definition to a receiver, compiling its declared
    /// filters.
    pub fn new(
        definition: ServiceDefinition,
        base_path: Option<&str>,
        receiver: Arc<dyn EventReceiver>,
    ) -> Self {
        let effective_path = effective_path(base_path, definition.path());
        let filters = definition
            .filters()
            .map(|(header, value)| HeaderFilter::new(header, value))
            .collect();
        Self {
            definition,
            effective_path,
            reply_with_cloudevent: false,
            filters,
            receiver,
        }
    }

    /// Builder helper: add a filter beyond the declared ones (used for the
    /// implicit event-type filter on event subscriptions).
    pub fn with_filter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push(HeaderFilter::new(name, value));
        self
    }

    /// Builder helper: control reply shaping.
    pub fn with_reply_with_cloudevent(mut self, reply: bool) -> Self {
        self.reply_with_cloudevent = reply;
        self
    }

    pub fn filter_count(&self) -> usize {
        self.filters.len()
    }

    /// Whether every filter matches the request headers.
    pub fn matches(&self, headers: &HashMap<String, String>) -> bool {
        self.filters.iter().all(|f| f.matches(headers))
    }
}

fn effective_path(base_path: Option<&str>, service_path: Option<&str>) -> String {
    let service_path = service_path.unwrap_or("/");
    match base_path {
        Some(base) if !base.is_empty() => format!("{base}{service_path}"),
        _ => service_path.to_string(),
    }
}
