//! Outbound CloudEvents producer.
//!
//! For a resolved sink definition the producer builds the target URL,
//! synthesises binary-mode CloudEvent headers with the layered override
//! precedence, performs the POST and maps the response (or failure) back
//! into a reply message.  The producer never retries; upstream policy
//! decides what to do with a failed exchange.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::{redirect, Client};
use tracing::{debug, instrument};

use knbridge_kernel::cloudevents::codec::{self, SynthesisDefaults};
use knbridge_kernel::cloudevents::CloudEventsSpec;
use knbridge_kernel::message::{self, BridgeMessage, CONTENT_TYPE, HTTP_RESPONSE_CODE};
use knbridge_kernel::ServiceDefinition;

use crate::error::{TransportError, TransportResult};

/// Hop-by-hop headers that must not leak from a previous exchange onto the
/// next request.
const SKIPPED_HEADERS: &[&str] = &["host", "content-length", "transfer-encoding", "connection"];

/// HTTP client invoking sink definitions.
pub struct Producer {
    client: Client,
    use_tls: bool,
}

impl Producer {
    /// Redirects are not followed: a 3xx answer surfaces as a failed
    /// operation.
    pub fn new(request_timeout: Duration, use_tls: bool) -> Self {
        let client = Client::builder()
            .timeout(request_timeout)
            .redirect(redirect::Policy::none())
            .build()
            .expect("failed to build HTTP client");
        Self { client, use_tls }
    }

    /// Deliver `message` to `definition` as a binary-mode CloudEvent.
    ///
    /// `overrides` is the pre-merged override map (environment, component
    /// and URI layers, lowest first); `defaults` supplies the synthesised
    /// `source` and `type` attributes.
    #[instrument(skip_all, fields(service = %definition.name))]
    pub async fn send(
        &self,
        definition: &ServiceDefinition,
        overrides: &HashMap<String, String>,
        defaults: &SynthesisDefaults,
        spec: CloudEventsSpec,
        message: &BridgeMessage,
    ) -> TransportResult<BridgeMessage> {
        let body = message.body.clone().ok_or(TransportError::BodyRequired)?;
        let url = self.target_url(definition)?;
        let headers = build_wire_headers(definition, overrides, message, spec, defaults);

        debug!(url = %url, "invoking sink");
        let mut request = self.client.post(&url).body(body);
        for (name, value) in &headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify_send_error(url.clone(), e))?;
        let status = response.status();

        if !status.is_success() {
            return Err(TransportError::OperationFailed {
                url,
                status: status.as_u16(),
                status_message: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        let mut reply = BridgeMessage::new();
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                reply.set_header(name.as_str(), value);
            }
        }
        reply.set_header(HTTP_RESPONSE_CODE, status.as_u16().to_string());
        reply.body = if status == reqwest::StatusCode::NO_CONTENT {
            None
        } else {
            let bytes = response
                .bytes()
                .await
                .map_err(|e| classify_send_error(url, e))?;
            Some(bytes.to_vec())
        };
        Ok(reply)
    }

    /// `scheme://host[:port]<service.path | "/">`; fails when the sink has
    /// no host.
    pub(crate) fn target_url(&self, definition: &ServiceDefinition) -> TransportResult<String> {
        let host = definition.host.as_deref().unwrap_or("");
        if host.is_empty() {
            return Err(TransportError::HostNotDefined);
        }
        let scheme = if self.use_tls { "https" } else { "http" };
        let path = definition.path().unwrap_or("/");
        Ok(if definition.port >= 0 {
            format!("{scheme}://{host}:{}{path}", definition.port)
        } else {
            format!("{scheme}://{host}{path}")
        })
    }
}

fn classify_send_error(url: String, error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Cancelled { url }
    } else {
        TransportError::Network { url, source: error }
    }
}

/// Build the outbound wire headers for a message.
///
/// Layers, lowest priority first; each layer overwrites the previous one
/// for the headers it defines:
/// 1. synthesised CloudEvent attribute defaults;
/// 2. the pre-merged override map (environment metadata, then the
///    component-wide map, then URI query parameters);
/// 3. internal-form CloudEvent headers carried by the message;
/// 4. wire-form headers carried by the message (which also pass plain,
///    non-CloudEvent headers through);
/// 5. the content type: the message's own, else the service default.
pub(crate) fn build_wire_headers(
    definition: &ServiceDefinition,
    overrides: &HashMap<String, String>,
    message: &BridgeMessage,
    spec: CloudEventsSpec,
    defaults: &SynthesisDefaults,
) -> Vec<(String, String)> {
    let mut wire = codec::encode(&HashMap::new(), spec, defaults);

    for (name, value) in overrides {
        set_header(&mut wire, name, value.clone());
    }

    for attr in spec.attributes() {
        if let Some(value) = message.header(attr.id) {
            set_header(&mut wire, attr.http, value.to_string());
        }
    }

    for (name, value) in &message.headers {
        if message::is_internal(name)
            || name.eq_ignore_ascii_case(CONTENT_TYPE)
            || SKIPPED_HEADERS.iter().any(|h| name.eq_ignore_ascii_case(h))
        {
            continue;
        }
        set_header(&mut wire, name, value.clone());
    }

    if let Some(content_type) = message.content_type().or_else(|| definition.content_type()) {
        set_header(&mut wire, CONTENT_TYPE, content_type.to_string());
    }

    wire
}

fn set_header(headers: &mut Vec<(String, String)>, name: &str, value: String) {
    match headers.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
        Some(slot) => slot.1 = value,
        None => headers.push((name.to_string(), value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use knbridge_kernel::cloudevents::header;
    use knbridge_kernel::environment::{meta, ServiceRole};

    fn producer() -> Producer {
        Producer::new(Duration::from_secs(5), false)
    }

    fn sink() -> ServiceDefinition {
        ServiceDefinition::endpoint(ServiceRole::Sink, "ep", "localhost", 8080)
    }

    fn wire_value<'a>(wire: &'a [(String, String)], name: &str) -> Option<&'a str> {
        wire.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn url_includes_port_and_path() {
        let mut def = sink().with_meta(meta::SERVICE_PATH, "/a/path");
        assert_eq!(producer().target_url(&def).unwrap(), "http://localhost:8080/a/path");

        def.port = -1;
        assert_eq!(producer().target_url(&def).unwrap(), "http://localhost/a/path");
    }

    #[test]
    fn url_requires_a_host() {
        let mut def = sink();
        def.host = Some(String::new());
        assert!(matches!(producer().target_url(&def), Err(TransportError::HostNotDefined)));
        def.host = None;
        assert!(matches!(producer().target_url(&def), Err(TransportError::HostNotDefined)));
    }

    #[test]
    fn tls_switches_the_scheme() {
        let with_tls = Producer::new(Duration::from_secs(5), true);
        assert_eq!(with_tls.target_url(&sink()).unwrap(), "https://localhost:8080/");
    }

    #[test]
    fn overrides_beat_synthesised_defaults() {
        let def = sink().with_meta(meta::EVENT_TYPE, "org.example.event");
        let overrides: HashMap<String, String> =
            [("ce-type".to_string(), "forced".to_string())].into();
        let defaults = SynthesisDefaults {
            source: "knative://endpoint/ep".to_string(),
            event_type: def.event_type().map(str::to_string),
        };
        let wire = build_wire_headers(
            &def,
            &overrides,
            &BridgeMessage::text("x"),
            CloudEventsSpec::V03,
            &defaults,
        );
        assert_eq!(wire_value(&wire, "ce-type"), Some("forced"));
        assert_eq!(wire_value(&wire, "ce-source"), Some("knative://endpoint/ep"));
    }

    #[test]
    fn internal_headers_beat_overrides() {
        let overrides: HashMap<String, String> =
            [("ce-type".to_string(), "forced".to_string())].into();
        let message = BridgeMessage::text("x").with_header(header::TYPE, "from-route");
        let wire = build_wire_headers(
            &sink(),
            &overrides,
            &message,
            CloudEventsSpec::V03,
            &SynthesisDefaults::default(),
        );
        assert_eq!(wire_value(&wire, "ce-type"), Some("from-route"));
    }

    #[test]
    fn wire_headers_beat_internal_headers() {
        let message = BridgeMessage::text("x")
            .with_header(header::TYPE, "from-internal")
            .with_header("ce-type", "from-wire");
        let wire = build_wire_headers(
            &sink(),
            &HashMap::new(),
            &message,
            CloudEventsSpec::V03,
            &SynthesisDefaults::default(),
        );
        assert_eq!(wire_value(&wire, "ce-type"), Some("from-wire"));
    }

    #[test]
    fn plain_headers_pass_through_but_internal_ones_do_not() {
        let message = BridgeMessage::text("x")
            .with_header("MyHeader", "hop-1")
            .with_header("Content-Length", "99")
            .with_header(HTTP_RESPONSE_CODE, "200");
        let wire = build_wire_headers(
            &sink(),
            &HashMap::new(),
            &message,
            CloudEventsSpec::V03,
            &SynthesisDefaults::default(),
        );
        assert_eq!(wire_value(&wire, "MyHeader"), Some("hop-1"));
        assert_eq!(wire_value(&wire, "Content-Length"), None);
        assert!(wire.iter().all(|(k, _)| !k.starts_with("Camel")));
    }

    #[test]
    fn content_type_falls_back_to_the_service_default() {
        let def = sink().with_meta(meta::CONTENT_TYPE, "text/plain");
        let wire = build_wire_headers(
            &def,
            &HashMap::new(),
            &BridgeMessage::text("x"),
            CloudEventsSpec::V03,
            &SynthesisDefaults::default(),
        );
        assert_eq!(wire_value(&wire, "Content-Type"), Some("text/plain"));

        let message = BridgeMessage::text("x").with_header("Content-Type", "application/json");
        let wire = build_wire_headers(
            &def,
            &HashMap::new(),
            &message,
            CloudEventsSpec::V03,
            &SynthesisDefaults::default(),
        );
        assert_eq!(wire_value(&wire, "Content-Type"), Some("application/json"));
    }
}
