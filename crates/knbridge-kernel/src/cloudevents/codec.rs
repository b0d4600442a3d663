//! CloudEvents wire codec.
//!
//! [`decode`] turns an inbound HTTP request (headers + body) into a
//! [`BridgeMessage`], handling both binary and structured content modes.
//! [`encode`] produces the binary-mode attribute headers for an outbound
//! request or a CloudEvent-shaped reply; structured mode is never emitted.

use std::collections::HashMap;

use serde_json::Value;
use uuid::Uuid;

use super::{Attribute, CloudEventsSpec, MIME_STRUCTURED_CONTENT_MODE};
use crate::error::CloudEventError;
use crate::message::{self, BridgeMessage, CONTENT_TYPE};

/// Fallback attribute values used when a message does not carry them.
///
/// `source` is the canonical URI of the endpoint the message flows through
/// (`knative://<kind>/<name>`); `event_type` is the endpoint's declared
/// event type, if any.
#[derive(Debug, Clone, Default)]
pub struct SynthesisDefaults {
    pub source: String,
    pub event_type: Option<String>,
}

/// Whether a content type selects structured content mode.
pub fn is_structured(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(str::trim)
        .is_some_and(|essence| essence.eq_ignore_ascii_case(MIME_STRUCTURED_CONTENT_MODE))
}

/// Decode an inbound request into a message.
///
/// In binary mode every request header is copied into the message verbatim;
/// recognised CloudEvent headers are additionally stored under their
/// canonical wire name and their internal name, so downstream routing can
/// use either form.  In structured mode the JSON body supplies the
/// attributes (internal names only) and the `data` field supplies the
/// payload.
pub fn decode(
    headers: &HashMap<String, String>,
    body: Vec<u8>,
    content_type: Option<&str>,
    spec: CloudEventsSpec,
) -> Result<BridgeMessage, CloudEventError> {
    if content_type.is_some_and(is_structured) {
        decode_structured(&body, spec)
    } else {
        Ok(decode_binary(headers, body, spec))
    }
}

fn decode_binary(
    headers: &HashMap<String, String>,
    body: Vec<u8>,
    spec: CloudEventsSpec,
) -> BridgeMessage {
    let mut message = BridgeMessage::new();
    for (name, value) in headers {
        match spec.attributes().iter().find(|a| a.http.eq_ignore_ascii_case(name)) {
            Some(attr) => {
                message.set_header(attr.http, value.clone());
                message.set_header(attr.id, value.clone());
            }
            None => message.set_header(name.clone(), value.clone()),
        }
    }
    message.with_body(body)
}

fn decode_structured(body: &[u8], spec: CloudEventsSpec) -> Result<BridgeMessage, CloudEventError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| CloudEventError::Decode(e.to_string()))?;
    let Value::Object(fields) = value else {
        return Err(CloudEventError::Decode("payload is not a JSON object".to_string()));
    };

    let mut message = BridgeMessage::new();
    for attr in spec.attributes() {
        let Some(raw) = fields.get(attr.json) else { continue };
        let value = match raw {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        if attr.attribute == Attribute::DataContentType {
            message.set_header(CONTENT_TYPE, value.clone());
        }
        message.set_header(attr.id, value);
    }

    message.body = match fields.get("data") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone().into_bytes()),
        Some(other) => Some(
            serde_json::to_vec(other).map_err(|e| CloudEventError::Decode(e.to_string()))?,
        ),
    };
    Ok(message)
}

/// Produce the binary-mode CloudEvent attribute headers for a message.
///
/// For each attribute the value is resolved from the message's wire-form
/// header first, then its internal-form header, then synthesised:
/// a fresh UUID for `id`, the current time (ISO-8601 with offset) for
/// `time`, the version string for `version`, and the caller-supplied
/// defaults for `source` and `type`.  Attributes with no value anywhere
/// are omitted.
pub fn encode(
    headers: &HashMap<String, String>,
    spec: CloudEventsSpec,
    defaults: &SynthesisDefaults,
) -> Vec<(String, String)> {
    let mut wire = Vec::with_capacity(spec.attributes().len());
    for attr in spec.attributes() {
        let value = message::get_ignore_case(headers, attr.http)
            .or_else(|| headers.get(attr.id).map(String::as_str))
            .map(str::to_string)
            .or_else(|| synthesize(attr.attribute, spec, defaults));
        if let Some(value) = value {
            wire.push((attr.http.to_string(), value));
        }
    }
    wire
}

fn synthesize(
    attribute: Attribute,
    spec: CloudEventsSpec,
    defaults: &SynthesisDefaults,
) -> Option<String> {
    match attribute {
        Attribute::Version => Some(spec.version().to_string()),
        Attribute::Id => Some(Uuid::new_v4().to_string()),
        Attribute::Time => Some(chrono::Local::now().to_rfc3339()),
        Attribute::Source if !defaults.source.is_empty() => Some(defaults.source.clone()),
        Attribute::Type => defaults.event_type.clone(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloudevents::header;

    fn lower_headers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v.to_string()))
            .collect()
    }

    #[test]
    fn binary_decode_populates_both_namespaces() {
        let headers = lower_headers(&[
            ("ce-specversion", "0.3"),
            ("ce-type", "org.example.event"),
            ("ce-id", "E1"),
            ("ce-source", "/somewhere"),
            ("content-type", "text/plain"),
            ("x-extra", "kept"),
        ]);
        let msg = decode(&headers, b"test".to_vec(), Some("text/plain"), CloudEventsSpec::V03)
            .unwrap();

        assert_eq!(msg.header("ce-type"), Some("org.example.event"));
        assert_eq!(msg.header(header::TYPE), Some("org.example.event"));
        assert_eq!(msg.header(header::ID), Some("E1"));
        assert_eq!(msg.header(header::SOURCE), Some("/somewhere"));
        assert_eq!(msg.content_type(), Some("text/plain"));
        assert_eq!(msg.header(header::CONTENT_TYPE), Some("text/plain"));
        assert_eq!(msg.header("x-extra"), Some("kept"));
        assert_eq!(msg.body_text().as_deref(), Some("test"));
    }

    #[test]
    fn binary_decode_canonicalises_legacy_names() {
        let headers = lower_headers(&[
            ("ce-cloudeventsversion", "0.1"),
            ("ce-eventtype", "org.example.event"),
            ("ce-eventid", "E1"),
        ]);
        let msg = decode(&headers, Vec::new(), None, CloudEventsSpec::V01).unwrap();
        assert_eq!(msg.header("CE-CloudEventsVersion"), Some("0.1"));
        assert_eq!(msg.header(header::VERSION), Some("0.1"));
        assert_eq!(msg.header("CE-EventID"), Some("E1"));
    }

    #[test]
    fn structured_decode_v02() {
        let body = serde_json::json!({
            "specversion": "0.2",
            "type": "org.example.event",
            "id": "E2",
            "time": "2024-05-01T10:00:00+01:00",
            "source": "/s",
            "contenttype": "text/plain",
            "data": "test",
        });
        let msg = decode(
            &HashMap::new(),
            serde_json::to_vec(&body).unwrap(),
            Some(MIME_STRUCTURED_CONTENT_MODE),
            CloudEventsSpec::V02,
        )
        .unwrap();

        assert_eq!(msg.header(header::VERSION), Some("0.2"));
        assert_eq!(msg.header(header::TYPE), Some("org.example.event"));
        assert_eq!(msg.header(header::ID), Some("E2"));
        assert_eq!(msg.content_type(), Some("text/plain"));
        assert_eq!(msg.body_text().as_deref(), Some("test"));
    }

    #[test]
    fn structured_decode_matches_binary_internal_headers() {
        let binary = lower_headers(&[
            ("ce-specversion", "0.3"),
            ("ce-type", "org.example.event"),
            ("ce-id", "E3"),
            ("ce-time", "2024-05-01T10:00:00+01:00"),
            ("ce-source", "/s"),
            ("content-type", "text/plain"),
        ]);
        let from_binary =
            decode(&binary, b"test".to_vec(), Some("text/plain"), CloudEventsSpec::V03).unwrap();

        let structured = serde_json::json!({
            "specversion": "0.3",
            "type": "org.example.event",
            "id": "E3",
            "time": "2024-05-01T10:00:00+01:00",
            "source": "/s",
            "datacontenttype": "text/plain",
            "data": "test",
        });
        let from_structured = decode(
            &HashMap::new(),
            serde_json::to_vec(&structured).unwrap(),
            Some(MIME_STRUCTURED_CONTENT_MODE),
            CloudEventsSpec::V03,
        )
        .unwrap();

        for attr in CloudEventsSpec::V03.attributes() {
            assert_eq!(
                from_binary.header(attr.id),
                from_structured.header(attr.id),
                "attribute {:?}",
                attr.attribute
            );
        }
        assert_eq!(from_binary.body, from_structured.body);
    }

    #[test]
    fn structured_decode_with_content_type_parameters() {
        let body = serde_json::json!({"specversion": "0.3", "id": "E", "data": "x"});
        let msg = decode(
            &HashMap::new(),
            serde_json::to_vec(&body).unwrap(),
            Some("application/cloudevents+json; charset=utf-8"),
            CloudEventsSpec::V03,
        )
        .unwrap();
        assert_eq!(msg.header(header::ID), Some("E"));
    }

    #[test]
    fn structured_decode_rejects_malformed_json() {
        let err = decode(
            &HashMap::new(),
            b"{not json".to_vec(),
            Some(MIME_STRUCTURED_CONTENT_MODE),
            CloudEventsSpec::V03,
        )
        .unwrap_err();
        assert!(matches!(err, CloudEventError::Decode(_)));

        let err = decode(
            &HashMap::new(),
            b"[1, 2]".to_vec(),
            Some(MIME_STRUCTURED_CONTENT_MODE),
            CloudEventsSpec::V03,
        )
        .unwrap_err();
        assert!(matches!(err, CloudEventError::Decode(_)));
    }

    #[test]
    fn encode_synthesises_mandatory_attributes() {
        let defaults = SynthesisDefaults {
            source: "knative://endpoint/ep".to_string(),
            event_type: Some("org.example.event".to_string()),
        };
        let wire: HashMap<_, _> = encode(&HashMap::new(), CloudEventsSpec::V03, &defaults)
            .into_iter()
            .collect();

        assert_eq!(wire.get("ce-specversion").map(String::as_str), Some("0.3"));
        assert_eq!(wire.get("ce-type").map(String::as_str), Some("org.example.event"));
        assert_eq!(wire.get("ce-source").map(String::as_str), Some("knative://endpoint/ep"));
        assert!(!wire.get("ce-id").expect("id synthesised").is_empty());
        let time = wire.get("ce-time").expect("time synthesised");
        assert!(time.contains('T'), "not an ISO timestamp: {time}");
    }

    #[test]
    fn encode_prefers_wire_form_over_internal_form() {
        let mut headers = HashMap::new();
        headers.insert("ce-type".to_string(), "wire".to_string());
        headers.insert(header::TYPE.to_string(), "internal".to_string());
        headers.insert(header::ID.to_string(), "id-internal".to_string());

        let wire: HashMap<_, _> =
            encode(&headers, CloudEventsSpec::V03, &SynthesisDefaults::default())
                .into_iter()
                .collect();
        assert_eq!(wire.get("ce-type").map(String::as_str), Some("wire"));
        assert_eq!(wire.get("ce-id").map(String::as_str), Some("id-internal"));
    }

    #[test]
    fn encode_omits_type_without_default() {
        let wire = encode(
            &HashMap::new(),
            CloudEventsSpec::V02,
            &SynthesisDefaults { source: "knative://channel/c".to_string(), event_type: None },
        );
        assert!(wire.iter().all(|(k, _)| k != "ce-type"));
    }
}
