//! CloudEvents specification versions and their attribute mappings.
//!
//! Three spec versions are supported: 0.1, 0.2 and 0.3.  They differ in the
//! HTTP header names used in binary content mode and in the JSON keys used
//! in structured content mode; the internal header namespace consumed by
//! the routing engine is version independent.  Version branching is table
//! driven: each version resolves to a static record of attribute entries
//! rather than to a trait object per version.

pub mod codec;

use crate::error::CloudEventError;

/// MIME type selecting structured content mode on the wire.
pub const MIME_STRUCTURED_CONTENT_MODE: &str = "application/cloudevents+json";

/// Version-independent internal header names.
///
/// These are the keys the routing engine reads and writes; the transport
/// translates between them and the version-specific wire headers.
pub mod header {
    pub const VERSION: &str = "CamelCloudEventVersion";
    pub const TYPE: &str = "CamelCloudEventType";
    pub const ID: &str = "CamelCloudEventID";
    pub const SOURCE: &str = "CamelCloudEventSource";
    pub const TIME: &str = "CamelCloudEventTime";
    pub const CONTENT_TYPE: &str = "CamelCloudEventContentType";
    pub const SUBJECT: &str = "CamelCloudEventSubject";
}

// ─────────────────────────────────────────────────────────────────────────────
// Attributes
// ─────────────────────────────────────────────────────────────────────────────

/// Abstract CloudEvent attribute, independent of spec version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Attribute {
    Version,
    Type,
    Id,
    Source,
    Time,
    DataContentType,
    Subject,
}

/// Per-version mapping for a single attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeSpec {
    pub attribute: Attribute,
    /// Canonical HTTP header carrying the attribute in binary mode.
    pub http: &'static str,
    /// Internal header name used by the routing engine (version independent).
    pub id: &'static str,
    /// JSON key carrying the attribute in structured mode.
    pub json: &'static str,
}

static V01_ATTRIBUTES: &[AttributeSpec] = &[
    AttributeSpec { attribute: Attribute::Version, http: "CE-CloudEventsVersion", id: header::VERSION, json: "cloudEventsVersion" },
    AttributeSpec { attribute: Attribute::Type, http: "CE-EventType", id: header::TYPE, json: "eventType" },
    AttributeSpec { attribute: Attribute::Id, http: "CE-EventID", id: header::ID, json: "eventID" },
    AttributeSpec { attribute: Attribute::Source, http: "CE-Source", id: header::SOURCE, json: "source" },
    AttributeSpec { attribute: Attribute::Time, http: "CE-EventTime", id: header::TIME, json: "eventTime" },
    AttributeSpec { attribute: Attribute::DataContentType, http: "Content-Type", id: header::CONTENT_TYPE, json: "contentType" },
];

static V02_ATTRIBUTES: &[AttributeSpec] = &[
    AttributeSpec { attribute: Attribute::Version, http: "ce-specversion", id: header::VERSION, json: "specversion" },
    AttributeSpec { attribute: Attribute::Type, http: "ce-type", id: header::TYPE, json: "type" },
    AttributeSpec { attribute: Attribute::Id, http: "ce-id", id: header::ID, json: "id" },
    AttributeSpec { attribute: Attribute::Source, http: "ce-source", id: header::SOURCE, json: "source" },
    AttributeSpec { attribute: Attribute::Time, http: "ce-time", id: header::TIME, json: "time" },
    AttributeSpec { attribute: Attribute::DataContentType, http: "Content-Type", id: header::CONTENT_TYPE, json: "contenttype" },
];

static V03_ATTRIBUTES: &[AttributeSpec] = &[
    AttributeSpec { attribute: Attribute::Version, http: "ce-specversion", id: header::VERSION, json: "specversion" },
    AttributeSpec { attribute: Attribute::Type, http: "ce-type", id: header::TYPE, json: "type" },
    AttributeSpec { attribute: Attribute::Id, http: "ce-id", id: header::ID, json: "id" },
    AttributeSpec { attribute: Attribute::Source, http: "ce-source", id: header::SOURCE, json: "source" },
    AttributeSpec { attribute: Attribute::Time, http: "ce-time", id: header::TIME, json: "time" },
    AttributeSpec { attribute: Attribute::DataContentType, http: "Content-Type", id: header::CONTENT_TYPE, json: "datacontenttype" },
    AttributeSpec { attribute: Attribute::Subject, http: "ce-subject", id: header::SUBJECT, json: "subject" },
];

// ─────────────────────────────────────────────────────────────────────────────
// Spec versions
// ─────────────────────────────────────────────────────────────────────────────

/// A supported CloudEvents specification version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CloudEventsSpec {
    V01,
    V02,
    #[default]
    V03,
}

impl CloudEventsSpec {
    /// All supported versions, oldest first.
    pub const ALL: [CloudEventsSpec; 3] =
        [CloudEventsSpec::V01, CloudEventsSpec::V02, CloudEventsSpec::V03];

    /// Parse a version string such as `"0.3"`.
    pub fn from_version(version: &str) -> Result<Self, CloudEventError> {
        match version {
            "0.1" => Ok(CloudEventsSpec::V01),
            "0.2" => Ok(CloudEventsSpec::V02),
            "0.3" => Ok(CloudEventsSpec::V03),
            other => Err(CloudEventError::UnknownSpecVersion(other.to_string())),
        }
    }

    /// The version string carried by the `version` attribute.
    pub fn version(self) -> &'static str {
        match self {
            CloudEventsSpec::V01 => "0.1",
            CloudEventsSpec::V02 => "0.2",
            CloudEventsSpec::V03 => "0.3",
        }
    }

    /// The attribute table for this version.
    pub fn attributes(self) -> &'static [AttributeSpec] {
        match self {
            CloudEventsSpec::V01 => V01_ATTRIBUTES,
            CloudEventsSpec::V02 => V02_ATTRIBUTES,
            CloudEventsSpec::V03 => V03_ATTRIBUTES,
        }
    }

    /// Look up one attribute; `None` if the version does not define it
    /// (e.g. `subject` before 0.3).
    pub fn attribute(self, attribute: Attribute) -> Option<&'static AttributeSpec> {
        self.attributes().iter().find(|a| a.attribute == attribute)
    }

    /// Wire header name for an attribute under this version.
    pub fn http_name(self, attribute: Attribute) -> Option<&'static str> {
        self.attribute(attribute).map(|a| a.http)
    }
}

impl std::fmt::Display for CloudEventsSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.version())
    }
}

/// Internal header name for an attribute (the same across all versions).
pub fn id_name(attribute: Attribute) -> &'static str {
    match attribute {
        Attribute::Version => header::VERSION,
        Attribute::Type => header::TYPE,
        Attribute::Id => header::ID,
        Attribute::Source => header::SOURCE,
        Attribute::Time => header::TIME,
        Attribute::DataContentType => header::CONTENT_TYPE,
        Attribute::Subject => header::SUBJECT,
    }
}

/// Whether `name` is a CloudEvent attribute header in any supported
/// version's wire form.  `Content-Type` is a plain transport header and is
/// deliberately excluded.
pub fn is_cloud_event_http_header(name: &str) -> bool {
    name.len() >= 3 && name[..3].eq_ignore_ascii_case("ce-")
}
