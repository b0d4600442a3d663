//! knbridge-kernel - Contract layer for the knbridge Knative HTTP transport
//!
//! This crate defines the *data model and trait interfaces* shared between
//! the routing engine hosting the transport and the HTTP runtime.  No
//! network code lives here — that belongs in `knbridge-http`.
//!
//! # Architecture mapping
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              knbridge-kernel  (this crate)                  │
//! │  CloudEventsSpec + attribute tables    Environment          │
//! │  CloudEvents codec (decode/encode)     EndpointUri          │
//! │  BridgeMessage    EventReceiver trait  error types          │
//! └──────────────────────────┬──────────────────────────────────┘
//!                            │  depends on
//! ┌──────────────────────────▼──────────────────────────────────┐
//! │              knbridge-http  (runtime crate)                 │
//! │  ConsumerRegistry  (copy-on-write snapshots)                │
//! │  DispatcherServer  (axum HTTP listener)                     │
//! │  Producer          (reqwest client)                         │
//! │  KnativeTransport  (facade)                                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod cloudevents;
pub mod environment;
pub mod error;
pub mod message;
pub mod receiver;
pub mod uri;

// ── Flat re-exports ────────────────────────────────────────────────────────

pub use cloudevents::{Attribute, AttributeSpec, CloudEventsSpec};
pub use environment::{Environment, ServiceDefinition, ServiceKind, ServiceRole};
pub use error::{CloudEventError, EnvironmentError};
pub use message::BridgeMessage;
pub use receiver::{EventReceiver, FnReceiver, ReceiverError, ReceiverResult};
pub use uri::EndpointUri;
