//! knbridge-http - HTTP runtime for the knbridge Knative transport
//!
//! This crate bridges an in-process routing engine to the Knative eventing
//! wire protocol, transporting payloads as CloudEvents over HTTP.  It
//! implements the contracts defined in `knbridge-kernel`.
//!
//! # Behaviour summary
//!
//! | Direction | Component          | Behaviour                                   |
//! |-----------|--------------------|---------------------------------------------|
//! | inbound   | `DispatcherServer` | POST only; route by path + header filters   |
//! | inbound   | `ConsumerRegistry` | lock-free lookups, atomic attach/detach     |
//! | outbound  | `Producer`         | binary-mode CloudEvents POST with overrides |
//! | both      | `KnativeTransport` | facade: subscribe / unsubscribe / send      |
//!
//! # Example
//!
//! ```rust,no_run
//! use knbridge_http::{KnativeTransport, TransportConfig};
//! use knbridge_kernel::{Environment, FnReceiver, ServiceDefinition};
//! use knbridge_kernel::environment::meta;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let env = Environment::new(vec![
//!         ServiceDefinition::source_endpoint("orders")
//!             .with_meta(meta::SERVICE_PATH, "/orders"),
//!     ]);
//!
//!     let transport = KnativeTransport::new(env, TransportConfig::new().with_port(8080));
//!     transport
//!         .subscribe(
//!             "knative:endpoint/orders",
//!             Arc::new(FnReceiver::new(|event| async move {
//!                 println!("got {:?}", event.body_text());
//!                 Ok(None)
//!             })),
//!         )
//!         .unwrap();
//!
//!     transport.serve().await.unwrap();
//! }
//! ```

pub mod consumer;
pub mod dispatcher;
pub mod error;
pub mod producer;
pub mod registry;
pub mod transport;

pub use consumer::{Consumer, HeaderFilter};
pub use dispatcher::{DispatcherConfig, DispatcherServer};
pub use error::{TransportError, TransportResult};
pub use producer::Producer;
pub use registry::{ConsumerHandle, ConsumerRegistry};
pub use transport::{KnativeTransport, TransportConfig};
