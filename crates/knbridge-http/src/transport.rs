//! The transport facade.
//!
//! [`KnativeTransport`] ties the pieces together for the hosting routing
//! engine: it owns the environment, the consumer registry, the inbound
//! dispatcher and the outbound producer, and resolves endpoint URIs to
//! service definitions (including the event-kind equivalences).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::Router;
use tracing::debug;

use knbridge_kernel::cloudevents::codec::SynthesisDefaults;
use knbridge_kernel::cloudevents::{Attribute, CloudEventsSpec};
use knbridge_kernel::environment::{meta, Environment, ServiceKind, ServiceRole};
use knbridge_kernel::error::EnvironmentError;
use knbridge_kernel::message::BridgeMessage;
use knbridge_kernel::receiver::EventReceiver;
use knbridge_kernel::uri::EndpointUri;
use knbridge_kernel::ServiceDefinition;

use crate::consumer::Consumer;
use crate::dispatcher::{DispatcherConfig, DispatcherServer};
use crate::error::{TransportError, TransportResult};
use crate::producer::Producer;
use crate::registry::{ConsumerHandle, ConsumerRegistry};

/// Transport-wide configuration.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Bind host for the inbound listener.
    pub host: String,
    /// Bind port for the inbound listener.
    pub port: u16,
    /// Prefix prepended to every consumer's service path.
    pub base_path: Option<String>,
    /// CloudEvents spec version spoken on the wire.
    pub cloud_events_spec: CloudEventsSpec,
    /// Whether outbound calls use `https`.
    pub use_tls: bool,
    /// Deadline for outbound calls.
    pub request_timeout: Duration,
    /// Whether to enable per-request tracing logs on the listener.
    pub enable_tracing: bool,
    /// Initial component-wide outbound overrides, keyed by wire header
    /// name.  Replaceable at runtime via
    /// [`KnativeTransport::set_ce_override`].
    pub ce_override: HashMap<String, String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            base_path: None,
            cloud_events_spec: CloudEventsSpec::default(),
            use_tls: false,
            request_timeout: Duration::from_secs(30),
            enable_tracing: true,
            ce_override: HashMap::new(),
        }
    }
}

impl TransportConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = Some(base_path.into());
        self
    }

    pub fn with_spec(mut self, spec: CloudEventsSpec) -> Self {
        self.cloud_events_spec = spec;
        self
    }

    pub fn with_tls(mut self, use_tls: bool) -> Self {
        self.use_tls = use_tls;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_tracing(mut self, enable: bool) -> Self {
        self.enable_tracing = enable;
        self
    }

    pub fn with_ce_override(mut self, overrides: HashMap<String, String>) -> Self {
        self.ce_override = overrides;
        self
    }
}

struct Inner {
    environment: Environment,
    config: TransportConfig,
    registry: Arc<ConsumerRegistry>,
    producer: Producer,
    ce_override: ArcSwap<HashMap<String, String>>,
}

/// The component object the routing engine talks to.
#[derive(Clone)]
pub struct KnativeTransport {
    inner: Arc<Inner>,
}

impl KnativeTransport {
    pub fn new(environment: Environment, config: TransportConfig) -> Self {
        let producer = Producer::new(config.request_timeout, config.use_tls);
        let ce_override = ArcSwap::from_pointee(config.ce_override.clone());
        Self {
            inner: Arc::new(Inner {
                environment,
                config,
                registry: Arc::new(ConsumerRegistry::new()),
                producer,
                ce_override,
            }),
        }
    }

    pub fn environment(&self) -> &Environment {
        &self.inner.environment
    }

    pub fn registry(&self) -> Arc<ConsumerRegistry> {
        self.inner.registry.clone()
    }

    /// Replace the component-wide override map; takes effect for
    /// subsequent sends.
    pub fn set_ce_override(&self, overrides: HashMap<String, String>) {
        self.inner.ce_override.store(Arc::new(overrides));
    }

    fn dispatcher(&self) -> DispatcherServer {
        let config = DispatcherConfig::new()
            .with_host(self.inner.config.host.clone())
            .with_port(self.inner.config.port)
            .with_tracing(self.inner.config.enable_tracing);
        DispatcherServer::new(
            config,
            self.inner.registry.clone(),
            self.inner.config.cloud_events_spec,
        )
    }

    /// Build the inbound router without binding a listener.
    pub fn build_router(&self) -> Router {
        self.dispatcher().build_router()
    }

    /// Bind the inbound listener and serve until aborted.
    pub async fn serve(&self) -> TransportResult<()> {
        self.dispatcher().start().await
    }

    /// Serve the inbound listener from a background Tokio task.
    pub fn serve_background(&self) -> tokio::task::JoinHandle<TransportResult<()>> {
        self.dispatcher().start_background()
    }

    /// Attach a receiver to the sources selected by an endpoint URI.
    ///
    /// For `endpoint` and `channel` kinds the first matching source wins.
    /// For the `event` kind every source whose declared event type equals
    /// the URI name is attached; with no typed match, a single generic
    /// source (one without a declared event type) is used with the URI
    /// name as its event type.  Event consumers always carry an implicit
    /// filter requiring the CloudEvent type header to equal the URI name.
    pub fn subscribe(
        &self,
        uri: &str,
        receiver: Arc<dyn EventReceiver>,
    ) -> Result<Vec<ConsumerHandle>, EnvironmentError> {
        let uri = EndpointUri::parse(uri)?;
        let reply_with_cloudevent = uri.reply_with_cloudevent();
        let base_path = self.inner.config.base_path.as_deref();
        let not_found = || EnvironmentError::ServiceNotFound {
            role: ServiceRole::Source,
            kind: uri.kind,
            name: uri.name.clone(),
        };

        let definitions = match uri.kind {
            ServiceKind::Endpoint | ServiceKind::Channel => {
                let definition = self
                    .inner
                    .environment
                    .find_sources_by_kind(uri.kind)
                    .find(|d| {
                        d.name == uri.name
                            && d.matches_selector(uri.selector_kind(), uri.selector_api_version())
                    })
                    .ok_or_else(not_found)?;
                vec![definition.clone()]
            }
            ServiceKind::Event => self.event_sources(&uri, not_found)?,
        };

        let mut handles = Vec::with_capacity(definitions.len());
        for definition in definitions {
            let mut consumer = Consumer::new(definition, base_path, receiver.clone())
                .with_reply_with_cloudevent(reply_with_cloudevent);
            if uri.kind == ServiceKind::Event {
                if let Some(type_header) =
                    self.inner.config.cloud_events_spec.http_name(Attribute::Type)
                {
                    consumer = consumer.with_filter(type_header, uri.name.clone());
                }
            }
            debug!(uri = %uri, path = %consumer.effective_path, "subscribing consumer");
            handles.push(self.inner.registry.attach(consumer));
        }
        Ok(handles)
    }

    fn event_sources(
        &self,
        uri: &EndpointUri,
        not_found: impl Fn() -> EnvironmentError,
    ) -> Result<Vec<ServiceDefinition>, EnvironmentError> {
        let candidates: Vec<&ServiceDefinition> = self
            .inner
            .environment
            .find_sources_by_kind(ServiceKind::Event)
            .filter(|d| d.matches_selector(uri.selector_kind(), uri.selector_api_version()))
            .collect();

        let typed: Vec<ServiceDefinition> = candidates
            .iter()
            .filter(|d| d.event_type() == Some(uri.name.as_str()))
            .map(|d| (*d).clone())
            .collect();
        if !typed.is_empty() {
            return Ok(typed);
        }

        let generic = candidates
            .into_iter()
            .find(|d| d.event_type().is_none())
            .ok_or_else(not_found)?;
        let mut generic = generic.clone();
        generic
            .metadata
            .insert(meta::EVENT_TYPE.to_string(), uri.name.clone());
        Ok(vec![generic])
    }

    /// Detach a consumer.  Deliveries already in flight complete.
    pub fn unsubscribe(&self, handle: ConsumerHandle) -> bool {
        self.inner.registry.detach(handle)
    }

    /// Deliver a message to the sink selected by an endpoint URI and
    /// return the reply.
    pub async fn send(&self, uri: &str, message: &BridgeMessage) -> TransportResult<BridgeMessage> {
        let uri = EndpointUri::parse(uri).map_err(TransportError::from)?;
        let definition = self.resolve_sink(&uri)?;

        // Merge the override layers, lowest priority first.
        let mut overrides: HashMap<String, String> = HashMap::new();
        for (name, value) in definition.ce_overrides() {
            overrides.insert(name.to_string(), value.to_string());
        }
        for (name, value) in self.inner.ce_override.load().iter() {
            overrides.insert(name.clone(), value.clone());
        }
        for (name, value) in uri.ce_overrides() {
            overrides.insert(name.to_string(), value.to_string());
        }

        let event_type = match uri.kind {
            // The URI name doubles as the event type for event sinks.
            ServiceKind::Event => Some(uri.name.clone()),
            _ => definition.event_type().map(str::to_string),
        };
        let defaults = SynthesisDefaults {
            source: format!("knative://{}/{}", uri.kind, uri.name),
            event_type,
        };

        self.inner
            .producer
            .send(
                &definition,
                &overrides,
                &defaults,
                self.inner.config.cloud_events_spec,
                message,
            )
            .await
    }

    fn resolve_sink(&self, uri: &EndpointUri) -> TransportResult<ServiceDefinition> {
        let not_found = || {
            TransportError::from(EnvironmentError::ServiceNotFound {
                role: ServiceRole::Sink,
                kind: uri.kind,
                name: uri.name.clone(),
            })
        };
        let matches = |d: &&ServiceDefinition| {
            d.kind == uri.kind
                && d.role == ServiceRole::Sink
                && d.matches_selector(uri.selector_kind(), uri.selector_api_version())
        };

        let named = self
            .inner
            .environment
            .services
            .iter()
            .filter(matches)
            .find(|d| d.name == uri.name);
        match named {
            Some(d) => Ok(d.clone()),
            // Event sinks fall back to a generic definition; the URI name
            // only selects the event type.
            None if uri.kind == ServiceKind::Event => self
                .inner
                .environment
                .services
                .iter()
                .find(|d| matches(d))
                .cloned()
                .ok_or_else(not_found),
            None => Err(not_found()),
        }
    }
}
