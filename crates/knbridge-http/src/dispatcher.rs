//! Inbound HTTP dispatcher.
//!
//! One dispatcher owns one HTTP listener.  Because consumers come and go at
//! runtime, routing is not baked into the axum router: a single fallback
//! handler receives every request and resolves the consumer through the
//! registry snapshot.
//!
//! Per-request flow: `Received → Matched → Decoded → Delivered → Responded`,
//! with 404 for non-POST methods and unmatched requests, 400 for decode
//! failures, 200/204 for replies with/without a body and 500 for receiver
//! failures (the error message is the response body; no backtrace crosses
//! the wire).

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::to_bytes;
use axum::extract::{Request, State};
use axum::http::header::{HeaderName, HeaderValue};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use knbridge_kernel::cloudevents::codec::{self, SynthesisDefaults};
use knbridge_kernel::cloudevents::{is_cloud_event_http_header, CloudEventsSpec};
use knbridge_kernel::message::{self, BridgeMessage, CONTENT_TYPE};
use knbridge_kernel::ServiceDefinition;

use crate::consumer::Consumer;
use crate::error::{TransportError, TransportResult};
use crate::registry::ConsumerRegistry;

/// Configuration for one inbound listener.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Whether to enable per-request tracing logs.
    pub enable_tracing: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            enable_tracing: true,
        }
    }
}

impl DispatcherConfig {
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

    pub fn with_tracing(mut self, enable: bool) -> Self {
        self.enable_tracing = enable;
        self
    }

    pub fn socket_addr(&self) -> SocketAddr {
        format!("{}:{}", self.host, self.port)
            .parse()
            .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], self.port)))
    }
}

struct DispatcherState {
    registry: Arc<ConsumerRegistry>,
    spec: CloudEventsSpec,
}

/// The HTTP server dispatching inbound requests to registered consumers.
pub struct DispatcherServer {
    config: DispatcherConfig,
    registry: Arc<ConsumerRegistry>,
    spec: CloudEventsSpec,
}

impl DispatcherServer {
    pub fn new(
        config: DispatcherConfig,
        registry: Arc<ConsumerRegistry>,
        spec: CloudEventsSpec,
    ) -> Self {
        Self { config, registry, spec }
    }

    /// Build the axum `Router` without starting the server.
    ///
    /// Useful for integration tests that want to drive the dispatcher via
    /// `tower::ServiceExt` without binding a port.
    pub fn build_router(&self) -> Router {
        let state = Arc::new(DispatcherState {
            registry: self.registry.clone(),
            spec: self.spec,
        });
        let router = Router::new().fallback(dispatch).with_state(state);
        if self.config.enable_tracing {
            router.layer(TraceLayer::new_for_http())
        } else {
            router
        }
    }

    /// Bind the listener and serve until the task is aborted.
    pub async fn start(self) -> TransportResult<()> {
        let addr = self.config.socket_addr();
        let router = self.build_router();
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|source| TransportError::Bind { addr, source })?;
        info!("knative transport listening on http://{addr}");
        axum::serve(listener, router)
            .await
            .map_err(|e| TransportError::Internal(e.to_string()))
    }

    /// Start the server in a background Tokio task.
    pub fn start_background(self) -> tokio::task::JoinHandle<TransportResult<()>> {
        tokio::spawn(async move { self.start().await })
    }
}

/// Synthesis defaults derived from the service a message flows through.
pub(crate) fn synthesis_defaults(definition: &ServiceDefinition) -> SynthesisDefaults {
    SynthesisDefaults {
        source: format!("knative://{}/{}", definition.kind, definition.name),
        event_type: definition.event_type().map(str::to_string),
    }
}

async fn dispatch(State(state): State<Arc<DispatcherState>>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let path = parts.uri.path().to_string();

    // Only POST is part of the contract.
    if parts.method != Method::POST {
        debug!(method = %parts.method, %path, "rejecting non-POST request");
        return StatusCode::NOT_FOUND.into_response();
    }

    let headers = flatten_headers(&parts.headers);
    let Some(consumer) = state.registry.lookup(&path, &headers) else {
        debug!(%path, "no consumer matches request");
        return StatusCode::NOT_FOUND.into_response();
    };

    let body = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes.to_vec(),
        Err(e) => {
            warn!(%path, error = %e, "failed to read request body");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let content_type = headers.get("content-type").map(String::as_str);
    let event = match codec::decode(&headers, body, content_type, state.spec) {
        Ok(event) => event,
        Err(e) => {
            warn!(%path, error = %e, "failed to decode event");
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    debug!(%path, service = %consumer.definition.name, "delivering event");
    match consumer.receiver.on_event(event).await {
        Ok(Some(reply)) if reply.body.is_some() => reply_response(&consumer, reply, state.spec),
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            error!(%path, service = %consumer.definition.name, error = %e, "receiver failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.message().to_string()).into_response()
        }
    }
}

/// Shape the 200 response for a reply message.
///
/// Plain reply headers pass through.  CloudEvent headers appear only when
/// the consumer asked for them, in which case the full attribute set is
/// emitted; internal-namespace headers never appear on the wire either way.
fn reply_response(consumer: &Consumer, reply: BridgeMessage, spec: CloudEventsSpec) -> Response {
    let mut wire: Vec<(String, String)> = Vec::new();
    for (name, value) in &reply.headers {
        if message::is_internal(name)
            || is_cloud_event_http_header(name)
            || name.eq_ignore_ascii_case(CONTENT_TYPE)
        {
            continue;
        }
        wire.push((name.clone(), value.clone()));
    }

    if consumer.reply_with_cloudevent {
        let defaults = synthesis_defaults(&consumer.definition);
        wire.extend(codec::encode(&reply.headers, spec, &defaults));
    }

    if let Some(content_type) = reply.content_type().or_else(|| consumer.definition.content_type())
    {
        wire.push((CONTENT_TYPE.to_string(), content_type.to_string()));
    }

    let mut headers = HeaderMap::new();
    for (name, value) in wire {
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(&value)) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => warn!(header = %name, "skipping reply header with invalid name or value"),
        }
    }

    (StatusCode::OK, headers, reply.body.unwrap_or_default()).into_response()
}

fn flatten_headers(headers: &HeaderMap) -> HashMap<String, String> {
    let mut map = HashMap::with_capacity(headers.len());
    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            map.insert(name.as_str().to_string(), value.to_string());
        }
    }
    map
}
