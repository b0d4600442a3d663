//! Shared helpers for the transport integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use tower::ServiceExt;

use knbridge_http::{KnativeTransport, TransportConfig};
use knbridge_kernel::receiver::{EventReceiver, ReceiverResult};
use knbridge_kernel::{BridgeMessage, Environment, ServiceDefinition};

pub fn transport(services: Vec<ServiceDefinition>) -> KnativeTransport {
    transport_with(services, TransportConfig::new())
}

pub fn transport_with(services: Vec<ServiceDefinition>, config: TransportConfig) -> KnativeTransport {
    KnativeTransport::new(Environment::new(services), config.with_tracing(false))
}

/// Drive one POST through the router and collapse the response.
pub async fn post(
    router: &axum::Router,
    path: &str,
    headers: &[(&str, &str)],
    body: &str,
) -> (StatusCode, HeaderMap, String) {
    let mut builder = Request::builder().method("POST").uri(path);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let request = builder.body(Body::from(body.to_string())).unwrap();
    let response = router.clone().oneshot(request).await.unwrap();

    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, headers, String::from_utf8_lossy(&bytes).into_owned())
}

type ReplyFn = Box<dyn Fn(&BridgeMessage) -> Option<BridgeMessage> + Send + Sync>;

/// Receiver that records every delivered event and optionally replies.
pub struct Recorder {
    events: Mutex<Vec<BridgeMessage>>,
    reply: Option<ReplyFn>,
}

impl Recorder {
    /// Records events and produces no reply (yields 204s).
    pub fn new() -> Arc<Self> {
        Arc::new(Self { events: Mutex::new(Vec::new()), reply: None })
    }

    /// Records events and replies with whatever `reply` returns.
    pub fn replying(
        reply: impl Fn(&BridgeMessage) -> Option<BridgeMessage> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
            reply: Some(Box::new(reply)),
        })
    }

    /// Records events and echoes them back unchanged.
    pub fn echoing() -> Arc<Self> {
        Self::replying(|event| Some(event.clone()))
    }

    pub fn events(&self) -> Vec<BridgeMessage> {
        self.events.lock().unwrap().clone()
    }

    pub fn last(&self) -> BridgeMessage {
        self.events().last().cloned().expect("no event recorded")
    }
}

#[async_trait::async_trait]
impl EventReceiver for Recorder {
    async fn on_event(&self, event: BridgeMessage) -> ReceiverResult {
        let reply = self.reply.as_ref().and_then(|f| f(&event));
        self.events.lock().unwrap().push(event);
        Ok(reply)
    }
}
