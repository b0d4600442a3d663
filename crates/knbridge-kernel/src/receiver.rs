//! The contract between the transport and the hosting routing engine.
//!
//! The transport only requires one thing from the engine: a receiver that
//! accepts a decoded inbound event and optionally produces a reply.  The
//! dispatcher awaits the receiver, so from the transport's perspective the
//! routing pipeline runs synchronously per request.

use async_trait::async_trait;
use std::future::Future;
use thiserror::Error;

use crate::message::BridgeMessage;

/// Failure raised by a receiver while running the routing pipeline.
///
/// The message text is what the dispatcher surfaces to the HTTP client on a
/// 500 response; no backtrace ever crosses the wire.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ReceiverError(String);

impl ReceiverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

pub type ReceiverResult = Result<Option<BridgeMessage>, ReceiverError>;

/// In-process consumer side of the routing engine.
///
/// Implementations must be `Send + Sync`; a single receiver may serve
/// concurrent requests.
#[async_trait]
pub trait EventReceiver: Send + Sync {
    /// Handle one decoded event.  `Ok(Some(reply))` produces an HTTP reply
    /// body, `Ok(None)` a 204, `Err` a 500 carrying the error message.
    async fn on_event(&self, event: BridgeMessage) -> ReceiverResult;
}

/// [`EventReceiver`] adapter for plain async closures.
pub struct FnReceiver<F>(F);

impl<F> FnReceiver<F> {
    pub fn new<Fut>(f: F) -> Self
    where
        F: Fn(BridgeMessage) -> Fut + Send + Sync,
        Fut: Future<Output = ReceiverResult> + Send,
    {
        Self(f)
    }
}

#[async_trait]
impl<F, Fut> EventReceiver for FnReceiver<F>
where
    F: Fn(BridgeMessage) -> Fut + Send + Sync,
    Fut: Future<Output = ReceiverResult> + Send,
{
    async fn on_event(&self, event: BridgeMessage) -> ReceiverResult {
        (self.0)(event).await
    }
}
