//! Chat transport abstraction
//!
//! Delivers inbound text messages and carries the gateway's outbound
//! replies and typing indicators.

mod whatsapp;

pub use whatsapp::{parse_webhook, verify_signature, WhatsAppCloudTransport, SIGNATURE_HEADER};

use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// A text message received from a sender
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Transport message id
    pub id: String,
    /// Sender id; replies go back here
    pub from: String,
    pub body: String,
    /// Unix seconds as reported by the transport
    pub timestamp: u64,
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Transport request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Transport rejected request with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Outbound side of a chat platform
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Human-readable transport name
    fn name(&self) -> &str;

    /// Show the composing indicator in the chat `message` arrived on
    async fn show_typing(&self, message: &InboundMessage) -> Result<(), TransportError>;

    /// Clear the composing indicator
    async fn clear_typing(&self, message: &InboundMessage) -> Result<(), TransportError>;

    /// Send a text message to a sender id
    async fn send_text(&self, to: &str, text: &str) -> Result<(), TransportError>;
}

#[async_trait]
impl<T: ChatTransport + ?Sized> ChatTransport for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn show_typing(&self, message: &InboundMessage) -> Result<(), TransportError> {
        (**self).show_typing(message).await
    }

    async fn clear_typing(&self, message: &InboundMessage) -> Result<(), TransportError> {
        (**self).clear_typing(message).await
    }

    async fn send_text(&self, to: &str, text: &str) -> Result<(), TransportError> {
        (**self).send_text(to, text).await
    }
}

/// Bounded memory of recently seen message ids.
///
/// Webhook platforms redeliver on slow acknowledgements; a redelivered id
/// must not start a second session or ask the same question twice.
pub struct RecentMessageIds {
    capacity: usize,
    inner: Mutex<RecentInner>,
}

#[derive(Default)]
struct RecentInner {
    order: VecDeque<String>,
    seen: HashSet<String>,
}

impl RecentMessageIds {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(RecentInner::default()),
        }
    }

    /// Record `id`; returns false when it was already seen
    pub fn insert(&self, id: &str) -> bool {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if inner.seen.contains(id) {
            return false;
        }
        if inner.order.len() == self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.seen.remove(&oldest);
            }
        }
        inner.order.push_back(id.to_string());
        inner.seen.insert(id.to_string());
        true
    }

    /// Drop `id` so a later redelivery is accepted
    pub fn forget(&self, id: &str) {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if inner.seen.remove(id) {
            inner.order.retain(|seen| seen != id);
        }
    }
}
