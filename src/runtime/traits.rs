//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the dispatcher with mock implementations.

use crate::channel::InboundMessage;
use crate::db::{DbError, Session, SessionStore};
use async_trait::async_trait;
use std::sync::Arc;

/// Session persistence as seen by the dispatcher
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Open a new session window for `sender`
    async fn start_session(&self, sender: &str) -> Result<Session, DbError>;

    /// Expire the sender's active session(s)
    async fn end_session(&self, sender: &str) -> Result<(), DbError>;

    /// The sender's active session, if any
    async fn get_active_session(&self, sender: &str) -> Result<Option<Session>, DbError>;
}

/// Consumer of inbound messages, one call per message.
///
/// Implementations handle their own failures; nothing is returned.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle_message(&self, message: InboundMessage);
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: SessionRepository + ?Sized> SessionRepository for Arc<T> {
    async fn start_session(&self, sender: &str) -> Result<Session, DbError> {
        (**self).start_session(sender).await
    }

    async fn end_session(&self, sender: &str) -> Result<(), DbError> {
        (**self).end_session(sender).await
    }

    async fn get_active_session(&self, sender: &str) -> Result<Option<Session>, DbError> {
        (**self).get_active_session(sender).await
    }
}

#[async_trait]
impl<T: MessageHandler + ?Sized> MessageHandler for Arc<T> {
    async fn handle_message(&self, message: InboundMessage) {
        (**self).handle_message(message).await;
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

#[async_trait]
impl SessionRepository for SessionStore {
    async fn start_session(&self, sender: &str) -> Result<Session, DbError> {
        SessionStore::start_session(self, sender).await
    }

    async fn end_session(&self, sender: &str) -> Result<(), DbError> {
        SessionStore::end_session(self, sender).await
    }

    async fn get_active_session(&self, sender: &str) -> Result<Option<Session>, DbError> {
        SessionStore::get_active_session(self, sender).await
    }
}
