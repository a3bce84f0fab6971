//! Mock implementations for testing
//!
//! These mocks enable dispatcher and queue tests without real I/O.

use super::traits::*;
use crate::answer::{AnswerError, AnswerService};
use crate::channel::{ChatTransport, InboundMessage, TransportError};
use crate::db::{DbError, Session};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

// ============================================================================
// Mock Answer Service
// ============================================================================

/// Answer service that returns queued replies
pub struct MockAnswerService {
    replies: Mutex<VecDeque<Result<String, AnswerError>>>,
    /// Record of all questions asked
    questions: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl MockAnswerService {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            questions: Mutex::new(Vec::new()),
        }
    }

    pub fn queue_answer(&self, answer: impl Into<String>) {
        self.replies.lock().unwrap().push_back(Ok(answer.into()));
    }

    pub fn queue_error(&self, error: AnswerError) {
        self.replies.lock().unwrap().push_back(Err(error));
    }

    pub fn recorded_questions(&self) -> Vec<String> {
        self.questions.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnswerService for MockAnswerService {
    async fn answer(&self, question: &str) -> Result<String, AnswerError> {
        self.questions.lock().unwrap().push(question.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AnswerError::network("No mock answer queued")))
    }

    fn endpoint(&self) -> &str {
        "mock://answers"
    }
}

// ============================================================================
// Recording Transport
// ============================================================================

/// One call made on the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    ShowTyping(String),
    ClearTyping(String),
    Send { to: String, text: String },
}

impl TransportCall {
    pub fn send(to: &str, text: &str) -> Self {
        TransportCall::Send {
            to: to.to_string(),
            text: text.to_string(),
        }
    }
}

/// Transport that records every call and always succeeds
pub struct RecordingTransport {
    calls: Mutex<Vec<TransportCall>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Only the sends, as (to, text)
    pub fn sent(&self) -> Vec<(String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                TransportCall::Send { to, text } => Some((to, text)),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    fn name(&self) -> &str {
        "recording"
    }

    async fn show_typing(&self, message: &InboundMessage) -> Result<(), TransportError> {
        self.calls
            .lock()
            .unwrap()
            .push(TransportCall::ShowTyping(message.from.clone()));
        Ok(())
    }

    async fn clear_typing(&self, message: &InboundMessage) -> Result<(), TransportError> {
        self.calls
            .lock()
            .unwrap()
            .push(TransportCall::ClearTyping(message.from.clone()));
        Ok(())
    }

    async fn send_text(&self, to: &str, text: &str) -> Result<(), TransportError> {
        self.calls.lock().unwrap().push(TransportCall::send(to, text));
        Ok(())
    }
}

// ============================================================================
// Failing Session Repository
// ============================================================================

/// Store whose every operation fails as if the database were unreachable
pub struct FailingSessionRepository;

#[async_trait]
impl SessionRepository for FailingSessionRepository {
    async fn start_session(&self, _sender: &str) -> Result<Session, DbError> {
        Err(DbError::Sqlx(sqlx::Error::PoolTimedOut))
    }

    async fn end_session(&self, _sender: &str) -> Result<(), DbError> {
        Err(DbError::Sqlx(sqlx::Error::PoolTimedOut))
    }

    async fn get_active_session(&self, _sender: &str) -> Result<Option<Session>, DbError> {
        Err(DbError::Sqlx(sqlx::Error::PoolTimedOut))
    }
}

// ============================================================================
// Recording Message Handler
// ============================================================================

/// Handler that records messages, optionally slowly or panicking
pub struct RecordingHandler {
    delay: Duration,
    panic_on: Option<String>,
    handled: Mutex<Vec<InboundMessage>>,
}

#[allow(dead_code)]
impl RecordingHandler {
    pub fn new() -> Self {
        Self::with_delay(Duration::ZERO)
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            panic_on: None,
            handled: Mutex::new(Vec::new()),
        }
    }

    /// Panics when a message body equals `body`
    pub fn panicking_on(body: &str) -> Self {
        Self {
            panic_on: Some(body.to_string()),
            ..Self::new()
        }
    }

    pub fn handled(&self) -> Vec<InboundMessage> {
        self.handled.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageHandler for RecordingHandler {
    async fn handle_message(&self, message: InboundMessage) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        assert!(
            self.panic_on.as_deref() != Some(message.body.as_str()),
            "handler asked to panic"
        );
        self.handled.lock().unwrap().push(message);
    }
}
