//! Question-answering service abstraction
//!
//! The gateway forwards in-session messages to an external service and
//! relays whatever text it returns.

mod error;
mod http;

pub use error::{AnswerError, AnswerErrorKind};
pub use http::HttpAnswerService;

use async_trait::async_trait;
use std::sync::Arc;

/// Common interface for answer providers
#[async_trait]
pub trait AnswerService: Send + Sync {
    /// Resolve a free-text question to the reply text
    async fn answer(&self, question: &str) -> Result<String, AnswerError>;

    /// Where requests go, for logging
    fn endpoint(&self) -> &str;
}

#[async_trait]
impl<T: AnswerService + ?Sized> AnswerService for Arc<T> {
    async fn answer(&self, question: &str) -> Result<String, AnswerError> {
        (**self).answer(question).await
    }

    fn endpoint(&self) -> &str {
        (**self).endpoint()
    }
}

/// Logging wrapper for answer services
pub struct LoggingAnswerService {
    inner: Arc<dyn AnswerService>,
}

impl LoggingAnswerService {
    pub fn new(inner: Arc<dyn AnswerService>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl AnswerService for LoggingAnswerService {
    async fn answer(&self, question: &str) -> Result<String, AnswerError> {
        let start = std::time::Instant::now();
        let result = self.inner.answer(question).await;
        let duration = start.elapsed();

        match &result {
            Ok(reply) => {
                tracing::info!(
                    endpoint = %self.inner.endpoint(),
                    duration_ms = %duration.as_millis(),
                    question_len = question.len(),
                    reply_len = reply.len(),
                    "Answer request completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    endpoint = %self.inner.endpoint(),
                    duration_ms = %duration.as_millis(),
                    kind = ?e.kind,
                    error = %e.message,
                    "Answer request failed"
                );
            }
        }

        result
    }

    fn endpoint(&self) -> &str {
        self.inner.endpoint()
    }
}
