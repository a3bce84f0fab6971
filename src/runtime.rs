//! Runtime for handling inbound messages
//!
//! Each sender gets a single-writer worker fed by a bounded queue, so one
//! sender's messages are handled strictly in arrival order while different
//! senders proceed concurrently. Each message runs in its own supervised
//! task; a failure or panic is logged and never reaches other senders.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::{DispatchFailure, Dispatcher};
pub use traits::*;

use crate::answer::{AnswerError, AnswerService};
use crate::channel::{ChatTransport, InboundMessage, TransportError};
use crate::db::{DbError, SessionStore};
use crate::policy::Action;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::task::TaskTracker;

/// Type alias for the production dispatcher with concrete implementations
pub type ProductionDispatcher =
    Dispatcher<SessionStore, Arc<dyn AnswerService>, Arc<dyn ChatTransport>>;

const DEFAULT_QUEUE_CAPACITY: usize = 64;
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// What the sender sees when handling a message fails
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// No reply at all
    #[default]
    Silent,
    /// A fixed reply, sent only to senders the gateway was engaging with
    Fallback(String),
}

/// How a message was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Started,
    Ended,
    Answered,
    Ignored,
}

impl From<&Action> for Outcome {
    fn from(action: &Action) -> Self {
        match action {
            Action::Start => Outcome::Started,
            Action::End => Outcome::Ended,
            Action::Answer { .. } => Outcome::Answered,
            Action::Ignore => Outcome::Ignored,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Outcome::Started => "started",
            Outcome::Ended => "ended",
            Outcome::Answered => "answered",
            Outcome::Ignored => "ignored",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Session store: {0}")]
    Store(#[from] DbError),
    #[error("Answer service: {0}")]
    Answer(#[from] AnswerError),
    #[error("Transport: {0}")]
    Transport(#[from] TransportError),
    #[error("Reply requested before an answer was fetched")]
    MissingAnswer,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum QueueError {
    #[error("Queue for sender {0} is full")]
    Full(String),
    #[error("Gateway is shutting down")]
    ShuttingDown,
}

/// Per-sender worker queues
#[derive(Clone)]
pub struct SenderQueues {
    inner: Arc<QueuesInner>,
}

struct QueuesInner {
    handler: Arc<dyn MessageHandler>,
    state: Mutex<QueueState>,
    tracker: TaskTracker,
    capacity: usize,
    idle_timeout: Duration,
}

#[derive(Default)]
struct QueueState {
    queues: HashMap<String, QueueEntry>,
    next_generation: u64,
    closed: bool,
}

struct QueueEntry {
    generation: u64,
    tx: mpsc::Sender<InboundMessage>,
}

impl SenderQueues {
    pub fn new(handler: Arc<dyn MessageHandler>) -> Self {
        Self::with_limits(handler, DEFAULT_QUEUE_CAPACITY, DEFAULT_IDLE_TIMEOUT)
    }

    pub fn with_limits(
        handler: Arc<dyn MessageHandler>,
        capacity: usize,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(QueuesInner {
                handler,
                state: Mutex::new(QueueState::default()),
                tracker: TaskTracker::new(),
                capacity: capacity.max(1),
                idle_timeout,
            }),
        }
    }

    /// Queue a message behind any earlier ones from the same sender.
    ///
    /// Sends happen under the state lock, which is also where an idle
    /// worker retires, so a message can never land in a retiring queue.
    pub fn enqueue(&self, message: InboundMessage) -> Result<(), QueueError> {
        let mut state = self.inner.lock_state();
        if state.closed {
            return Err(QueueError::ShuttingDown);
        }

        let message = match state.queues.get(&message.from) {
            Some(entry) => match entry.tx.try_send(message) {
                Ok(()) => return Ok(()),
                Err(TrySendError::Full(message)) => {
                    tracing::warn!(sender = %message.from, "Sender queue full");
                    return Err(QueueError::Full(message.from));
                }
                // Worker died without retiring (panicked)
                Err(TrySendError::Closed(message)) => {
                    tracing::warn!(sender = %message.from, "Replacing dead sender worker");
                    state.queues.remove(&message.from);
                    message
                }
            },
            None => message,
        };

        let generation = state.next_generation;
        state.next_generation += 1;
        let (tx, rx) = mpsc::channel(self.inner.capacity);
        let sender = message.from.clone();
        tx.try_send(message)
            .map_err(|_| QueueError::Full(sender.clone()))?;
        state
            .queues
            .insert(sender.clone(), QueueEntry { generation, tx });

        tracing::debug!(sender = %sender, generation, "Spawning sender worker");
        let inner = self.inner.clone();
        self.inner
            .tracker
            .spawn(async move { inner.run_worker(sender, generation, rx).await });
        Ok(())
    }

    /// Number of senders with a live worker
    pub fn active_senders(&self) -> usize {
        self.inner.lock_state().queues.len()
    }

    /// Stop accepting messages and wait for queued ones to finish
    pub async fn shutdown(&self) {
        {
            let mut state = self.inner.lock_state();
            state.closed = true;
            // Dropping the senders lets each worker drain and exit
            state.queues.clear();
        }
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
        tracing::info!("Sender queues drained");
    }
}

impl QueuesInner {
    fn lock_state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn run_worker(
        self: Arc<Self>,
        sender: String,
        generation: u64,
        mut rx: mpsc::Receiver<InboundMessage>,
    ) {
        loop {
            match tokio::time::timeout(self.idle_timeout, rx.recv()).await {
                Ok(Some(message)) => self.handle_supervised(message).await,
                Ok(None) => break,
                Err(_) => {
                    if self.retire(&sender, generation, &rx) {
                        break;
                    }
                }
            }
        }
        tracing::debug!(sender = %sender, generation, "Sender worker stopped");
    }

    /// Remove this worker's queue if nothing is pending
    fn retire(&self, sender: &str, generation: u64, rx: &mpsc::Receiver<InboundMessage>) -> bool {
        let mut state = self.lock_state();
        if !rx.is_empty() {
            return false;
        }
        if state
            .queues
            .get(sender)
            .is_some_and(|entry| entry.generation == generation)
        {
            state.queues.remove(sender);
        }
        true
    }

    /// Run one message in its own task so a panic stays contained
    async fn handle_supervised(&self, message: InboundMessage) {
        let handler = self.handler.clone();
        let sender = message.from.clone();
        let message_id = message.id.clone();
        let task = tokio::spawn(async move { handler.handle_message(message).await });
        if let Err(e) = task.await {
            tracing::error!(
                sender = %sender,
                message_id = %message_id,
                error = %e,
                "Message task panicked"
            );
        }
    }
}
