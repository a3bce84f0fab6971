//! Message dispatcher
//!
//! Looks up the sender's session, asks the policy what to do, and carries
//! out the resulting effects against the store, answer service and
//! transport.

use super::traits::{MessageHandler, SessionRepository};
use super::{DispatchError, FailurePolicy, Outcome};
use crate::answer::AnswerService;
use crate::channel::{ChatTransport, InboundMessage};
use crate::config::SessionSettings;
use crate::policy::{decide, Action, Effect, Reply};
use async_trait::async_trait;

/// Failure of one message, with the action decided before it failed
#[derive(Debug)]
pub struct DispatchFailure {
    /// `None` when the session lookup itself failed
    pub action: Option<Action>,
    pub error: DispatchError,
}

/// Per-message scratch state while effects run
#[derive(Default)]
struct EffectRun {
    typing: bool,
    answer: Option<String>,
}

/// Generic dispatcher over any store, answer service and transport
pub struct Dispatcher<S, A, T>
where
    S: SessionRepository,
    A: AnswerService,
    T: ChatTransport,
{
    settings: SessionSettings,
    store: S,
    answers: A,
    transport: T,
    failure_policy: FailurePolicy,
}

impl<S, A, T> Dispatcher<S, A, T>
where
    S: SessionRepository,
    A: AnswerService,
    T: ChatTransport,
{
    pub fn new(settings: SessionSettings, store: S, answers: A, transport: T) -> Self {
        Self {
            settings,
            store,
            answers,
            transport,
            failure_policy: FailurePolicy::Silent,
        }
    }

    #[must_use]
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Handle one message; errors propagate to the caller
    pub async fn dispatch(&self, message: &InboundMessage) -> Result<Outcome, DispatchFailure> {
        // Looked up for every message, commands included
        let active = self
            .store
            .get_active_session(&message.from)
            .await
            .map_err(|e| DispatchFailure {
                action: None,
                error: e.into(),
            })?;

        let decision = decide(&self.settings, &message.body, active.is_some());
        tracing::debug!(
            sender = %message.from,
            action = %decision.action,
            active_session = active.as_ref().map(|s| s.id),
            "Policy decision"
        );

        let mut run = EffectRun::default();
        for effect in decision.effects {
            if let Err(error) = self.execute_effect(message, effect, &mut run).await {
                if run.typing {
                    if let Err(e) = self.transport.clear_typing(message).await {
                        tracing::warn!(sender = %message.from, error = %e, "Failed to clear typing indicator");
                    }
                }
                return Err(DispatchFailure {
                    action: Some(decision.action),
                    error,
                });
            }
        }

        Ok(Outcome::from(&decision.action))
    }

    /// Handle one message, containing any failure at this boundary
    pub async fn dispatch_supervised(&self, message: &InboundMessage) -> Option<Outcome> {
        let start = std::time::Instant::now();
        match self.dispatch(message).await {
            Ok(outcome) => {
                tracing::info!(
                    sender = %message.from,
                    message_id = %message.id,
                    outcome = %outcome,
                    duration_ms = %start.elapsed().as_millis(),
                    "Message handled"
                );
                Some(outcome)
            }
            Err(failure) => {
                tracing::error!(
                    sender = %message.from,
                    message_id = %message.id,
                    action = ?failure.action.as_ref().map(ToString::to_string),
                    error = %failure.error,
                    "Message handling failed"
                );
                self.apply_failure_policy(message, &failure).await;
                None
            }
        }
    }

    async fn apply_failure_policy(&self, message: &InboundMessage, failure: &DispatchFailure) {
        let FailurePolicy::Fallback(text) = &self.failure_policy else {
            return;
        };

        // Senders outside a session never hear from the gateway
        let engaged = match &failure.action {
            Some(action) => *action != Action::Ignore,
            None => self.is_command(&message.body),
        };
        if !engaged {
            return;
        }

        if let Err(e) = self.transport.send_text(&message.from, text).await {
            tracing::warn!(sender = %message.from, error = %e, "Failed to send fallback reply");
        }
    }

    fn is_command(&self, body: &str) -> bool {
        body == self.settings.start_command || body == self.settings.end_command
    }

    /// Execute an effect
    async fn execute_effect(
        &self,
        message: &InboundMessage,
        effect: Effect,
        run: &mut EffectRun,
    ) -> Result<(), DispatchError> {
        match effect {
            Effect::ShowTyping => {
                self.transport.show_typing(message).await?;
                run.typing = true;
            }
            Effect::StartSession => {
                let session = self.store.start_session(&message.from).await?;
                tracing::info!(
                    sender = %message.from,
                    session_id = session.id,
                    expires_at = %session.expires_at(),
                    "Session started"
                );
            }
            Effect::EndSession => {
                self.store.end_session(&message.from).await?;
                tracing::info!(sender = %message.from, "Session ended");
            }
            Effect::Pause(delay) => {
                tokio::time::sleep(delay).await;
            }
            Effect::Ask { question } => {
                run.answer = Some(self.answers.answer(&question).await?);
            }
            Effect::ClearTyping => {
                self.transport.clear_typing(message).await?;
                run.typing = false;
            }
            Effect::Reply(Reply::Text(text)) => {
                self.transport.send_text(&message.from, &text).await?;
            }
            Effect::Reply(Reply::Answer) => {
                let text = run.answer.take().ok_or(DispatchError::MissingAnswer)?;
                self.transport.send_text(&message.from, &text).await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<S, A, T> MessageHandler for Dispatcher<S, A, T>
where
    S: SessionRepository,
    A: AnswerService,
    T: ChatTransport,
{
    async fn handle_message(&self, message: InboundMessage) {
        self.dispatch_supervised(&message).await;
    }
}
