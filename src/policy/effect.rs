//! Effects produced by a policy decision

use std::time::Duration;

/// Side effects the dispatcher performs, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Show the composing indicator in the sender's chat
    ShowTyping,

    /// Insert a new session row for the sender
    StartSession,

    /// Expire the sender's active session rows
    EndSession,

    /// Fixed pause before replying
    Pause(Duration),

    /// Query the answer service
    Ask { question: String },

    /// Clear the composing indicator
    ClearTyping,

    /// Send a reply to the sender
    Reply(Reply),
}

/// Reply content
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    /// Whatever the preceding `Ask` returned
    Answer,
}

impl Effect {
    pub fn reply_text(text: impl Into<String>) -> Self {
        Effect::Reply(Reply::Text(text.into()))
    }

    pub fn ask(question: impl Into<String>) -> Self {
        Effect::Ask {
            question: question.into(),
        }
    }

    /// Whether this effect writes to the session store
    #[allow(dead_code)] // Used in tests
    pub fn mutates_store(&self) -> bool {
        matches!(self, Effect::StartSession | Effect::EndSession)
    }
}
