//! Pure decision function
//!
//! Maps an inbound message body and the sender's current session state to
//! an action and the effects that carry it out. No I/O happens here.

use super::Effect;
use crate::config::SessionSettings;
use std::fmt;

/// What to do with one inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Open a new session (duplicates allowed)
    Start,
    /// Expire the active session
    End,
    /// Forward the body to the answer service
    Answer { question: String },
    /// Outside a session and not a command: stay silent
    Ignore,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Start => "start",
            Action::End => "end",
            Action::Answer { .. } => "answer",
            Action::Ignore => "none",
        };
        f.write_str(name)
    }
}

/// Result of a decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub action: Action,
    pub effects: Vec<Effect>,
}

impl Decision {
    fn new(action: Action) -> Self {
        Self {
            action,
            effects: vec![],
        }
    }

    fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Decide how to handle `body` from a sender.
///
/// Commands match by exact equality and win over answering, so a command
/// sent mid-session is never forwarded as a question.
pub fn decide(settings: &SessionSettings, body: &str, has_active_session: bool) -> Decision {
    if body == settings.start_command {
        Decision::new(Action::Start)
            .with_effect(Effect::ShowTyping)
            .with_effect(Effect::StartSession)
            .with_effect(Effect::Pause(settings.typing_delay))
            .with_effect(Effect::ClearTyping)
            .with_effect(Effect::reply_text(&settings.greeting))
    } else if body == settings.end_command {
        Decision::new(Action::End)
            .with_effect(Effect::ShowTyping)
            .with_effect(Effect::EndSession)
            .with_effect(Effect::Pause(settings.typing_delay))
            .with_effect(Effect::ClearTyping)
            .with_effect(Effect::reply_text(&settings.farewell))
    } else if has_active_session {
        Decision::new(Action::Answer {
            question: body.to_string(),
        })
        .with_effect(Effect::ShowTyping)
        .with_effect(Effect::ask(body))
        .with_effect(Effect::ClearTyping)
        .with_effect(Effect::Reply(super::Reply::Answer))
    } else {
        Decision::new(Action::Ignore)
    }
}
