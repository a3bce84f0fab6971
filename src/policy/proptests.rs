//! Property-based tests for the session policy

use super::*;
use crate::config::SessionSettings;
use proptest::prelude::*;

fn arb_body() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("!start.ai".to_string()),
        Just("!end.ai".to_string()),
        "[!a-zA-Z0-9 .?]{0,40}",
    ]
}

proptest! {
    #[test]
    fn prop_start_literal_always_starts(active in any::<bool>()) {
        let decision = decide(&SessionSettings::default(), "!start.ai", active);
        prop_assert_eq!(decision.action, Action::Start);
    }

    #[test]
    fn prop_end_literal_always_ends(active in any::<bool>()) {
        let decision = decide(&SessionSettings::default(), "!end.ai", active);
        prop_assert_eq!(decision.action, Action::End);
    }

    #[test]
    fn prop_non_command_answers_iff_active(body in "[a-zA-Z0-9 .?]{0,40}", active in any::<bool>()) {
        let decision = decide(&SessionSettings::default(), &body, active);
        if active {
            prop_assert_eq!(decision.action, Action::Answer { question: body.clone() });
            prop_assert!(decision.effects.contains(&Effect::ask(body)));
        } else {
            prop_assert_eq!(decision.action, Action::Ignore);
        }
    }

    #[test]
    fn prop_only_commands_touch_the_store(body in arb_body(), active in any::<bool>()) {
        let settings = SessionSettings::default();
        let decision = decide(&settings, &body, active);
        let mutates = decision.effects.iter().any(Effect::mutates_store);
        let is_command = body == settings.start_command || body == settings.end_command;
        prop_assert_eq!(mutates, is_command);
    }

    #[test]
    fn prop_typing_is_balanced_and_precedes_reply(body in arb_body(), active in any::<bool>()) {
        let decision = decide(&SessionSettings::default(), &body, active);
        let effects = &decision.effects;

        let shows = effects.iter().filter(|e| matches!(e, Effect::ShowTyping)).count();
        let clears = effects.iter().filter(|e| matches!(e, Effect::ClearTyping)).count();
        prop_assert_eq!(shows, clears);

        if let Some(reply) = effects.iter().position(|e| matches!(e, Effect::Reply(_))) {
            prop_assert_eq!(reply, effects.len() - 1);
            prop_assert_eq!(effects.first(), Some(&Effect::ShowTyping));
            prop_assert_eq!(&effects[reply - 1], &Effect::ClearTyping);
        } else {
            prop_assert!(effects.is_empty());
        }
    }
}
