//! Property tests for the transition function

use crate::dialog::catalog::is_valid_name;
use crate::dialog::event::{Command, Event};
use crate::dialog::state::{ConversationState, DialogContext, ScratchFields, Stage};
use crate::dialog::transition::transition;
use proptest::prelude::*;

const ADMIN: i64 = 1;
const USER: i64 = 2;

fn arb_stage() -> impl Strategy<Value = Stage> {
    prop_oneof![
        Just(Stage::AwaitingName),
        Just(Stage::AwaitingNameConfirmation),
        Just(Stage::AwaitingWorkplace),
        Just(Stage::AwaitingWorkplaceConfirmation),
        Just(Stage::MainMenu),
        Just(Stage::AwaitingProfileEditChoice),
        Just(Stage::AwaitingNewName),
        Just(Stage::AwaitingNewWorkplace),
        Just(Stage::AwaitingProblemCategory),
    ]
}

fn arb_fields() -> impl Strategy<Value = ScratchFields> {
    (
        proptest::option::of("[a-zA-Z ]{0,60}"),
        proptest::option::of("[a-zA-Z0-9 ]{0,30}"),
    )
        .prop_map(|(name, workplace)| ScratchFields { name, workplace })
}

proptest! {
    /// Restart is never rejected by a stage guard: from any stage with any
    /// scratch contents, an unregistered user ends up in AwaitingName with
    /// cleared fields.
    #[test]
    fn restart_resets_from_any_stage(stage in arb_stage(), fields in arb_fields()) {
        let state = ConversationState::at(stage, fields);
        let result = transition(
            USER,
            &state,
            None,
            &DialogContext::new(ADMIN),
            &Event::Command(Command::Start),
        );
        prop_assert_eq!(result.state.stage, Some(Stage::AwaitingName));
        prop_assert_eq!(result.state.fields, ScratchFields::default());
    }

    /// The name stage accepts exactly the inputs whose trimmed length is in
    /// [2, 50] characters.
    #[test]
    fn name_acceptance_matches_guard(input in "\\PC{0,60}") {
        let state = ConversationState::at(Stage::AwaitingName, ScratchFields::default());
        let result = transition(
            USER,
            &state,
            None,
            &DialogContext::new(ADMIN),
            &Event::Text(input.clone()),
        );
        let expected = if is_valid_name(&input) {
            Some(Stage::AwaitingNameConfirmation)
        } else {
            Some(Stage::AwaitingName)
        };
        prop_assert_eq!(result.state.stage, expected);
    }

    /// Every text event produces at least one reply effect; the controller
    /// never silently drops an unmatched message.
    #[test]
    fn text_is_never_dropped(stage in arb_stage(), input in "[a-z ]{0,30}") {
        let state = ConversationState::at(stage, ScratchFields {
            name: Some("Ivan".to_string()),
            workplace: Some("Office1".to_string()),
        });
        let result = transition(
            USER,
            &state,
            None,
            &DialogContext::new(ADMIN),
            &Event::Text(input),
        );
        prop_assert!(!result.effects.is_empty());
    }
}
