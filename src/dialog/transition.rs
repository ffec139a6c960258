//! Pure state transition function
//!
//! Given the sender's current dialog state, their directory record (already
//! read by the caller), and an inbound event, decide the next state and the
//! side effects to run. No I/O happens here; the runtime executor interprets
//! the returned effects.
//!
//! Precedence is fixed: commands always win. Text that parses as a known
//! command is routed through `Event::Command` by the caller and never reaches
//! a stage guard.

use crate::dialog::catalog::{
    is_valid_name, is_valid_problem, is_valid_workplace, KeyboardSet, BTN_BACK, BTN_CONFIRM,
    BTN_EDIT_NAME, BTN_EDIT_PROFILE, BTN_EDIT_WORKPLACE, BTN_NEW_TICKET, BTN_REJECT,
};
use crate::dialog::effect::Effect;
use crate::dialog::event::{Command, Event};
use crate::dialog::state::{
    ConversationState, DialogContext, EmployeeRecord, ScratchFields, Stage, Ticket,
};

const GREETING: &str = "👋 Hi! I'm the IT helpdesk bot.\nLet's get acquainted.\n\nWhat is your name?";
const NAME_INVALID: &str = "The name must be 2 to 50 characters. Try again:";
const WORKPLACE_PROMPT: &str = "📍 Pick your workplace:";
const WORKPLACE_INVALID: &str = "Please pick a workplace from the list, using the buttons:";
const MENU_PROMPT: &str = "Use the menu buttons below:";
const PROFILE_EDIT_PROMPT: &str = "What do you want to change?";
const NEW_NAME_PROMPT: &str = "Enter your new name:";
const PROBLEM_PROMPT: &str = "Pick the problem category:";
const PROBLEM_INVALID: &str = "Please pick a problem from the list, using the buttons:";
const CANCELLED: &str = "❌ Cancelled. Send any message to start over.";
const ACCESS_DENIED: &str = "⛔ You are not allowed to use this command.";
const BROADCAST_USAGE: &str = "Usage: /broadcast <text>";

const HELP: &str = "I collect IT problem reports and forward them to the sysadmin.\n\n\
/start — start over\n\
/cancel — cancel the current action\n\
/help — this text";

const HELP_ADMIN: &str = "\n\nAdmin commands:\n\
/stats — directory stats\n\
/broadcast <text> — message all reachable employees\n\
/employees — list registered employees\n\
/purge — remove blocked employees";

/// Result of a state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionResult {
    pub state: ConversationState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ConversationState) -> Self {
        Self {
            state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Pure transition function: same inputs, same outputs, no side effects.
pub fn transition(
    sender: i64,
    state: &ConversationState,
    record: Option<&EmployeeRecord>,
    ctx: &DialogContext,
    event: &Event,
) -> TransitionResult {
    match event {
        Event::Command(cmd) => handle_command(sender, state, record, ctx, cmd),
        Event::Text(text) => handle_text(sender, state, record, text.trim()),
        Event::ContactRevoked => TransitionResult::new(ConversationState::cleared())
            .with_effect(Effect::MarkUnreachable),
        Event::ContactRestored => {
            TransitionResult::new(state.clone()).with_effect(Effect::MarkReachable)
        }
    }
}

/// Commands are accepted from every stage, including mid-confirmation.
fn handle_command(
    sender: i64,
    state: &ConversationState,
    record: Option<&EmployeeRecord>,
    ctx: &DialogContext,
    cmd: &Command,
) -> TransitionResult {
    if cmd.requires_admin() && !ctx.is_admin(sender) {
        return TransitionResult::new(state.clone()).with_effect(Effect::say(ACCESS_DENIED));
    }

    match cmd {
        // Universal escape hatch: clear everything, re-dispatch as idle.
        Command::Start => dispatch_idle(record),

        Command::Cancel => TransitionResult::new(ConversationState::cleared())
            .with_effect(Effect::reply(CANCELLED, KeyboardSet::Remove)),

        Command::Help => {
            let text = if ctx.is_admin(sender) {
                format!("{HELP}{HELP_ADMIN}")
            } else {
                HELP.to_string()
            };
            TransitionResult::new(state.clone()).with_effect(Effect::say(text))
        }

        Command::Stats => TransitionResult::new(state.clone()).with_effect(Effect::ReportStats),

        Command::Broadcast(body) => {
            let result = TransitionResult::new(state.clone());
            if body.is_empty() {
                result.with_effect(Effect::say(BROADCAST_USAGE))
            } else {
                result.with_effect(Effect::Broadcast { body: body.clone() })
            }
        }

        Command::ListEmployees => {
            TransitionResult::new(state.clone()).with_effect(Effect::ListEmployees)
        }

        Command::PurgeUnreachable => {
            TransitionResult::new(state.clone()).with_effect(Effect::PurgeUnreachable)
        }
    }
}

/// Promote the idle (null) state: unknown users start registration,
/// registered users land in the main menu with scratch fields preloaded.
fn dispatch_idle(record: Option<&EmployeeRecord>) -> TransitionResult {
    match record {
        None => TransitionResult::new(ConversationState::at(
            Stage::AwaitingName,
            ScratchFields::default(),
        ))
        .with_effect(Effect::reply(GREETING, KeyboardSet::Remove)),

        Some(r) => TransitionResult::new(ConversationState::at(
            Stage::MainMenu,
            ScratchFields {
                name: Some(r.name.clone()),
                workplace: Some(r.workplace.clone()),
            },
        ))
        .with_effect(Effect::reply(
            format!("👋 Welcome back, {}!", r.name),
            KeyboardSet::MainMenu,
        )),
    }
}

fn handle_text(
    sender: i64,
    state: &ConversationState,
    record: Option<&EmployeeRecord>,
    text: &str,
) -> TransitionResult {
    let Some(stage) = state.stage else {
        return dispatch_idle(record);
    };

    match stage {
        Stage::AwaitingName => {
            if is_valid_name(text) {
                let name = text.to_string();
                TransitionResult::new(ConversationState::at(
                    Stage::AwaitingNameConfirmation,
                    ScratchFields {
                        name: Some(name.clone()),
                        workplace: state.fields.workplace.clone(),
                    },
                ))
                .with_effect(Effect::reply(
                    format!("Your name is \"{name}\" — correct?"),
                    KeyboardSet::Confirm,
                ))
            } else {
                reprompt(state, NAME_INVALID, KeyboardSet::None)
            }
        }

        Stage::AwaitingNameConfirmation => match text {
            t if t == BTN_CONFIRM => TransitionResult::new(ConversationState::at(
                Stage::AwaitingWorkplace,
                state.fields.clone(),
            ))
            .with_effect(Effect::reply(WORKPLACE_PROMPT, KeyboardSet::Workplaces)),
            t if t == BTN_REJECT => TransitionResult::new(ConversationState::at(
                Stage::AwaitingName,
                ScratchFields {
                    name: None,
                    workplace: state.fields.workplace.clone(),
                },
            ))
            .with_effect(Effect::reply("What is your name?", KeyboardSet::Remove)),
            _ => reprompt(state, "Please answer with the buttons:", KeyboardSet::Confirm),
        },

        Stage::AwaitingWorkplace => {
            if is_valid_workplace(text) {
                let workplace = text.to_string();
                TransitionResult::new(ConversationState::at(
                    Stage::AwaitingWorkplaceConfirmation,
                    ScratchFields {
                        name: state.fields.name.clone(),
                        workplace: Some(workplace.clone()),
                    },
                ))
                .with_effect(Effect::reply(
                    format!("Workplace \"{workplace}\" — correct?"),
                    KeyboardSet::Confirm,
                ))
            } else {
                reprompt(state, WORKPLACE_INVALID, KeyboardSet::Workplaces)
            }
        }

        Stage::AwaitingWorkplaceConfirmation => match text {
            t if t == BTN_CONFIRM => {
                // Both scratch fields are guaranteed by the preceding stages;
                // if either is somehow missing, recover through idle dispatch.
                let (Some(name), Some(workplace)) =
                    (state.fields.name.clone(), state.fields.workplace.clone())
                else {
                    return dispatch_idle(record);
                };
                TransitionResult::new(ConversationState::at(
                    Stage::MainMenu,
                    state.fields.clone(),
                ))
                .with_effect(Effect::UpsertEmployee {
                    name: name.clone(),
                    workplace,
                })
                .with_effect(Effect::reply(
                    format!("✅ All set, {name}! You are registered."),
                    KeyboardSet::MainMenu,
                ))
            }
            t if t == BTN_REJECT => TransitionResult::new(ConversationState::at(
                Stage::AwaitingWorkplace,
                state.fields.clone(),
            ))
            .with_effect(Effect::reply(WORKPLACE_PROMPT, KeyboardSet::Workplaces)),
            _ => reprompt(state, "Please answer with the buttons:", KeyboardSet::Confirm),
        },

        Stage::MainMenu => match text {
            t if t == BTN_NEW_TICKET => TransitionResult::new(ConversationState::at(
                Stage::AwaitingProblemCategory,
                state.fields.clone(),
            ))
            .with_effect(Effect::reply(PROBLEM_PROMPT, KeyboardSet::Problems)),
            t if t == BTN_EDIT_PROFILE => TransitionResult::new(ConversationState::at(
                Stage::AwaitingProfileEditChoice,
                state.fields.clone(),
            ))
            .with_effect(Effect::reply(PROFILE_EDIT_PROMPT, KeyboardSet::ProfileEdit)),
            _ => reprompt(state, MENU_PROMPT, KeyboardSet::MainMenu),
        },

        Stage::AwaitingProfileEditChoice => match text {
            t if t == BTN_EDIT_NAME => TransitionResult::new(ConversationState::at(
                Stage::AwaitingNewName,
                state.fields.clone(),
            ))
            .with_effect(Effect::reply(NEW_NAME_PROMPT, KeyboardSet::Remove)),
            t if t == BTN_EDIT_WORKPLACE => TransitionResult::new(ConversationState::at(
                Stage::AwaitingNewWorkplace,
                state.fields.clone(),
            ))
            .with_effect(Effect::reply(WORKPLACE_PROMPT, KeyboardSet::Workplaces)),
            t if t == BTN_BACK => TransitionResult::new(ConversationState::at(
                Stage::MainMenu,
                state.fields.clone(),
            ))
            .with_effect(Effect::reply(MENU_PROMPT, KeyboardSet::MainMenu)),
            _ => reprompt(state, PROFILE_EDIT_PROMPT, KeyboardSet::ProfileEdit),
        },

        // In-place edits skip confirmation: the record is trivially
        // re-editable from the menu.
        Stage::AwaitingNewName => {
            if is_valid_name(text) {
                let name = text.to_string();
                TransitionResult::new(ConversationState::at(
                    Stage::MainMenu,
                    ScratchFields {
                        name: Some(name.clone()),
                        workplace: state.fields.workplace.clone(),
                    },
                ))
                .with_effect(Effect::UpdateName { name })
                .with_effect(Effect::reply("✅ Name updated.", KeyboardSet::MainMenu))
            } else {
                reprompt(state, NAME_INVALID, KeyboardSet::None)
            }
        }

        Stage::AwaitingNewWorkplace => {
            if is_valid_workplace(text) {
                let workplace = text.to_string();
                TransitionResult::new(ConversationState::at(
                    Stage::MainMenu,
                    ScratchFields {
                        name: state.fields.name.clone(),
                        workplace: Some(workplace.clone()),
                    },
                ))
                .with_effect(Effect::UpdateWorkplace { workplace })
                .with_effect(Effect::reply("✅ Workplace updated.", KeyboardSet::MainMenu))
            } else {
                reprompt(state, WORKPLACE_INVALID, KeyboardSet::Workplaces)
            }
        }

        Stage::AwaitingProblemCategory => {
            if is_valid_problem(text) {
                let name = state
                    .fields
                    .name
                    .clone()
                    .or_else(|| record.map(|r| r.name.clone()));
                let workplace = state
                    .fields
                    .workplace
                    .clone()
                    .or_else(|| record.map(|r| r.workplace.clone()));
                let (Some(name), Some(workplace)) = (name, workplace) else {
                    return dispatch_idle(record);
                };
                TransitionResult::new(ConversationState::at(
                    Stage::MainMenu,
                    state.fields.clone(),
                ))
                .with_effect(Effect::NotifyAdmin {
                    ticket: Ticket {
                        user_id: sender,
                        name,
                        workplace,
                        problem: text.to_string(),
                    },
                })
                .with_effect(Effect::reply(
                    "✅ Ticket submitted!\nThe sysadmin has been notified.",
                    KeyboardSet::MainMenu,
                ))
            } else {
                reprompt(state, PROBLEM_INVALID, KeyboardSet::Problems)
            }
        }
    }
}

/// Unrecognized input never advances state and never goes unanswered.
fn reprompt(state: &ConversationState, text: &str, keyboard: KeyboardSet) -> TransitionResult {
    TransitionResult::new(state.clone()).with_effect(Effect::reply(text, keyboard))
}
