//! Core dialog state machine
//!
//! Pure state transitions over a per-user stage plus scratch fields; all I/O
//! lives in the runtime executor.

pub mod catalog;
mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use catalog::KeyboardSet;
pub use effect::Effect;
pub use event::{classify, Command, Event};
pub use state::{ConversationState, DialogContext, EmployeeRecord, Stage, Ticket};
pub use transition::{transition, TransitionResult};
