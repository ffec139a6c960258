//! Event-dispatch runtime
//!
//! Wires the pure dialog controller to the directory and the outbound
//! transport, and owns the per-user conversation state store.

pub(crate) mod executor;
#[cfg(test)]
mod testing;
pub mod traits;

pub use executor::{BotRuntime, BroadcastReport};
pub use traits::{SendError, Transport};
