//! Trait abstractions for runtime I/O
//!
//! The transport seam keeps the executor testable with a mock and keeps the
//! core free of any messaging-platform dependency.

use crate::dialog::KeyboardSet;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Outbound delivery failure, classified.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SendError {
    /// The recipient revoked contact (blocked the bot, deleted the account,
    /// or the chat no longer exists). Feeds the directory's liveness flag.
    #[error("recipient has revoked contact")]
    RecipientUnreachable,
    /// Any other delivery failure; counted but no directory state change.
    #[error("delivery failed: {0}")]
    Other(String),
}

/// Outbound messaging channel.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver `text` to `recipient` with the given logical reply keyboard.
    async fn send(
        &self,
        recipient: i64,
        text: &str,
        keyboard: KeyboardSet,
    ) -> Result<(), SendError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(
        &self,
        recipient: i64,
        text: &str,
        keyboard: KeyboardSet,
    ) -> Result<(), SendError> {
        (**self).send(recipient, text, keyboard).await
    }
}
