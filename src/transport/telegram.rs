//! Telegram adapter
//!
//! Maps Telegram updates onto dialog events and renders the logical keyboard
//! sets as reply keyboards. Uses the explicit Dispatcher pattern for reliable
//! long polling.

use crate::dialog::catalog::{
    KeyboardSet, BTN_BACK, BTN_CONFIRM, BTN_EDIT_NAME, BTN_EDIT_PROFILE, BTN_EDIT_WORKPLACE,
    BTN_NEW_TICKET, BTN_REJECT, PROBLEM_CATEGORIES, WORKPLACES,
};
use crate::dialog::{classify, Event};
use crate::runtime::{BotRuntime, SendError, Transport};
use async_trait::async_trait;
use std::sync::Arc;
use teloxide::{
    dispatching::{Dispatcher, UpdateFilterExt},
    dptree,
    error_handlers::LoggingErrorHandler,
    payloads::SendMessageSetters,
    prelude::{Requester, ResponseResult},
    types::{
        ChatId, ChatMemberUpdated, KeyboardButton, KeyboardMarkup, KeyboardRemove, Message,
        ReplyMarkup, Update,
    },
    ApiError, Bot, RequestError,
};
use tokio::sync::Mutex;

/// Outbound channel backed by the Telegram Bot API.
pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send(
        &self,
        recipient: i64,
        text: &str,
        keyboard: KeyboardSet,
    ) -> Result<(), SendError> {
        let request = self.bot.send_message(ChatId(recipient), text);
        let result = match render_keyboard(keyboard) {
            Some(markup) => request.reply_markup(markup).await,
            None => request.await,
        };
        result.map(|_| ()).map_err(classify_send_error)
    }
}

/// Delivery failures that mean the recipient is gone feed the directory's
/// reachability flag; everything else is transient.
fn classify_send_error(err: RequestError) -> SendError {
    match err {
        RequestError::Api(
            ApiError::BotBlocked | ApiError::UserDeactivated | ApiError::ChatNotFound,
        ) => SendError::RecipientUnreachable,
        other => SendError::Other(other.to_string()),
    }
}

fn render_keyboard(set: KeyboardSet) -> Option<ReplyMarkup> {
    match set {
        KeyboardSet::None => None,
        KeyboardSet::Remove => Some(ReplyMarkup::KeyboardRemove(KeyboardRemove::new())),
        KeyboardSet::MainMenu => Some(keyboard(&[&[BTN_NEW_TICKET], &[BTN_EDIT_PROFILE]])),
        KeyboardSet::ProfileEdit => Some(keyboard(&[
            &[BTN_EDIT_NAME, BTN_EDIT_WORKPLACE],
            &[BTN_BACK],
        ])),
        KeyboardSet::Confirm => Some(keyboard(&[&[BTN_CONFIRM, BTN_REJECT]])),
        KeyboardSet::Workplaces => Some(grid(&WORKPLACES)),
        KeyboardSet::Problems => Some(grid(&PROBLEM_CATEGORIES)),
    }
}

fn keyboard(rows: &[&[&str]]) -> ReplyMarkup {
    let rows: Vec<Vec<KeyboardButton>> = rows
        .iter()
        .map(|row| row.iter().map(|&label| KeyboardButton::new(label)).collect())
        .collect();
    ReplyMarkup::Keyboard(KeyboardMarkup::new(rows))
}

/// Fixed catalogs render two buttons per row.
fn grid(labels: &[&str]) -> ReplyMarkup {
    let rows: Vec<Vec<KeyboardButton>> = labels
        .chunks(2)
        .map(|chunk| chunk.iter().map(|&label| KeyboardButton::new(label)).collect())
        .collect();
    ReplyMarkup::Keyboard(KeyboardMarkup::new(rows))
}

type SharedRuntime = Arc<Mutex<BotRuntime<TelegramTransport>>>;

/// Long-poll Telegram and feed updates into the runtime until shutdown.
pub async fn run(bot: Bot, runtime: SharedRuntime) {
    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(on_message))
        .branch(Update::filter_my_chat_member().endpoint(on_chat_member));

    tracing::info!("Starting dispatcher with long polling");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![runtime])
        .default_handler(|upd| async move {
            tracing::debug!(?upd, "Unhandled update");
        })
        .error_handler(LoggingErrorHandler::with_custom_text("Update handler error"))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    tracing::warn!("Dispatcher stopped");
}

/// Identity is always the Telegram user id of the sender, and only private
/// chats drive the dialog. Group traffic is ignored: routing it by chat id
/// would collapse every member into one directory record.
fn sender_id(msg: &Message) -> Option<i64> {
    if !msg.chat.is_private() {
        return None;
    }
    let from = msg.from.as_ref()?;
    if from.is_bot {
        return None;
    }
    Some(from.id.0 as i64)
}

async fn on_message(msg: Message, runtime: SharedRuntime) -> ResponseResult<()> {
    // Private text messages only; media, group traffic, and bot echoes are
    // ignored.
    let (Some(text), Some(sender)) = (msg.text(), sender_id(&msg)) else {
        return Ok(());
    };

    let event = classify(text);
    runtime.lock().await.process(sender, event).await;
    Ok(())
}

/// `my_chat_member` updates report the user blocking or unblocking the bot.
/// In a private chat the actor is the chat peer, so `from` is the identity.
async fn on_chat_member(upd: ChatMemberUpdated, runtime: SharedRuntime) -> ResponseResult<()> {
    if !upd.chat.is_private() {
        return Ok(());
    }
    let user_id = upd.from.id.0 as i64;
    let event = if upd.new_chat_member.kind.is_present() {
        Event::ContactRestored
    } else {
        Event::ContactRevoked
    };
    tracing::info!(user_id, ?event, "Membership change");
    runtime.lock().await.process(user_id, event).await;
    Ok(())
}
