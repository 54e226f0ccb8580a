//! Telegram update handlers.
//!
//! Only the configured operator is served. Commands start with `/`; any other
//! text is a channel link to register.

use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{CallbackQuery, Message},
};

use ytb_core::domain::OperatorId;

use crate::router::AppState;

mod callback;
mod commands;
mod text;

const UNAUTHORIZED: &str = "Unauthorized. This bot serves a single operator.";

/// The operator id is a chat id: a private chat shares the user's id, a
/// group chat has its own (negative) id. Either match is served.
pub fn is_operator(user_id: Option<u64>, chat_id: Option<i64>, operator: OperatorId) -> bool {
    let by_user = user_id.is_some_and(|id| i64::try_from(id).ok() == Some(operator.0));
    by_user || chat_id == Some(operator.0)
}

pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    let chat_id = q.message.as_ref().map(|m| m.chat.id.0);
    if !is_operator(Some(q.from.id.0), chat_id, state.cfg.operator_id) {
        let _ = bot
            .answer_callback_query(q.id)
            .text("Unauthorized".to_string())
            .await;
        return Ok(());
    }
    callback::handle_callback(bot, q, state).await
}

pub async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let user_id = msg.from().map(|u| u.id.0);
    if !is_operator(user_id, Some(msg.chat.id.0), state.cfg.operator_id) {
        tracing::warn!(?user_id, chat = msg.chat.id.0, "rejected message from non-operator");
        let _ = bot.send_message(msg.chat.id, UNAUTHORIZED).await;
        return Ok(());
    }

    let Some(text) = msg.text() else {
        let _ = bot
            .send_message(msg.chat.id, "Send a YouTube channel link, or /help.")
            .await;
        return Ok(());
    };

    if text.starts_with('/') {
        return commands::handle_command(bot, msg, state).await;
    }
    text::handle_text(bot, msg, state).await
}
