use std::sync::Arc;

use teloxide::prelude::*;

use crate::router::AppState;

use super::{
    commands::describe_interval,
    text::{ADD_MORE, DONE},
};

pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    let data = q.data.clone().unwrap_or_default();
    let Some(message) = q.message.as_ref() else {
        let _ = bot.answer_callback_query(q.id).await;
        return Ok(());
    };

    let text = match data.as_str() {
        ADD_MORE => {
            let limit = state.registry.limit();
            if state.registry.list().len() >= limit {
                let _ = bot
                    .answer_callback_query(q.id)
                    .text(format!("❌ Max {limit} channels!"))
                    .await;
                return Ok(());
            }
            "📝 Send another channel link:".to_string()
        }
        DONE => format!(
            "✅ Done!\n\n🎥 Videos coming every {}!",
            describe_interval(state.cfg.poll_interval)
        ),
        _ => {
            let _ = bot.answer_callback_query(q.id).await;
            return Ok(());
        }
    };

    let _ = bot.answer_callback_query(q.id.clone()).await;
    bot.edit_message_text(message.chat.id, message.id, text)
        .await?;
    Ok(())
}
