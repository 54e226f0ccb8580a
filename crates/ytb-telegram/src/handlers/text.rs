use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{InlineKeyboardButton, InlineKeyboardMarkup},
};

use ytb_core::{registry::Registered, Error, Result};

use crate::router::AppState;

pub(super) const ADD_MORE: &str = "add_more";
pub(super) const DONE: &str = "done";

pub(super) fn registration_keyboard(has_room: bool) -> InlineKeyboardMarkup {
    let mut row = Vec::new();
    if has_room {
        row.push(InlineKeyboardButton::callback("📄 Add More", ADD_MORE));
    }
    row.push(InlineKeyboardButton::callback("✅ Done", DONE));
    InlineKeyboardMarkup::new(vec![row])
}

/// Reply text, and the keyboard to attach when registration succeeded.
fn registration_reply(res: &Result<Registered>) -> (String, Option<InlineKeyboardMarkup>) {
    match res {
        Ok(r) => (
            format!(
                "✅ Added: {}\n📊 {}/{}\n\nWhat next?",
                r.source.display_name, r.total, r.limit
            ),
            Some(registration_keyboard(r.has_room())),
        ),
        Err(Error::InvalidInput(_)) => (
            "❌ Invalid link!\n\nTry: youtube.com/@channelname".to_string(),
            None,
        ),
        Err(Error::Duplicate(_)) => ("⚠️ Already added!".to_string(), None),
        Err(Error::LimitExceeded { limit }) => (format!("❌ Max {limit} channels!"), None),
        Err(e) => (format!("❌ Could not add channel: {e}"), None),
    }
}

pub async fn handle_text(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };

    let res = state.registry.register(text).await;
    if let Err(e) = &res {
        tracing::info!(input = %text, kind = %e.kind(), error = %e, "registration rejected");
    }

    let (reply, keyboard) = registration_reply(&res);
    let mut req = bot.send_message(msg.chat.id, reply);
    if let Some(kb) = keyboard {
        req = req.reply_markup(kb);
    }
    req.await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ytb_core::domain::{SourceId, TrackedSource};

    fn labels(kb: &InlineKeyboardMarkup) -> Vec<String> {
        kb.inline_keyboard
            .iter()
            .flatten()
            .map(|b| b.text.clone())
            .collect()
    }

    fn registered(total: usize) -> Registered {
        Registered {
            source: TrackedSource::new(SourceId::new("UCa"), "Techno Gamerz", ""),
            total,
            limit: 3,
        }
    }

    #[test]
    fn keyboard_offers_add_more_only_below_limit() {
        let (text, kb) = registration_reply(&Ok(registered(1)));
        assert!(text.contains("✅ Added: Techno Gamerz"));
        assert!(text.contains("1/3"));
        assert_eq!(labels(&kb.unwrap()), vec!["📄 Add More", "✅ Done"]);

        let (_, kb) = registration_reply(&Ok(registered(3)));
        assert_eq!(labels(&kb.unwrap()), vec!["✅ Done"]);
    }

    #[test]
    fn rejections_have_no_keyboard() {
        let cases = [
            (Error::InvalidInput("x".into()), "Invalid link"),
            (Error::Duplicate("x".into()), "Already added"),
            (Error::LimitExceeded { limit: 3 }, "Max 3 channels"),
        ];
        for (err, expected) in cases {
            let (text, kb) = registration_reply(&Err(err));
            assert!(text.contains(expected), "{text}");
            assert!(kb.is_none());
        }
    }
}
