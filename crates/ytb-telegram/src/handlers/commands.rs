use std::{sync::Arc, time::Duration};

use teloxide::prelude::*;

use ytb_core::{domain::TrackedSource, poller::CycleReport};

use crate::router::AppState;

pub(super) fn parse_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

/// `6 hours`, `30 minutes`, `45 seconds`.
pub(super) fn describe_interval(d: Duration) -> String {
    let secs = d.as_secs();
    let (n, unit) = if secs >= 3600 && secs % 3600 == 0 {
        (secs / 3600, "hour")
    } else if secs >= 60 && secs % 60 == 0 {
        (secs / 60, "minute")
    } else {
        (secs, "second")
    };
    if n == 1 {
        format!("1 {unit}")
    } else {
        format!("{n} {unit}s")
    }
}

fn start_text(sources: &[TrackedSource], limit: usize, interval: Duration) -> String {
    if sources.is_empty() {
        return format!(
            "👋 YouTube video notifier\n\n\
Send me a YouTube channel link to start tracking it.\n\
Example: youtube.com/@channelname\n\n\
Up to {limit} channels. New videos are checked every {}.",
            describe_interval(interval)
        );
    }

    let mut out = format!("📺 Tracking {}/{limit} channels:\n\n", sources.len());
    for s in sources {
        out.push_str(&format!("✅ {}\n", s.display_name));
    }
    out.push_str(&format!(
        "\n🎥 Videos are checked every {}.",
        describe_interval(interval)
    ));
    if sources.len() < limit {
        out.push_str("\nSend another link to add more.");
    }
    out
}

fn help_text(limit: usize) -> String {
    format!(
        "📋 Commands:\n\
/start - Show tracked channels\n\
/list - Channels with last seen video\n\
/check - Check for new videos now\n\
/help - Show this message\n\n\
💡 Send a channel link (youtube.com/@name, /channel/UC…, /c/name) to track it. Max {limit} channels."
    )
}

fn list_text(sources: &[TrackedSource], limit: usize) -> String {
    if sources.is_empty() {
        return "No channels tracked yet. Send a channel link to add one.".to_string();
    }
    let mut out = format!("📺 Channels ({}/{limit}):\n", sources.len());
    for s in sources {
        out.push_str(&format!("\n✅ {} ({})\n", s.display_name, s.id));
        match &s.last_seen_item_id {
            Some(id) => out.push_str(&format!("   last video: {id}\n")),
            None => out.push_str("   last video: not checked yet\n"),
        }
        if let Some(at) = &s.last_updated_at {
            out.push_str(&format!("   updated: {at}\n"));
        }
    }
    out
}

fn check_text(last: Option<&CycleReport>) -> String {
    let mut out = "🔄 Checking for new videos now...".to_string();
    if let Some(r) = last {
        out.push_str(&format!(
            "\n\nPrevious check ({}): {} notified ({} as link only), {} failed, {} skipped.",
            r.finished_at,
            r.notified(),
            r.link_fallbacks,
            r.failed,
            r.skipped
        ));
    }
    out
}

pub async fn handle_command(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let (cmd, _arg) = parse_command(text);
    let limit = state.registry.limit();

    let reply = match cmd.as_str() {
        "start" => start_text(&state.registry.list(), limit, state.cfg.poll_interval),
        "help" => help_text(limit),
        "list" => list_text(&state.registry.list(), limit),
        "check" => {
            let last = state.poller.last_report().await;
            state.poller.trigger();
            tracing::info!("manual check requested");
            check_text(last.as_ref())
        }
        _ => format!("Unknown command: /{cmd}\n\n{}", help_text(limit)),
    };

    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ytb_core::domain::SourceId;

    fn source(id: &str, name: &str, last: Option<&str>) -> TrackedSource {
        let mut s = TrackedSource::new(SourceId::new(id), name, "");
        s.last_seen_item_id = last.map(str::to_string);
        s
    }

    #[test]
    fn parse_command_strips_bot_name_and_args() {
        assert_eq!(parse_command("/check"), ("check".into(), "".into()));
        assert_eq!(
            parse_command("/List@my_bot  extra words "),
            ("list".into(), "extra words".into())
        );
    }

    #[test]
    fn describe_interval_picks_largest_whole_unit() {
        assert_eq!(describe_interval(Duration::from_secs(6 * 3600)), "6 hours");
        assert_eq!(describe_interval(Duration::from_secs(3600)), "1 hour");
        assert_eq!(describe_interval(Duration::from_secs(90 * 60)), "90 minutes");
        assert_eq!(describe_interval(Duration::from_secs(45)), "45 seconds");
    }

    #[test]
    fn start_text_lists_channels_or_explains() {
        let empty = start_text(&[], 3, Duration::from_secs(6 * 3600));
        assert!(empty.contains("youtube.com/@channelname"));
        assert!(empty.contains("every 6 hours"));

        let one = start_text(
            &[source("UCa", "Techno Gamerz", None)],
            3,
            Duration::from_secs(6 * 3600),
        );
        assert!(one.contains("1/3"));
        assert!(one.contains("✅ Techno Gamerz"));
        assert!(one.contains("add more"));
    }

    #[test]
    fn list_text_shows_last_seen() {
        let text = list_text(
            &[
                source("UCa", "A", Some("v1")),
                source("UCb", "B", None),
            ],
            3,
        );
        assert!(text.contains("last video: v1"));
        assert!(text.contains("not checked yet"));
    }

    #[test]
    fn check_text_includes_previous_report() {
        let report = CycleReport {
            finished_at: "2026-01-01T00:00:00+00:00".into(),
            delivered: 2,
            link_fallbacks: 1,
            failed: 1,
            ..CycleReport::default()
        };
        let text = check_text(Some(&report));
        assert!(text.contains("3 notified (1 as link only)"));
        assert!(text.contains("1 failed"));
        assert!(!check_text(None).contains("Previous"));
    }
}
