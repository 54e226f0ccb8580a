//! Notification texts (plain text; Telegram is sent no parse mode).

use crate::{domain::FeedItem, utils::truncate_text};

/// Human readable byte count, binary units with two decimals.
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = "B";
    for u in UNITS {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = u;
    }
    format!("{value:.2} {unit}")
}

/// Caption attached to an uploaded video.
pub fn media_caption(display_name: &str, title: &str, title_chars: usize) -> String {
    format!("🎥 {display_name}\n{}", truncate_text(title, title_chars))
}

/// Text sent instead of the media. `size` is included when it is the reason.
pub fn link_fallback(display_name: &str, item: &FeedItem, size: Option<u64>) -> String {
    let mut out = format!("🎥 New video from {display_name}\n\n📝 {}\n", item.title);
    if let Some(size) = size {
        out.push_str(&format!("⚠️ File size: {} (too large)\n", human_size(size)));
    }
    out.push_str(&format!("\n🔗 Watch: {}", item.locator_url));
    out
}

/// Fit `text` into `max_chars`, sacrificing the middle (title) rather than the
/// trailing link when the message is too long.
pub fn fit_keeping_tail(text: &str, max_chars: usize, tail: &str) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let tail_len = tail.chars().count();
    if text.ends_with(tail) && tail_len + 4 <= max_chars {
        let head_len = text.chars().count() - tail_len;
        let head: String = text.chars().take(head_len).collect();
        let head = truncate_text(&head, max_chars - tail_len - 1);
        return format!("{head}\n{tail}");
    }
    truncate_text(text, max_chars)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn human_size_uses_binary_units() {
        assert_eq!(human_size(512), "512 B");
        assert_eq!(human_size(1536), "1.50 KiB");
        assert_eq!(human_size(3 * 1024 * 1024 * 1024), "3.00 GiB");
    }

    #[test]
    fn caption_truncates_title() {
        let title = "x".repeat(300);
        let caption = media_caption("Chan", &title, 100);
        assert!(caption.starts_with("🎥 Chan\n"));
        assert_eq!(caption.lines().nth(1).map(|l| l.chars().count()), Some(100));
    }

    #[test]
    fn link_fallback_mentions_size_and_url() {
        let item = FeedItem::new("v2", "Big one", "https://www.youtube.com/watch?v=v2");
        let text = link_fallback("Chan", &item, Some(3 * 1024 * 1024 * 1024));
        assert!(text.contains("Big one"));
        assert!(text.contains("3.00 GiB"));
        assert!(text.ends_with("🔗 Watch: https://www.youtube.com/watch?v=v2"));

        let plain = link_fallback("Chan", &item, None);
        assert!(!plain.contains("File size"));
    }

    #[test]
    fn fit_keeping_tail_preserves_link() {
        let item = FeedItem::new("v", "t".repeat(5000), "https://youtu.be/v");
        let text = link_fallback("Chan", &item, None);
        let tail = format!("🔗 Watch: {}", item.locator_url);
        let fitted = fit_keeping_tail(&text, 4096, &tail);
        assert!(fitted.chars().count() <= 4096);
        assert!(fitted.ends_with(&tail));
    }
}
