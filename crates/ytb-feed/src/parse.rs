//! Pure feed parsing: Atom (what YouTube serves) with RSS 2.0 as fallback.

use chrono::{DateTime, Utc};
use ytb_core::{domain::FeedItem, errors::Error, Result};

const VIDEO_ID_PREFIX: &str = "yt:video:";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedFeed {
    pub title: Option<String>,
    /// In feed order (newest first on YouTube).
    pub items: Vec<FeedItem>,
}

impl ParsedFeed {
    pub fn latest(self) -> Option<FeedItem> {
        self.items.into_iter().next()
    }
}

pub fn watch_url(base: &str, video_id: &str) -> String {
    format!("{}/watch?v={video_id}", base.trim_end_matches('/'))
}

/// Parse a feed document. Neither Atom nor RSS → [`Error::Malformed`].
pub fn parse_feed(body: &[u8], base: &str) -> Result<ParsedFeed> {
    match atom_syndication::Feed::read_from(body) {
        Ok(feed) => Ok(from_atom(&feed, base)),
        Err(atom_err) => match rss::Channel::read_from(body) {
            Ok(channel) => Ok(from_rss(&channel, base)),
            Err(rss_err) => Err(Error::Malformed(format!(
                "not an Atom feed ({atom_err}) nor RSS ({rss_err})"
            ))),
        },
    }
}

fn from_atom(feed: &atom_syndication::Feed, base: &str) -> ParsedFeed {
    let title = non_empty(&feed.title().value);
    let items = feed
        .entries()
        .iter()
        .filter_map(|entry| {
            let id = entry
                .extensions()
                .get("yt")
                .and_then(|yt| yt.get("videoId"))
                .and_then(|values| values.first())
                .and_then(|ext| ext.value())
                .and_then(non_empty)
                .or_else(|| non_empty(strip_video_prefix(entry.id())))?;

            let link = entry
                .links()
                .iter()
                .find(|l| l.rel() == "alternate")
                .or_else(|| entry.links().first())
                .map(|l| l.href().to_string())
                .filter(|href| !href.is_empty());
            let watch = watch_url(base, &id);
            let published = entry
                .published()
                .map(|dt| dt.with_timezone(&Utc))
                .or_else(|| Some(entry.updated().with_timezone(&Utc)));

            Some(FeedItem {
                title: entry.title().value.trim().to_string(),
                published_at: published,
                locator_url: link.unwrap_or_else(|| watch.clone()),
                media_url: watch,
                item_id: id,
            })
        })
        .collect();
    ParsedFeed { title, items }
}

fn from_rss(channel: &rss::Channel, base: &str) -> ParsedFeed {
    let title = non_empty(channel.title());
    let items = channel
        .items()
        .iter()
        .filter_map(|item| {
            let id = item
                .extensions()
                .get("yt")
                .and_then(|yt| yt.get("videoId"))
                .and_then(|values| values.first())
                .and_then(|ext| ext.value())
                .and_then(non_empty)
                .or_else(|| item.guid().and_then(|g| non_empty(strip_video_prefix(g.value()))))
                .or_else(|| item.link().and_then(video_id_from_link))?;

            let watch = watch_url(base, &id);
            let published = item
                .pub_date()
                .and_then(|d| DateTime::parse_from_rfc2822(d).ok())
                .map(|dt| dt.with_timezone(&Utc));

            Some(FeedItem {
                title: item.title().unwrap_or("(untitled)").trim().to_string(),
                published_at: published,
                locator_url: item.link().map(String::from).unwrap_or_else(|| watch.clone()),
                media_url: watch,
                item_id: id,
            })
        })
        .collect();
    ParsedFeed { title, items }
}

fn strip_video_prefix(id: &str) -> &str {
    id.strip_prefix(VIDEO_ID_PREFIX).unwrap_or(id)
}

/// `v` query parameter of a watch link, or the last path segment of a
/// `youtu.be` / `/shorts/` link.
fn video_id_from_link(link: &str) -> Option<String> {
    let url = url::Url::parse(link).ok()?;
    if let Some((_, v)) = url.query_pairs().find(|(k, _)| k == "v") {
        return non_empty(&v);
    }
    url.path_segments()?
        .filter(|s| !s.is_empty())
        .last()
        .and_then(non_empty)
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}
