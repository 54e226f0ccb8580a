//! Public YouTube feed adapter.
//!
//! Latest uploads come from `{base}/feeds/videos.xml?channel_id=UC…`, which
//! only accepts channel ids. Handles and legacy custom URLs are turned into a
//! channel id by reading the channel page.

pub mod page;
pub mod parse;

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use ytb_core::{
    channel_ref::{is_channel_id, ChannelRef},
    config::Config,
    domain::{ChannelInfo, FeedItem, SourceId},
    errors::Error,
    ports::FeedFetcher,
    Result,
};

use crate::{
    page::{extract_channel_id, extract_page_title},
    parse::{parse_feed, ParsedFeed},
};

const USER_AGENT: &str = concat!("ytb/", env!("CARGO_PKG_VERSION"));

#[derive(Clone, Debug)]
pub struct YoutubeFeedClient {
    base_url: String,
    http: reqwest::Client,
}

impl YoutubeFeedClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::Config(format!("http client: {e}")))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        Self::new(cfg.feed_base_url.clone(), cfg.fetch_timeout)
    }

    pub fn feed_url(&self, channel_id: &str) -> String {
        format!("{}/feeds/videos.xml?channel_id={channel_id}", self.base_url)
    }

    pub async fn fetch_feed(&self, channel_id: &str) -> Result<ParsedFeed> {
        let body = self.get(&self.feed_url(channel_id)).await?;
        parse_feed(&body, &self.base_url)
    }

    async fn get(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self
            .http
            .get(url)
            // Skips the cookie consent interstitial served in some regions.
            .header(reqwest::header::COOKIE, "CONSENT=YES+1")
            .send()
            .await
            .map_err(|e| Error::Network(format!("GET {url}: {e}")))?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::NotFound(format!("GET {url}: 404")));
        }
        if !status.is_success() {
            return Err(Error::Network(format!("GET {url}: {status}")));
        }
        let body = resp
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("GET {url}: {e}")))?;
        debug!(url, bytes = body.len(), "fetched");
        Ok(body.to_vec())
    }

    async fn channel_page(&self, channel: &ChannelRef) -> Result<String> {
        let body = self.get(&channel.channel_url(&self.base_url)).await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    /// Channel id for a stored source id (which may still be a handle).
    async fn resolve_channel_id(&self, id: &SourceId) -> Result<String> {
        if is_channel_id(id.as_str()) {
            return Ok(id.as_str().to_string());
        }
        let channel = ChannelRef::from_source_id(id)?;
        let html = self.channel_page(&channel).await?;
        extract_channel_id(&html)
            .ok_or_else(|| Error::NotFound(format!("no channel id on page for {channel}")))
    }
}

#[async_trait]
impl FeedFetcher for YoutubeFeedClient {
    async fn fetch_latest(&self, id: &SourceId) -> Result<FeedItem> {
        let channel_id = self.resolve_channel_id(id).await?;
        self.fetch_feed(&channel_id)
            .await?
            .latest()
            .ok_or_else(|| Error::NotFound(format!("feed for {id} has no entries")))
    }

    async fn describe(&self, channel: &ChannelRef) -> Result<ChannelInfo> {
        if let ChannelRef::ChannelId(id) = channel {
            let feed = self.fetch_feed(id).await?;
            return Ok(ChannelInfo {
                id: SourceId::new(id.clone()),
                title: feed.title,
            });
        }

        let html = self.channel_page(channel).await?;
        let id = extract_channel_id(&html)
            .ok_or_else(|| Error::NotFound(format!("no channel id on page for {channel}")))?;
        let title = match extract_page_title(&html) {
            Some(t) => Some(t),
            None => self.fetch_feed(&id).await.ok().and_then(|f| f.title),
        };
        Ok(ChannelInfo {
            id: SourceId::new(id),
            title,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> YoutubeFeedClient {
        YoutubeFeedClient::new("https://www.youtube.com/", Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn feed_url_uses_channel_id_query() {
        assert_eq!(
            client().feed_url("UCaaaaaaaaaaaaaaaaaaaaaa"),
            "https://www.youtube.com/feeds/videos.xml?channel_id=UCaaaaaaaaaaaaaaaaaaaaaa"
        );
    }

    #[tokio::test]
    async fn unparseable_source_id_fails_before_any_request() {
        let err = client()
            .fetch_latest(&SourceId::new("not a source"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
