use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::{
    channel_ref::ChannelRef,
    domain::{ChannelInfo, FeedItem, SourceId},
    Result,
};

/// Read side of an upstream feed (public Atom feed, yt-dlp listing, ...).
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    /// Latest item of a source. An empty feed is [`crate::Error::NotFound`].
    async fn fetch_latest(&self, id: &SourceId) -> Result<FeedItem>;

    /// Resolve what the operator typed to a canonical source id and title.
    async fn describe(&self, channel: &ChannelRef) -> Result<ChannelInfo>;
}

/// Metadata and download capability for a feed item's media.
#[async_trait]
pub trait MediaResolver: Send + Sync {
    /// Size in bytes without downloading. `None` when upstream does not say.
    async fn probe_size(&self, item: &FeedItem) -> Result<Option<u64>>;

    /// Download the media into `dir` and return the artifact path.
    async fn download(&self, item: &FeedItem, dir: &Path) -> Result<PathBuf>;
}
