use std::{collections::BTreeMap, fmt};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Telegram chat id of the single operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OperatorId(pub i64);

/// Stable upstream identifier of a tracked channel (`UC…` id, or a handle when
/// it could not be resolved at registration time).
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(pub String);

impl SourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One persisted record. Field names match the JSON file the bot has always
/// written, so existing `yt_channels.json` files keep loading.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedSource {
    #[serde(skip)]
    pub id: SourceId,

    #[serde(rename = "name")]
    pub display_name: String,

    #[serde(default)]
    pub url: String,

    #[serde(rename = "last_video_id", default)]
    pub last_seen_item_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_at: Option<String>,

    #[serde(
        rename = "updated_at",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub last_updated_at: Option<String>,
}

impl TrackedSource {
    pub fn new(id: SourceId, display_name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            url: url.into(),
            last_seen_item_id: None,
            added_at: Some(crate::utils::iso_timestamp_utc()),
            last_updated_at: None,
        }
    }

    pub fn has_seen(&self, item_id: &str) -> bool {
        self.last_seen_item_id.as_deref() == Some(item_id)
    }
}

/// All tracked sources, ordered by id so every cycle visits them in the same order.
pub type SourceMap = BTreeMap<SourceId, TrackedSource>;

/// Latest item reported by a feed. Lives for a single polling cycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeedItem {
    pub item_id: String,
    pub title: String,
    pub published_at: Option<DateTime<Utc>>,
    /// Human-facing watch link.
    pub locator_url: String,
    /// What the resolver should fetch; usually the same as `locator_url`.
    pub media_url: String,
}

impl FeedItem {
    pub fn new(item_id: impl Into<String>, title: impl Into<String>, url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            item_id: item_id.into(),
            title: title.into(),
            published_at: None,
            locator_url: url.clone(),
            media_url: url,
        }
    }
}

/// Canonical identity of a channel resolved from user input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: SourceId,
    pub title: Option<String>,
}

/// Result of one delivery attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeliveryOutcome {
    MediaSent,
    LinkSent,
    Failed(String),
}

impl DeliveryOutcome {
    /// Whether the poller may record the item as seen.
    pub fn advances_state(&self) -> bool {
        !matches!(self, DeliveryOutcome::Failed(_))
    }
}
