use std::path::Path;

use async_trait::async_trait;

use crate::{domain::OperatorId, messaging::types::SinkCapabilities, Result};

/// Where notifications end up.
///
/// Implementations send exactly what they are given; callers truncate to
/// [`SinkCapabilities`] first.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    fn capabilities(&self) -> SinkCapabilities;

    /// Upload a local media file with a caption.
    async fn send_media(&self, operator: OperatorId, artifact: &Path, caption: &str) -> Result<()>;

    /// Send a plain text message.
    async fn send_text(&self, operator: OperatorId, text: &str) -> Result<()>;
}
