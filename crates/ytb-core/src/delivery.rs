//! Turn a new feed item into exactly one notification: the media itself when it
//! fits the transport, otherwise a text message with the watch link.

use std::{path::Path, sync::Arc};

use tracing::{debug, info, warn};

use crate::{
    config::Config,
    domain::{DeliveryOutcome, FeedItem},
    formatting::{fit_keeping_tail, link_fallback, media_caption},
    messaging::port::NotificationSink,
    ports::MediaResolver,
    utils::{truncate_text, with_timeout, ScratchDir},
    Error, Result,
};

pub struct DeliveryPipeline {
    cfg: Arc<Config>,
    resolver: Arc<dyn MediaResolver>,
    sink: Arc<dyn NotificationSink>,
}

impl DeliveryPipeline {
    pub fn new(
        cfg: Arc<Config>,
        resolver: Arc<dyn MediaResolver>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            cfg,
            resolver,
            sink,
        }
    }

    /// Deliver `item` to the operator.
    ///
    /// Whatever happens, the item's scratch directory (and any artifact or
    /// partial download in it) is gone when this returns.
    pub async fn deliver(&self, item: &FeedItem, display_name: &str) -> DeliveryOutcome {
        let scratch = ScratchDir::new(&self.cfg.download_dir, &item.item_id);
        self.deliver_in(item, display_name, scratch.path()).await
    }

    async fn deliver_in(&self, item: &FeedItem, display_name: &str, scratch: &Path) -> DeliveryOutcome {
        let limit = self.cfg.max_media_bytes;

        let probed = with_timeout(
            "size probe",
            self.cfg.probe_timeout,
            self.resolver.probe_size(item),
        )
        .await;
        match probed {
            Ok(Some(size)) => {
                if let Err(e) = check_size(size, limit) {
                    info!(item = %item.item_id, kind = %e.kind(), error = %e, "too large to upload, sending link");
                    return self.send_link(item, display_name, Some(size)).await;
                }
                debug!(item = %item.item_id, size, "size probed");
            }
            Ok(None) => debug!(item = %item.item_id, "size unknown"),
            Err(e) => {
                warn!(item = %item.item_id, kind = %e.kind(), error = %e, "size probe failed, downloading anyway");
            }
        }

        if let Err(e) = tokio::fs::create_dir_all(scratch).await {
            return DeliveryOutcome::Failed(format!("scratch dir: {e}"));
        }
        let downloaded = with_timeout(
            "download",
            self.cfg.download_timeout,
            self.resolver.download(item, scratch),
        )
        .await;
        let artifact = match downloaded {
            Ok(path) => path,
            Err(e) => {
                warn!(item = %item.item_id, kind = %e.kind(), error = %e, "download failed");
                return DeliveryOutcome::Failed(format!("download: {e}"));
            }
        };

        let size = match tokio::fs::metadata(&artifact).await {
            Ok(md) => md.len(),
            Err(e) => return DeliveryOutcome::Failed(format!("artifact missing: {e}")),
        };
        if let Err(e) = check_size(size, limit) {
            info!(item = %item.item_id, kind = %e.kind(), error = %e, "downloaded file too large, sending link");
            discard(&artifact).await;
            return self.send_link(item, display_name, Some(size)).await;
        }

        let caption = truncate_text(
            &media_caption(display_name, &item.title, self.cfg.caption_title_chars),
            self.sink.capabilities().max_caption_len,
        );
        let sent = with_timeout(
            "media upload",
            self.cfg.upload_timeout,
            self.sink
                .send_media(self.cfg.operator_id, &artifact, &caption),
        )
        .await;
        discard(&artifact).await;

        match sent {
            Ok(()) => {
                info!(item = %item.item_id, size, "media sent");
                DeliveryOutcome::MediaSent
            }
            Err(e) => {
                warn!(item = %item.item_id, kind = %e.kind(), error = %e, "media upload failed, sending link");
                self.send_link(item, display_name, None).await
            }
        }
    }

    async fn send_link(&self, item: &FeedItem, display_name: &str, size: Option<u64>) -> DeliveryOutcome {
        let tail = format!("🔗 Watch: {}", item.locator_url);
        let text = fit_keeping_tail(
            &link_fallback(display_name, item, size),
            self.sink.capabilities().max_text_len,
            &tail,
        );
        let sent = with_timeout(
            "text send",
            self.cfg.send_timeout,
            self.sink.send_text(self.cfg.operator_id, &text),
        )
        .await;
        match sent {
            Ok(()) => DeliveryOutcome::LinkSent,
            Err(e) => {
                warn!(item = %item.item_id, kind = %e.kind(), error = %e, "link fallback failed");
                DeliveryOutcome::Failed(format!("send: {e}"))
            }
        }
    }
}

fn check_size(size: u64, limit: u64) -> Result<()> {
    if size > limit {
        return Err(Error::Oversize { size, limit });
    }
    Ok(())
}

async fn discard(artifact: &Path) {
    if let Err(e) = tokio::fs::remove_file(artifact).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %artifact.display(), error = %e, "failed to remove artifact");
        }
    }
}
