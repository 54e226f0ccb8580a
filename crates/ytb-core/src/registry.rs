//! Operator-facing registration of tracked channels.

use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    channel_ref::parse_channel_ref,
    config::Config,
    domain::TrackedSource,
    errors::Error,
    ports::FeedFetcher,
    store::SourceStore,
    utils::with_timeout,
    Result,
};

/// A successful registration and where it leaves the limit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Registered {
    pub source: TrackedSource,
    pub total: usize,
    pub limit: usize,
}

impl Registered {
    pub fn has_room(&self) -> bool {
        self.total < self.limit
    }
}

pub struct SourceRegistry {
    cfg: Arc<Config>,
    store: Arc<SourceStore>,
    fetcher: Arc<dyn FeedFetcher>,
}

impl SourceRegistry {
    pub fn new(cfg: Arc<Config>, store: Arc<SourceStore>, fetcher: Arc<dyn FeedFetcher>) -> Self {
        Self {
            cfg,
            store,
            fetcher,
        }
    }

    pub fn limit(&self) -> usize {
        self.cfg.max_sources
    }

    /// Track the channel the operator typed.
    ///
    /// Fails with `InvalidInput`, `Duplicate` or `LimitExceeded`. The display
    /// name is looked up best-effort and falls back to the raw identifier.
    pub async fn register(&self, raw: &str) -> Result<Registered> {
        let channel = parse_channel_ref(raw)?;
        let limit = self.limit();

        // Cheap checks first so a full store does not cost a network call.
        let current = self.store.load();
        if current.contains_key(&channel.source_id()) {
            return Err(Error::Duplicate(channel.to_string()));
        }
        if current.len() >= limit {
            return Err(Error::LimitExceeded { limit });
        }

        let described = with_timeout(
            "channel lookup",
            self.cfg.fetch_timeout,
            self.fetcher.describe(&channel),
        )
        .await;
        let (id, name) = match described {
            Ok(info) => {
                let name = info.title.unwrap_or_else(|| info.id.to_string());
                (info.id, name)
            }
            Err(e) => {
                warn!(channel = %channel, kind = %e.kind(), error = %e, "channel lookup failed, using raw identifier");
                let id = channel.source_id();
                (id.clone(), id.to_string())
            }
        };

        let url = raw.trim().to_string();
        let registered = self.store.update(|map| {
            if map.contains_key(&id) {
                return Err(Error::Duplicate(id.to_string()));
            }
            if map.len() >= limit {
                return Err(Error::LimitExceeded { limit });
            }
            let source = TrackedSource::new(id.clone(), name, url);
            map.insert(id.clone(), source.clone());
            Ok(Registered {
                source,
                total: map.len(),
                limit,
            })
        })?;

        info!(
            source = %registered.source.id,
            name = %registered.source.display_name,
            total = registered.total,
            "channel registered"
        );
        Ok(registered)
    }

    /// Tracked sources in id order.
    pub fn list(&self) -> Vec<TrackedSource> {
        self.store.load().into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{channel_ref::ChannelRef, domain::SourceId, testing::*};

    const ID_A: &str = "UCaaaaaaaaaaaaaaaaaaaaaa";
    const ID_B: &str = "UCbbbbbbbbbbbbbbbbbbbbbb";
    const ID_C: &str = "UCcccccccccccccccccccccc";
    const ID_D: &str = "UCdddddddddddddddddddddd";

    fn registry(prefix: &str) -> (SourceRegistry, Arc<FakeFetcher>, std::path::PathBuf) {
        let dir = unique_tmp_dir(prefix);
        let cfg = Arc::new(test_config(&dir));
        let store = Arc::new(SourceStore::new(&cfg.data_file));
        let fetcher = Arc::new(FakeFetcher::default());
        (SourceRegistry::new(cfg, store, fetcher.clone()), fetcher, dir)
    }

    #[tokio::test]
    async fn registers_with_resolved_name_and_id() {
        let (reg, fetcher, dir) = registry("reg-ok");
        fetcher.channel(
            ChannelRef::Handle("TechnoGamerz".into()),
            ID_A,
            Some("Techno Gamerz"),
        );

        let out = reg
            .register("https://www.youtube.com/@TechnoGamerz")
            .await
            .unwrap();
        assert_eq!(out.source.id, SourceId::new(ID_A));
        assert_eq!(out.source.display_name, "Techno Gamerz");
        assert_eq!(out.source.url, "https://www.youtube.com/@TechnoGamerz");
        assert_eq!(out.source.last_seen_item_id, None);
        assert_eq!((out.total, out.limit), (1, 3));
        assert!(out.has_room());
        assert_eq!(reg.list().len(), 1);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn falls_back_to_raw_identifier_when_lookup_fails() {
        let (reg, _fetcher, dir) = registry("reg-fallback");
        let out = reg.register(ID_A).await.unwrap();
        assert_eq!(out.source.id, SourceId::new(ID_A));
        assert_eq!(out.source.display_name, ID_A);

        let handle = reg.register("youtube.com/@someone").await.unwrap();
        assert_eq!(handle.source.id, SourceId::new("@someone"));
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn rejects_duplicates_even_via_another_url_shape() {
        let (reg, fetcher, dir) = registry("reg-dup");
        fetcher.channel(ChannelRef::Handle("abc".into()), ID_A, Some("Abc"));

        reg.register(ID_A).await.unwrap();
        let direct = reg.register(&format!("youtube.com/channel/{ID_A}")).await;
        assert!(matches!(direct, Err(Error::Duplicate(_))));
        let via_handle = reg.register("@abc").await;
        assert!(matches!(via_handle, Err(Error::Duplicate(_))));
        assert_eq!(reg.list().len(), 1);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn fourth_channel_hits_the_limit() {
        let (reg, _fetcher, dir) = registry("reg-limit");
        for id in [ID_A, ID_B, ID_C] {
            reg.register(id).await.unwrap();
        }
        let err = reg.register(ID_D).await.unwrap_err();
        assert!(matches!(err, Error::LimitExceeded { limit: 3 }));
        assert_eq!(reg.list().len(), 3);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn invalid_input_writes_nothing() {
        let (reg, _fetcher, dir) = registry("reg-invalid");
        let err = reg.register("https://example.com/@x").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(reg.list().is_empty());
        let _ = std::fs::remove_dir_all(dir);
    }
}
