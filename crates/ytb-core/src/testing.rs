//! In-crate fakes for the ports. Calls are recorded behind `Mutex`es so tests
//! can assert on exactly what the core asked for.

use std::{
    collections::{HashMap, VecDeque},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    channel_ref::ChannelRef,
    config::Config,
    domain::{ChannelInfo, FeedItem, OperatorId, SourceId},
    messaging::{port::NotificationSink, types::SinkCapabilities},
    ports::{FeedFetcher, MediaResolver},
    Error, Result,
};

pub fn unique_tmp_dir(prefix: &str) -> PathBuf {
    let ts = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let pid = std::process::id();
    std::env::temp_dir().join(format!("ytb-{prefix}-{pid}-{ts}"))
}

/// Config rooted in `dir` with short timeouts.
pub fn test_config(dir: &Path) -> Config {
    let mut cfg = Config::with_defaults("123:abc", OperatorId(42));
    cfg.data_file = dir.join("state.json");
    cfg.download_dir = dir.join("downloads");
    cfg.poll_interval = Duration::from_secs(3600);
    cfg.fetch_timeout = Duration::from_millis(200);
    cfg.probe_timeout = Duration::from_millis(200);
    cfg.download_timeout = Duration::from_millis(500);
    cfg.send_timeout = Duration::from_millis(200);
    cfg.upload_timeout = Duration::from_millis(500);
    cfg
}

pub fn item(id: &str) -> FeedItem {
    FeedItem::new(
        id,
        format!("title {id}"),
        format!("https://www.youtube.com/watch?v={id}"),
    )
}

// ============== Feed ==============

#[derive(Clone, Debug)]
pub enum FetchStep {
    Latest(String),
    NotFound,
    Network,
    Hang,
}

/// Scripted feed. Each source replays its steps in order; the last step repeats.
#[derive(Default)]
pub struct FakeFetcher {
    scripts: Mutex<HashMap<SourceId, VecDeque<FetchStep>>>,
    channels: Mutex<HashMap<String, ChannelInfo>>,
    pub fetched: Mutex<Vec<SourceId>>,
}

impl FakeFetcher {
    pub fn script(&self, id: &str, steps: impl IntoIterator<Item = FetchStep>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(SourceId::new(id), steps.into_iter().collect());
    }

    pub fn channel(&self, input: ChannelRef, id: &str, title: Option<&str>) {
        self.channels.lock().unwrap().insert(
            input.source_id().0,
            ChannelInfo {
                id: SourceId::new(id),
                title: title.map(str::to_string),
            },
        );
    }

    pub fn fetch_count(&self, id: &str) -> usize {
        self.fetched
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.as_str() == id)
            .count()
    }

    fn next_step(&self, id: &SourceId) -> FetchStep {
        let mut scripts = self.scripts.lock().unwrap();
        let Some(steps) = scripts.get_mut(id) else {
            return FetchStep::NotFound;
        };
        if steps.len() > 1 {
            steps.pop_front().unwrap_or(FetchStep::NotFound)
        } else {
            steps.front().cloned().unwrap_or(FetchStep::NotFound)
        }
    }
}

#[async_trait]
impl FeedFetcher for FakeFetcher {
    async fn fetch_latest(&self, id: &SourceId) -> Result<FeedItem> {
        self.fetched.lock().unwrap().push(id.clone());
        match self.next_step(id) {
            FetchStep::Latest(v) => Ok(item(&v)),
            FetchStep::NotFound => Err(Error::NotFound(format!("no items for {id}"))),
            FetchStep::Network => Err(Error::Network("connection reset".into())),
            FetchStep::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(Error::Network("unreachable".into()))
            }
        }
    }

    async fn describe(&self, channel: &ChannelRef) -> Result<ChannelInfo> {
        self.channels
            .lock()
            .unwrap()
            .get(channel.source_id().as_str())
            .cloned()
            .ok_or_else(|| Error::Network("channel page unavailable".into()))
    }
}

// ============== Resolver ==============

#[derive(Clone, Copy, Debug)]
pub enum ProbeStep {
    Size(u64),
    Unknown,
    Fail,
    Hang,
}

#[derive(Clone, Copy, Debug)]
pub enum DownloadStep {
    /// Write a file with this many bytes.
    Bytes(usize),
    Fail,
    /// Write a partial file, then never finish.
    Hang,
}

pub struct FakeResolver {
    probe: ProbeStep,
    download: DownloadStep,
    pub probes: Mutex<Vec<String>>,
    pub downloads: Mutex<Vec<PathBuf>>,
}

impl FakeResolver {
    pub fn new(probe: ProbeStep, download: DownloadStep) -> Self {
        Self {
            probe,
            download,
            probes: Mutex::new(Vec::new()),
            downloads: Mutex::new(Vec::new()),
        }
    }

    pub fn download_count(&self) -> usize {
        self.downloads.lock().unwrap().len()
    }
}

#[async_trait]
impl MediaResolver for FakeResolver {
    async fn probe_size(&self, item: &FeedItem) -> Result<Option<u64>> {
        self.probes.lock().unwrap().push(item.item_id.clone());
        match self.probe {
            ProbeStep::Size(n) => Ok(Some(n)),
            ProbeStep::Unknown => Ok(None),
            ProbeStep::Fail => Err(Error::Network("probe failed".into())),
            ProbeStep::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(None)
            }
        }
    }

    async fn download(&self, item: &FeedItem, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(format!("{}.mp4", item.item_id));
        self.downloads.lock().unwrap().push(path.clone());
        match self.download {
            DownloadStep::Bytes(n) => {
                std::fs::create_dir_all(dir)?;
                std::fs::write(&path, vec![0u8; n])?;
                Ok(path)
            }
            DownloadStep::Fail => {
                // Leave a partial file behind like a killed download would.
                std::fs::create_dir_all(dir)?;
                std::fs::write(dir.join(format!("{}.part", item.item_id)), b"x")?;
                Err(Error::Network("download failed".into()))
            }
            DownloadStep::Hang => {
                std::fs::create_dir_all(dir)?;
                std::fs::write(dir.join(format!("{}.mp4.part", item.item_id)), b"x")?;
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(path)
            }
        }
    }
}

// ============== Sink ==============

#[derive(Default)]
pub struct RecordingSink {
    pub texts: Mutex<Vec<String>>,
    /// (artifact, caption, artifact existed at send time)
    pub media: Mutex<Vec<(PathBuf, String, bool)>>,
    pub fail_media: AtomicBool,
    pub fail_text: AtomicBool,
    pub hang_media: AtomicBool,
    pub hang_text: AtomicBool,
}

impl RecordingSink {
    pub fn failing_media() -> Self {
        let sink = Self::default();
        sink.fail_media.store(true, Ordering::SeqCst);
        sink
    }

    pub fn text_count(&self) -> usize {
        self.texts.lock().unwrap().len()
    }

    pub fn media_count(&self) -> usize {
        self.media.lock().unwrap().len()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    fn capabilities(&self) -> SinkCapabilities {
        SinkCapabilities::TELEGRAM
    }

    async fn send_media(&self, _operator: OperatorId, artifact: &Path, caption: &str) -> Result<()> {
        self.media.lock().unwrap().push((
            artifact.to_path_buf(),
            caption.to_string(),
            artifact.exists(),
        ));
        if self.hang_media.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.fail_media.load(Ordering::SeqCst) {
            return Err(Error::Network("upload rejected".into()));
        }
        Ok(())
    }

    async fn send_text(&self, _operator: OperatorId, text: &str) -> Result<()> {
        self.texts.lock().unwrap().push(text.to_string());
        if self.hang_text.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.fail_text.load(Ordering::SeqCst) {
            return Err(Error::Network("send rejected".into()));
        }
        Ok(())
    }
}
