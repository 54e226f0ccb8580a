//! `yt-dlp` adapter: media size probe and download, plus an alternative
//! channel listing backend.
//!
//! Every invocation is a child process with `kill_on_drop(true)`, so when the
//! core's timeout drops the future the process goes with it.

use std::{
    collections::VecDeque,
    path::{Path, PathBuf},
    process::Stdio,
    sync::Arc,
};

use async_trait::async_trait;
use chrono::DateTime;
use serde::Deserialize;
use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, BufReader},
    process::Command,
    sync::Mutex,
};
use tracing::debug;
use ytb_core::{
    channel_ref::ChannelRef,
    config::Config,
    domain::{ChannelInfo, FeedItem, SourceId},
    errors::Error,
    ports::{FeedFetcher, MediaResolver},
    Result,
};

const STDERR_TAIL_MAX_BYTES: usize = 16 * 1024;
const STDERR_TAIL_MAX_LINES: usize = 200;
const SOCKET_TIMEOUT_SECS: &str = "30";

#[derive(Clone, Debug)]
pub struct YtDlpClient {
    program: PathBuf,
    format: String,
    base_url: String,
}

#[derive(Clone, Debug, Default)]
struct StderrTail {
    lines: VecDeque<String>,
    bytes: usize,
}

impl StderrTail {
    fn push_line(&mut self, line: String) {
        self.bytes = self.bytes.saturating_add(line.len() + 1);
        self.lines.push_back(line);

        while self.lines.len() > STDERR_TAIL_MAX_LINES || self.bytes > STDERR_TAIL_MAX_BYTES {
            if let Some(front) = self.lines.pop_front() {
                self.bytes = self.bytes.saturating_sub(front.len() + 1);
            } else {
                break;
            }
        }
    }

    fn snapshot(&self) -> String {
        self.lines.iter().cloned().collect::<Vec<_>>().join("\n")
    }
}

impl YtDlpClient {
    pub fn new(
        program: impl Into<PathBuf>,
        format: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            program: program.into(),
            format: format.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(
            cfg.ytdlp_path.clone(),
            cfg.ytdlp_format.clone(),
            cfg.feed_base_url.clone(),
        )
    }

    fn probe_args(&self, url: &str) -> Vec<String> {
        let mut args = common_args();
        args.extend(
            [
                "-J",
                "--skip-download",
                "--no-playlist",
                "-f",
                self.format.as_str(),
                url,
            ]
            .map(String::from),
        );
        args
    }

    fn download_args(&self, url: &str, dir: &Path) -> Vec<String> {
        let template = dir.join("%(id)s.%(ext)s").to_string_lossy().into_owned();
        let mut args = common_args();
        args.extend(
            [
                "--no-playlist",
                "--no-progress",
                "--no-part",
                "-f",
                self.format.as_str(),
                "-o",
                template.as_str(),
                "--print",
                "after_move:filepath",
                url,
            ]
            .map(String::from),
        );
        args
    }

    fn listing_args(&self, channel_url: &str) -> Vec<String> {
        let mut args = common_args();
        args.extend(
            ["--flat-playlist", "--playlist-items", "1", "-J", channel_url].map(String::from),
        );
        args
    }

    fn uploads_url(&self, channel: &ChannelRef) -> String {
        format!("{}/videos", channel.channel_url(&self.base_url))
    }

    /// Run yt-dlp to completion and return its stdout.
    async fn run(&self, args: &[String]) -> Result<String> {
        debug!(program = %self.program.display(), ?args, "running yt-dlp");
        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::Config(format!("yt-dlp not found at {}", self.program.display()))
            } else {
                Error::Io(e)
            }
        })?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::External("yt-dlp stdout was not captured".to_string()))?;
        let stderr_tail = Arc::new(Mutex::new(StderrTail::default()));

        // Drain stderr in background to avoid blocking on a full pipe.
        let drain = child.stderr.take().map(|stderr| {
            let tail = stderr_tail.clone();
            tokio::spawn(async move {
                let mut r = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = r.next_line().await {
                    tail.lock().await.push_line(line);
                }
            })
        });

        let mut out = String::new();
        stdout.read_to_string(&mut out).await?;
        let status = child.wait().await?;
        if let Some(drain) = drain {
            let _ = drain.await;
        }

        if !status.success() {
            let stderr = stderr_tail.lock().await.snapshot();
            return Err(classify_failure(&status.to_string(), &stderr));
        }
        Ok(out)
    }

    async fn listing(&self, channel: &ChannelRef) -> Result<Listing> {
        let out = self.run(&self.listing_args(&self.uploads_url(channel))).await?;
        parse_listing(&out)
    }
}

fn common_args() -> Vec<String> {
    ["--no-warnings", "--ignore-config", "--socket-timeout", SOCKET_TIMEOUT_SECS]
        .map(String::from)
        .to_vec()
}

#[async_trait]
impl MediaResolver for YtDlpClient {
    async fn probe_size(&self, item: &FeedItem) -> Result<Option<u64>> {
        let out = self.run(&self.probe_args(&item.media_url)).await?;
        parse_probe_size(&out)
    }

    async fn download(&self, item: &FeedItem, dir: &Path) -> Result<PathBuf> {
        let out = self.run(&self.download_args(&item.media_url, dir)).await?;
        if let Some(path) = parse_printed_path(&out).filter(|p| p.is_file()) {
            return Ok(path);
        }
        // Older yt-dlp builds print nothing for after_move.
        find_artifact(dir)
            .await?
            .ok_or_else(|| Error::External(format!("yt-dlp produced no file for {}", item.item_id)))
    }
}

#[async_trait]
impl FeedFetcher for YtDlpClient {
    async fn fetch_latest(&self, id: &SourceId) -> Result<FeedItem> {
        let channel = ChannelRef::from_source_id(id)?;
        self.listing(&channel)
            .await?
            .latest(&self.base_url)
            .ok_or_else(|| Error::NotFound(format!("no uploads listed for {id}")))
    }

    async fn describe(&self, channel: &ChannelRef) -> Result<ChannelInfo> {
        let listing = self.listing(channel).await?;
        let id = listing
            .channel_id
            .clone()
            .filter(|id| ytb_core::channel_ref::is_channel_id(id))
            .map(SourceId::new)
            .unwrap_or_else(|| channel.source_id());
        Ok(ChannelInfo {
            id,
            title: listing.channel_title(),
        })
    }
}

// ============== Output Parsing ==============

/// Size from `-J` output: exact size, else the estimate, else the sum of the
/// merged formats when every part reports one.
pub fn parse_probe_size(json: &str) -> Result<Option<u64>> {
    let v: serde_json::Value =
        serde_json::from_str(json).map_err(|e| Error::Malformed(format!("yt-dlp json: {e}")))?;
    if let Some(size) = format_size(&v) {
        return Ok(Some(size));
    }
    let parts = v
        .get("requested_formats")
        .and_then(|f| f.as_array())
        .map(|formats| formats.iter().map(format_size).collect::<Option<Vec<u64>>>());
    Ok(match parts {
        Some(Some(sizes)) if !sizes.is_empty() => Some(sizes.iter().sum()),
        _ => None,
    })
}

fn format_size(v: &serde_json::Value) -> Option<u64> {
    let num = |key: &str| {
        v.get(key).and_then(|n| {
            n.as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
        })
    };
    num("filesize").or_else(|| num("filesize_approx"))
}

/// Last non-empty stdout line, as printed by `--print after_move:filepath`.
pub fn parse_printed_path(stdout: &str) -> Option<PathBuf> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .last()
        .map(PathBuf::from)
}

async fn find_artifact(dir: &Path) -> Result<Option<PathBuf>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::Io(e)),
    };
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let partial = path
            .extension()
            .is_some_and(|ext| ext == "part" || ext == "ytdl");
        if !partial && entry.file_type().await?.is_file() {
            return Ok(Some(path));
        }
    }
    Ok(None)
}

#[derive(Debug, Default, Deserialize)]
pub struct Listing {
    pub id: Option<String>,
    pub channel_id: Option<String>,
    pub channel: Option<String>,
    pub uploader: Option<String>,
    pub title: Option<String>,
    #[serde(default)]
    pub entries: Vec<ListingEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ListingEntry {
    pub id: String,
    pub title: Option<String>,
    pub url: Option<String>,
    pub timestamp: Option<i64>,
}

impl Listing {
    pub fn latest(self, base_url: &str) -> Option<FeedItem> {
        let entry = self.entries.into_iter().next()?;
        let watch = format!("{}/watch?v={}", base_url.trim_end_matches('/'), entry.id);
        Some(FeedItem {
            title: entry.title.unwrap_or_else(|| entry.id.clone()),
            published_at: entry.timestamp.and_then(|ts| DateTime::from_timestamp(ts, 0)),
            locator_url: entry
                .url
                .filter(|u| u.starts_with("http"))
                .unwrap_or_else(|| watch.clone()),
            media_url: watch,
            item_id: entry.id,
        })
    }

    pub fn channel_title(&self) -> Option<String> {
        self.channel
            .clone()
            .or_else(|| self.uploader.clone())
            .or_else(|| {
                self.title
                    .as_deref()
                    .map(|t| t.trim_end_matches(" - Videos").to_string())
            })
            .filter(|t| !t.trim().is_empty())
    }
}

pub fn parse_listing(json: &str) -> Result<Listing> {
    serde_json::from_str(json).map_err(|e| Error::Malformed(format!("yt-dlp listing: {e}")))
}

/// Map a failed run to the error taxonomy from its stderr.
///
/// Content that is gone or restricted is `NotFound`; anything else is treated
/// as a network problem and retried on the next cycle.
pub fn classify_failure(status: &str, stderr: &str) -> Error {
    let detail = stderr
        .lines()
        .rev()
        .find(|l| l.starts_with("ERROR:"))
        .or_else(|| stderr.lines().rev().find(|l| !l.trim().is_empty()))
        .unwrap_or("")
        .trim()
        .to_string();
    let msg = format!("yt-dlp exited with {status}: {detail}");

    let lower = stderr.to_lowercase();
    let gone = [
        "video unavailable",
        "private video",
        "has been removed",
        "does not exist",
        "members-only",
        "join this channel",
        "this live event will begin",
        "premieres in",
        "http error 404",
    ];
    if gone.iter().any(|needle| lower.contains(needle)) {
        Error::NotFound(msg)
    } else {
        Error::Network(msg)
    }
}
