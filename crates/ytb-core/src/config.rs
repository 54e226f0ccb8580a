use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{domain::OperatorId, errors::Error, Result};

/// When a tracked source is allowed to be recorded without a notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrimingMode {
    /// Prime a source only while it has never been checked (`last_video_id` is null).
    PerSource,
    /// Prime every source during the first cycle after each process start.
    PerProcess,
}

impl PrimingMode {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "source" | "per_source" | "per-source" => Some(PrimingMode::PerSource),
            "process" | "per_process" | "per-process" => Some(PrimingMode::PerProcess),
            _ => None,
        }
    }
}

/// Where the latest item of a channel comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeedBackend {
    /// Public Atom feed over HTTP.
    Rss,
    /// `yt-dlp` flat listing of the channel's uploads.
    YtDlp,
}

impl FeedBackend {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "rss" | "atom" | "feed" => Some(FeedBackend::Rss),
            "ytdlp" | "yt-dlp" => Some(FeedBackend::YtDlp),
            _ => None,
        }
    }
}

pub const DEFAULT_MAX_MEDIA_BYTES: u64 = 2 * 1024 * 1024 * 1024;

/// Typed configuration, built once at startup and shared as `Arc<Config>`.
#[derive(Clone, Debug)]
pub struct Config {
    // Telegram
    pub telegram_bot_token: String,
    pub operator_id: OperatorId,
    pub telegram_api_url: Option<String>,

    // Storage
    pub data_file: PathBuf,
    pub download_dir: PathBuf,

    // Limits
    pub max_sources: usize,
    pub max_media_bytes: u64,
    pub caption_title_chars: usize,

    // Polling
    pub poll_interval: Duration,
    pub poll_jitter: Duration,
    pub priming_mode: PrimingMode,

    // Upstream
    pub feed_backend: FeedBackend,
    pub feed_base_url: String,
    pub ytdlp_path: PathBuf,
    pub ytdlp_format: String,

    // Timeouts
    pub fetch_timeout: Duration,
    pub probe_timeout: Duration,
    pub download_timeout: Duration,
    pub send_timeout: Duration,
    pub upload_timeout: Duration,
}

impl Config {
    /// Defaults for everything except the two required values.
    pub fn with_defaults(telegram_bot_token: impl Into<String>, operator_id: OperatorId) -> Self {
        Self {
            telegram_bot_token: telegram_bot_token.into(),
            operator_id,
            telegram_api_url: None,
            data_file: PathBuf::from("yt_channels.json"),
            download_dir: PathBuf::from("downloads"),
            max_sources: 3,
            max_media_bytes: DEFAULT_MAX_MEDIA_BYTES,
            caption_title_chars: 100,
            poll_interval: Duration::from_secs(6 * 60 * 60),
            poll_jitter: Duration::ZERO,
            priming_mode: PrimingMode::PerSource,
            feed_backend: FeedBackend::Rss,
            feed_base_url: "https://www.youtube.com".to_string(),
            ytdlp_path: PathBuf::from("yt-dlp"),
            ytdlp_format: "best[ext=mp4]/best".to_string(),
            fetch_timeout: Duration::from_secs(10),
            probe_timeout: Duration::from_secs(60),
            download_timeout: Duration::from_secs(30 * 60),
            send_timeout: Duration::from_secs(30),
            upload_timeout: Duration::from_secs(30 * 60),
        }
    }

    /// Load from the process environment (after merging `./.env`).
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        let mut cfg = Self::from_lookup(|key| env::var(key).ok())?;
        if env::var_os("YTDLP_PATH").is_none() {
            if let Some(found) = which_in_path("yt-dlp") {
                cfg.ytdlp_path = found;
            }
        }
        Ok(cfg)
    }

    /// Build from an arbitrary key lookup. Missing credentials are fatal.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).and_then(non_empty);

        let token = get("TELEGRAM_BOT_TOKEN").ok_or_else(|| {
            Error::Config("TELEGRAM_BOT_TOKEN environment variable is required".to_string())
        })?;
        let operator_raw = get("TELEGRAM_OPERATOR_ID").ok_or_else(|| {
            Error::Config("TELEGRAM_OPERATOR_ID environment variable is required".to_string())
        })?;
        let operator_id = operator_raw.trim().parse::<i64>().map_err(|_| {
            Error::Config(format!(
                "TELEGRAM_OPERATOR_ID must be a numeric chat id, got {operator_raw:?}"
            ))
        })?;

        let mut cfg = Self::with_defaults(token.trim(), OperatorId(operator_id));

        cfg.telegram_api_url = get("TELEGRAM_API_URL");
        if let Some(v) = get("DATA_FILE") {
            cfg.data_file = PathBuf::from(v);
        }
        if let Some(v) = get("DOWNLOAD_DIR") {
            cfg.download_dir = PathBuf::from(v);
        }

        if let Some(v) = parse_num::<usize>(&get, "MAX_SOURCES")? {
            if v == 0 {
                return Err(Error::Config("MAX_SOURCES must be at least 1".to_string()));
            }
            cfg.max_sources = v;
        }
        if let Some(v) = parse_num::<u64>(&get, "MAX_MEDIA_BYTES")? {
            cfg.max_media_bytes = v;
        }
        if let Some(v) = parse_num::<usize>(&get, "CAPTION_TITLE_CHARS")? {
            cfg.caption_title_chars = v;
        }

        if let Some(v) = parse_secs(&get, "POLL_INTERVAL_SECS")? {
            if v.is_zero() {
                return Err(Error::Config(
                    "POLL_INTERVAL_SECS must be greater than zero".to_string(),
                ));
            }
            cfg.poll_interval = v;
        }
        if let Some(v) = parse_secs(&get, "POLL_JITTER_SECS")? {
            cfg.poll_jitter = v;
        }
        if let Some(v) = get("PRIMING_MODE") {
            cfg.priming_mode = PrimingMode::parse(&v).ok_or_else(|| {
                Error::Config(format!(
                    "PRIMING_MODE must be `source` or `process`, got {v:?}"
                ))
            })?;
        }

        if let Some(v) = get("FEED_BACKEND") {
            cfg.feed_backend = FeedBackend::parse(&v).ok_or_else(|| {
                Error::Config(format!("FEED_BACKEND must be `rss` or `ytdlp`, got {v:?}"))
            })?;
        }
        if let Some(v) = get("FEED_BASE_URL") {
            cfg.feed_base_url = v.trim().trim_end_matches('/').to_string();
        }
        if let Some(v) = get("YTDLP_PATH") {
            cfg.ytdlp_path = PathBuf::from(v);
        }
        if let Some(v) = get("YTDLP_FORMAT") {
            cfg.ytdlp_format = v;
        }

        if let Some(v) = parse_secs(&get, "FETCH_TIMEOUT_SECS")? {
            cfg.fetch_timeout = v;
        }
        if let Some(v) = parse_secs(&get, "PROBE_TIMEOUT_SECS")? {
            cfg.probe_timeout = v;
        }
        if let Some(v) = parse_secs(&get, "DOWNLOAD_TIMEOUT_SECS")? {
            cfg.download_timeout = v;
        }
        if let Some(v) = parse_secs(&get, "SEND_TIMEOUT_SECS")? {
            cfg.send_timeout = v;
        }
        if let Some(v) = parse_secs(&get, "UPLOAD_TIMEOUT_SECS")? {
            cfg.upload_timeout = v;
        }

        Ok(cfg)
    }
}

fn parse_num<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>> {
    let Some(raw) = get(key) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|_| Error::Config(format!("{key} must be a non-negative integer, got {raw:?}")))
}

fn parse_secs(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<Duration>> {
    Ok(parse_num::<u64>(get, key)?.map(Duration::from_secs))
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn which_in_path(binary: &str) -> Option<PathBuf> {
    let path = env::var_os("PATH")?;
    for dir in env::split_paths(&path) {
        let candidate = dir.join(binary);
        if is_executable_file(&candidate) {
            return Some(candidate);
        }
    }
    None
}

fn is_executable_file(p: &Path) -> bool {
    if !p.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(md) = fs::metadata(p) {
            return (md.permissions().mode() & 0o111) != 0;
        }
    }
    true
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
