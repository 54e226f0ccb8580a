use std::{
    future::Future,
    io,
    path::{Path, PathBuf},
    time::Duration,
};

use chrono::Utc;

use crate::{Error, Result};

// ============== Timestamp Helpers ==============

/// RFC3339 timestamp in UTC (for the state file and logs).
pub fn iso_timestamp_utc() -> String {
    Utc::now().to_rfc3339()
}

// ============== Text Helpers ==============

/// Truncate to at most `max_chars` characters, ending with `...` when cut.
///
/// Counts characters, not bytes, so multi-byte titles are never split
/// mid-code-point.
pub fn truncate_text(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    if max_chars <= 3 {
        return s.chars().take(max_chars).collect();
    }
    let mut out = s.chars().take(max_chars - 3).collect::<String>();
    out.push_str("...");
    out
}

// ============== Timeouts ==============

/// Await `fut` for at most `after`; elapsing becomes [`Error::Timeout`].
pub async fn with_timeout<T>(
    what: &str,
    after: Duration,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(after, fut).await {
        Ok(res) => res,
        Err(_) => Err(Error::timeout(what, after)),
    }
}

// ============== Scratch Files ==============

/// Turn an upstream id into a single safe path component.
pub fn sanitize_component(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(80)
        .collect();
    if cleaned.is_empty() {
        "item".to_string()
    } else {
        cleaned
    }
}

/// Scratch directory for one delivery: `<root>/<sanitized item id>`.
pub fn scratch_dir_for(root: &Path, item_id: &str) -> PathBuf {
    root.join(sanitize_component(item_id))
}

/// Scratch directory owned by one delivery. Removed on drop, including when
/// the delivering future is cancelled mid-download.
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    pub fn new(root: &Path, item_id: &str) -> Self {
        Self {
            path: scratch_dir_for(root, item_id),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Err(e) = remove_scratch(&self.path) {
            tracing::warn!(dir = %self.path.display(), error = %e, "failed to remove scratch dir");
        }
    }
}

/// Remove a scratch directory and everything in it. Missing is fine.
pub fn remove_scratch(dir: &Path) -> io::Result<()> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
