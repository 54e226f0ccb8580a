//! Durable `source id → tracked source` map backed by one JSON file.
//!
//! Reads fail soft: a missing file is an empty store and a corrupt file is
//! logged and treated as empty, so the poller never dies on bad state.
//! Writes are stricter: a file that exists but cannot be read is never
//! overwritten.
//! Writes go to a sibling temp file that is renamed over the target, so a
//! reader sees either the old or the new map, never half of one.

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};

use tracing::{debug, warn};

use crate::{
    domain::{SourceId, SourceMap},
    errors::Error,
    utils::iso_timestamp_utc,
    Result,
};

pub struct SourceStore {
    path: PathBuf,
    // Serializes load-modify-save between the poller and the front end.
    lock: Mutex<()>,
}

impl SourceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn load(&self) -> SourceMap {
        let _guard = self.guard();
        self.load_unlocked()
    }

    pub fn save(&self, map: &SourceMap) -> Result<()> {
        let _guard = self.guard();
        self.save_unlocked(map)
    }

    /// Exclusive read-modify-write. Nothing is written when `f` fails.
    pub fn update<T>(&self, f: impl FnOnce(&mut SourceMap) -> Result<T>) -> Result<T> {
        let _guard = self.guard();
        let mut map = self.load_for_write()?;
        let out = f(&mut map)?;
        self.save_unlocked(&map)?;
        Ok(out)
    }

    /// Record `item_id` as the latest seen item of `id`.
    ///
    /// Returns `false` (and writes nothing) when the source is no longer tracked.
    pub fn record_seen(&self, id: &SourceId, item_id: &str) -> Result<bool> {
        let _guard = self.guard();
        let mut map = self.load_for_write()?;
        let Some(source) = map.get_mut(id) else {
            return Ok(false);
        };
        source.last_seen_item_id = Some(item_id.to_string());
        source.last_updated_at = Some(iso_timestamp_utc());
        self.save_unlocked(&map)?;
        Ok(true)
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        // A panic while holding the lock cannot leave the file half written.
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn load_unlocked(&self) -> SourceMap {
        match self.load_for_write() {
            Ok(map) => map,
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    kind = %e.kind(),
                    error = %e,
                    "state file unreadable, treating as empty"
                );
                SourceMap::new()
            }
        }
    }

    /// Like [`Self::load_unlocked`], but a file that exists and cannot be read
    /// is an error: writing an empty map over it would drop every source.
    fn load_for_write(&self) -> Result<SourceMap> {
        match read_map(&self.path) {
            Ok(map) => Ok(map),
            Err(e @ Error::CorruptState(_)) => {
                warn!(
                    path = %self.path.display(),
                    kind = %e.kind(),
                    error = %e,
                    "state file corrupt, starting from empty"
                );
                Ok(SourceMap::new())
            }
            Err(e) => Err(e),
        }
    }

    fn save_unlocked(&self, map: &SourceMap) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(map)?;
        let tmp = tmp_path(&self.path);
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }
        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(Error::Io(e));
        }
        debug!(path = %self.path.display(), sources = map.len(), "state saved");
        Ok(())
    }
}

fn read_map(path: &Path) -> Result<SourceMap> {
    let txt = match fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(SourceMap::new()),
        Err(e) if e.kind() == io::ErrorKind::InvalidData => {
            return Err(Error::CorruptState(e.to_string()))
        }
        Err(e) => return Err(Error::Io(e)),
    };
    if txt.trim().is_empty() {
        return Ok(SourceMap::new());
    }

    let mut map: SourceMap =
        serde_json::from_str(&txt).map_err(|e| Error::CorruptState(e.to_string()))?;
    for (id, source) in map.iter_mut() {
        source.id = id.clone();
    }
    Ok(map)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "state".into());
    name.push(".tmp");
    path.with_file_name(name)
}
