//! On-disk audio cache
//!
//! Maps a track id to a local audio file, downloading it through the
//! [`MusicProvider`] on first use. The presence of the final file is the only
//! cache-hit signal: downloads are written to a uniquely named `.part` file in
//! the same directory and renamed once complete, so a crashed or failed
//! download never looks like a hit, and caches sharing a directory never
//! write into the same file.
//!
//! Concurrent resolutions of the same id are serialised by a per-key async
//! mutex; the second caller waits for the first and then sees the hit.

use crate::error::{Error, Result};
use crate::provider::MusicProvider;
use futures::StreamExt;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use tunebot_common::config::CacheConfig;

/// Counters for cache diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub failures: u64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    failures: AtomicU64,
}

type KeyLocks = Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

/// Holds one reference to a per-key lock; drops the map entry when last out
struct KeyLease<'a> {
    locks: &'a KeyLocks,
    key: String,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl Drop for KeyLease<'_> {
    fn drop(&mut self) {
        let mut map = self.locks.lock().unwrap_or_else(|p| p.into_inner());
        // Map entry + this lease are the only references left
        if Arc::strong_count(&self.lock) == 2
            && map.get(&self.key).is_some_and(|l| Arc::ptr_eq(l, &self.lock))
        {
            map.remove(&self.key);
        }
    }
}

/// Track-id keyed audio file cache
pub struct StreamCache {
    dir: PathBuf,
    prefix: String,
    extension: String,
    max_bytes: Option<u64>,
    provider: Arc<dyn MusicProvider>,
    locks: KeyLocks,
    counters: Counters,
}

impl StreamCache {
    pub fn new(config: &CacheConfig, provider: Arc<dyn MusicProvider>) -> Self {
        Self {
            dir: config.resolved_dir(),
            prefix: config.prefix.clone(),
            extension: config.extension.clone(),
            max_bytes: config.max_bytes,
            provider,
            locks: Mutex::new(HashMap::new()),
            counters: Counters::default(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the cache directory if needed
    pub async fn ensure_dir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        info!("Audio cache directory: {}", self.dir.display());
        Ok(())
    }

    /// Deterministic file path for a track id
    ///
    /// Characters outside `[A-Za-z0-9_-]` are percent-encoded, so distinct
    /// ids never share a file and no id can escape the cache directory.
    pub fn path_for(&self, track_id: &str) -> PathBuf {
        let mut encoded = String::with_capacity(track_id.len());
        for byte in track_id.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
                encoded.push(byte as char);
            } else {
                encoded.push_str(&format!("%{:02X}", byte));
            }
        }
        self.dir
            .join(format!("{}-{}.{}", self.prefix, encoded, self.extension))
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
        }
    }

    /// Local path of the audio for `track_id`, downloading on a miss
    ///
    /// Failures are reported as [`Error::ResourceUnavailable`].
    pub async fn resolve(&self, track_id: &str) -> Result<PathBuf> {
        if let Some(path) = self.lookup(track_id).await {
            return Ok(path);
        }

        let lease = self.lease(track_id);
        let _guard = lease.lock.lock().await;

        // Another caller may have finished the download while we waited
        if let Some(path) = self.lookup(track_id).await {
            return Ok(path);
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        match self.download(track_id).await {
            Ok(path) => Ok(path),
            Err(reason) => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                warn!("Download of {} failed: {}", track_id, reason);
                Err(Error::ResourceUnavailable {
                    track_id: track_id.to_string(),
                    reason,
                })
            }
        }
    }

    fn lease(&self, track_id: &str) -> KeyLease<'_> {
        let mut map = self.locks.lock().unwrap_or_else(|p| p.into_inner());
        let lock = Arc::clone(map.entry(track_id.to_string()).or_default());
        KeyLease {
            locks: &self.locks,
            key: track_id.to_string(),
            lock,
        }
    }

    /// Cache hit check; refreshes mtime when eviction is enabled
    async fn lookup(&self, track_id: &str) -> Option<PathBuf> {
        let path = self.path_for(track_id);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                debug!("Cache hit for {}", track_id);
                if self.max_bytes.is_some() {
                    if let Err(e) = touch(&path).await {
                        debug!("Could not refresh mtime of {}: {}", path.display(), e);
                    }
                }
                Some(path)
            }
            _ => None,
        }
    }

    /// Download into a uniquely named `.part` file, then rename into place
    ///
    /// The part file is deleted when dropped, so every early return cleans up.
    async fn download(&self, track_id: &str) -> std::result::Result<PathBuf, String> {
        let final_path = self.path_for(track_id);

        info!("Downloading audio for {}", track_id);
        let (file, part_path) = self.create_part(&final_path)?;
        let written = self.write_part(track_id, file).await?;

        let target = final_path.clone();
        tokio::task::spawn_blocking(move || part_path.persist(&target))
            .await
            .map_err(|e| format!("rename task failed: {}", e))?
            .map_err(|e| format!("rename failed: {}", e.error))?;
        info!("Cached {} ({} bytes)", track_id, written);

        if let Some(max) = self.max_bytes {
            if let Err(e) = self.prune(max, &final_path).await {
                warn!("Cache pruning failed: {}", e);
            }
        }
        Ok(final_path)
    }

    /// Temp file next to `final_path`, private to this download
    fn create_part(&self, final_path: &Path) -> std::result::Result<(tokio::fs::File, TempPath), String> {
        let name = final_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let part = tempfile::Builder::new()
            .prefix(&format!(".{}.", name))
            .suffix(".part")
            .tempfile_in(&self.dir)
            .map_err(|e| format!("create part file in {}: {}", self.dir.display(), e))?;
        let (file, path) = part.into_parts();
        Ok((tokio::fs::File::from_std(file), path))
    }

    async fn write_part(
        &self,
        track_id: &str,
        mut file: tokio::fs::File,
    ) -> std::result::Result<u64, String> {
        let mut stream = self
            .provider
            .fetch_audio(track_id)
            .await
            .map_err(|e| e.to_string())?;

        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| e.to_string())?;
            file.write_all(&chunk)
                .await
                .map_err(|e| format!("write: {}", e))?;
            written += chunk.len() as u64;
        }
        if written == 0 {
            return Err("provider returned an empty stream".to_string());
        }

        file.flush().await.map_err(|e| format!("flush: {}", e))?;
        file.sync_all().await.map_err(|e| format!("sync: {}", e))?;
        Ok(written)
    }

    /// Delete least-recently-used entries until the cache fits in `max_bytes`
    ///
    /// `keep` is never removed. Returns the number of bytes freed.
    pub async fn prune(&self, max_bytes: u64, keep: &Path) -> Result<u64> {
        let prefix = format!("{}-", self.prefix);
        let suffix = format!(".{}", self.extension);

        let mut entries = Vec::new();
        let mut total = 0u64;
        let mut dir = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !name.starts_with(&prefix) || !name.ends_with(&suffix) {
                continue;
            }
            let meta = entry.metadata().await?;
            if !meta.is_file() {
                continue;
            }
            let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            total += meta.len();
            entries.push((modified, meta.len(), entry.path()));
        }

        if total <= max_bytes {
            return Ok(0);
        }

        entries.sort_by_key(|(modified, _, _)| *modified);
        let mut freed = 0u64;
        for (_, len, path) in entries {
            if total - freed <= max_bytes {
                break;
            }
            if path == keep {
                continue;
            }
            tokio::fs::remove_file(&path).await?;
            debug!("Evicted {}", path.display());
            freed += len;
        }
        info!("Cache pruned: freed {} bytes", freed);
        Ok(freed)
    }
}

async fn touch(path: &Path) -> std::io::Result<()> {
    let file = tokio::fs::OpenOptions::new().write(true).open(path).await?;
    let file = file.into_std().await;
    tokio::task::spawn_blocking(move || file.set_modified(SystemTime::now()))
        .await
        .map_err(std::io::Error::other)?
}
