//! Bounded disk cache for HTTP media sources.
//!
//! The first playback of a remote source streams straight from the network
//! while a background fill downloads it into the cache; later playbacks of
//! the same URL are served from disk. Eviction is least-recently-used over
//! a fixed byte window, with a separate cap on any single entry. Every
//! cache failure degrades to direct network playback — a broken cache can
//! slow playback down but never break it.
//!
//! One cache instance is shared per process: construct it once (see
//! [`MediaCache::shared`]) and hand each adapter a clone. Clones are cheap
//! and all point at the same index.

use anyhow::{Context, Result};
use lru::LruCache;
use std::collections::HashSet;
use std::fs;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, OnceLock};
use std::time::Duration;

use crate::config::CacheConfig;

/// Where the engine should read a source from after cache resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    /// Serve from the local filesystem (cache hit, or a plain local path)
    Local(PathBuf),
    /// Serve from the original location (cache miss or bypass)
    Remote(String),
}

/// Cached entries in recency order, plus the running byte total
struct CacheIndex {
    entries: LruCache<String, u64>,
    total_bytes: u64,
}

struct CacheShared {
    dir: PathBuf,
    max_cache_bytes: u64,
    max_file_bytes: u64,
    in_flight_wait: Duration,
    index: Mutex<CacheIndex>,
    in_flight: Mutex<HashSet<String>>,
    fill_done: Condvar,
}

/// Process-wide LRU media cache.
///
/// Thread-safe: the index is behind a mutex, fills run as background tasks,
/// and a condvar lets concurrent resolvers wait (bounded) for an in-flight
/// fill of the same URL.
#[derive(Clone)]
pub struct MediaCache {
    shared: Arc<CacheShared>,
}

static SHARED: OnceLock<MediaCache> = OnceLock::new();

impl MediaCache {
    /// Open (or create) the cache directory and rebuild the recency index
    /// from the files already on disk, oldest first.
    pub fn new(config: &CacheConfig) -> Result<Self> {
        let dir = config.resolved_dir();
        fs::create_dir_all(&dir)
            .with_context(|| format!("create cache directory {}", dir.display()))?;

        let mut existing: Vec<(std::time::SystemTime, String, u64)> = Vec::new();
        for entry in fs::read_dir(&dir).context("scan cache directory")? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let meta = entry.metadata()?;
            if !meta.is_file() {
                continue;
            }
            if name.ends_with(".part") {
                // Leftover from an interrupted fill
                let _ = fs::remove_file(entry.path());
                continue;
            }
            let mtime = meta.modified().unwrap_or(std::time::UNIX_EPOCH);
            existing.push((mtime, name, meta.len()));
        }
        existing.sort_by_key(|(mtime, _, _)| *mtime);

        let mut index = CacheIndex {
            entries: LruCache::unbounded(),
            total_bytes: 0,
        };
        for (_, key, size) in existing {
            index.total_bytes += size;
            index.entries.put(key, size);
        }

        log::info!(
            "media cache at {} ({} entries, {} bytes, window {} bytes)",
            dir.display(),
            index.entries.len(),
            index.total_bytes,
            config.max_cache_bytes,
        );

        let cache = Self {
            shared: Arc::new(CacheShared {
                dir,
                max_cache_bytes: config.max_cache_bytes,
                max_file_bytes: config.max_file_bytes,
                in_flight_wait: Duration::from_millis(config.in_flight_wait_ms),
                index: Mutex::new(index),
                in_flight: Mutex::new(HashSet::new()),
                fill_done: Condvar::new(),
            }),
        };
        cache.evict_to_fit();
        Ok(cache)
    }

    /// The process-wide cache instance. The first caller's configuration
    /// wins; later callers get the already-installed instance.
    pub fn shared(config: &CacheConfig) -> Result<Self> {
        if let Some(cache) = SHARED.get() {
            return Ok(cache.clone());
        }
        let cache = Self::new(config)?;
        Ok(SHARED.get_or_init(|| cache).clone())
    }

    /// The directory completed entries live in
    pub fn dir(&self) -> &Path {
        &self.shared.dir
    }

    /// Resolve a source URL to where the engine should read it from.
    ///
    /// Non-HTTP sources pass through untouched. HTTP(S) sources are served
    /// from disk when fully cached; otherwise playback proceeds remote
    /// (fail-open) while a background fill warms the cache. When a fill for
    /// the same URL is already running, the caller waits a bounded interval
    /// for it to finish before falling back to remote.
    pub fn resolve(&self, url: &str) -> SourceLocation {
        if !is_http(url) {
            let path = Path::new(url);
            if path.is_file() {
                return SourceLocation::Local(path.to_path_buf());
            }
            return SourceLocation::Remote(url.to_string());
        }

        let key = entry_key(url);
        if let Some(path) = self.lookup(&key) {
            log::debug!("cache hit: {}", url);
            return SourceLocation::Local(path);
        }

        if self.await_in_flight(&key) {
            if let Some(path) = self.lookup(&key) {
                log::debug!("cache hit after in-flight fill: {}", url);
                return SourceLocation::Local(path);
            }
        } else {
            self.spawn_fill(url, key);
        }

        SourceLocation::Remote(url.to_string())
    }

    /// Whether a completed entry for this URL is on disk
    pub fn contains(&self, url: &str) -> bool {
        let key = entry_key(url);
        self.shared
            .index
            .lock()
            .map(|index| index.entries.contains(&key))
            .unwrap_or(false)
    }

    /// Total size of all completed entries
    pub fn total_bytes(&self) -> u64 {
        self.shared
            .index
            .lock()
            .map(|index| index.total_bytes)
            .unwrap_or(0)
    }

    /// Touch the entry and return its path if the backing file still exists
    fn lookup(&self, key: &str) -> Option<PathBuf> {
        let mut index = self.shared.index.lock().ok()?;
        if index.entries.get(key).is_none() {
            return None;
        }
        let path = self.shared.dir.join(key);
        if path.is_file() {
            return Some(path);
        }
        // Backing file vanished behind our back; drop the stale entry
        if let Some(size) = index.entries.pop(key) {
            index.total_bytes = index.total_bytes.saturating_sub(size);
        }
        None
    }

    /// If a fill for `key` is running, wait (bounded) for it to finish.
    /// Returns whether a fill was in flight at all.
    fn await_in_flight(&self, key: &str) -> bool {
        let Ok(guard) = self.shared.in_flight.lock() else {
            return false;
        };
        if !guard.contains(key) {
            return false;
        }

        log::debug!(
            "waiting up to {:?} for in-flight fill",
            self.shared.in_flight_wait
        );
        match self.shared.fill_done.wait_timeout_while(
            guard,
            self.shared.in_flight_wait,
            |set| set.contains(key),
        ) {
            Ok((_, timeout)) if timeout.timed_out() => {
                log::warn!("in-flight cache fill exceeded wait bound, playing from network");
            }
            _ => {}
        }
        true
    }

    /// Mark `key` as filling. Returns false when a fill is already running.
    fn mark_in_flight(&self, key: &str) -> bool {
        self.shared
            .in_flight
            .lock()
            .map(|mut set| set.insert(key.to_string()))
            .unwrap_or(false)
    }

    fn finish_fill(&self, key: &str) {
        if let Ok(mut set) = self.shared.in_flight.lock() {
            set.remove(key);
        }
        self.shared.fill_done.notify_all();
    }

    /// Start a background fill on the ambient async runtime. Without a
    /// runtime the fill is skipped and playback stays remote.
    fn spawn_fill(&self, url: &str, key: String) {
        if !self.mark_in_flight(&key) {
            return;
        }

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            log::warn!("no async runtime available, skipping cache fill for {}", url);
            self.finish_fill(&key);
            return;
        };

        let cache = self.clone();
        let url = url.to_string();
        handle.spawn(async move {
            if let Err(e) = cache.fill(&url, &key).await {
                log::warn!("cache fill failed for {}: {} (reads stay direct)", url, e);
            }
            cache.finish_fill(&key);
        });
    }

    /// Download `url` into a partial file, then commit it into the index
    async fn fill(&self, url: &str, key: &str) -> Result<()> {
        let part = self.shared.dir.join(format!("{key}.part"));
        match self.download(url, &part).await {
            Ok(()) => {
                if self.commit(key, &part)? {
                    log::info!("cached {} ({} bytes total)", url, self.total_bytes());
                }
                Ok(())
            }
            Err(e) => {
                let _ = fs::remove_file(&part);
                Err(e)
            }
        }
    }

    async fn download(&self, url: &str, part: &Path) -> Result<()> {
        let mut response = reqwest::get(url).await.context("request media")?;
        if !response.status().is_success() {
            anyhow::bail!("unexpected status {}", response.status());
        }

        let mut file = fs::File::create(part)
            .with_context(|| format!("create partial file {}", part.display()))?;
        let mut written: u64 = 0;
        while let Some(chunk) = response.chunk().await.context("read response body")? {
            written += chunk.len() as u64;
            if written > self.shared.max_file_bytes {
                // Oversize entries are abandoned rather than truncated; the
                // commit step double-checks, this just stops the download
                break;
            }
            file.write_all(&chunk).context("write partial file")?;
        }
        file.flush().context("flush partial file")?;
        Ok(())
    }

    /// Promote a completed partial file to a cache entry. Returns false
    /// when the entry was rejected (exceeds the single-entry cap).
    fn commit(&self, key: &str, part: &Path) -> Result<bool> {
        let size = fs::metadata(part).context("stat partial file")?.len();
        if size > self.shared.max_file_bytes {
            log::debug!(
                "entry {} exceeds single-file cap ({} > {} bytes), not cached",
                key,
                size,
                self.shared.max_file_bytes
            );
            let _ = fs::remove_file(part);
            return Ok(false);
        }

        let path = self.shared.dir.join(key);
        fs::rename(part, &path).context("commit cache entry")?;

        if let Ok(mut index) = self.shared.index.lock() {
            if let Some(old) = index.entries.put(key.to_string(), size) {
                index.total_bytes = index.total_bytes.saturating_sub(old);
            }
            index.total_bytes += size;
        }
        self.evict_to_fit();
        Ok(true)
    }

    /// Drop least-recently-used entries until the byte window holds
    fn evict_to_fit(&self) {
        let Ok(mut index) = self.shared.index.lock() else {
            return;
        };
        while index.total_bytes > self.shared.max_cache_bytes {
            let Some((key, size)) = index.entries.pop_lru() else {
                break;
            };
            index.total_bytes = index.total_bytes.saturating_sub(size);
            let path = self.shared.dir.join(&key);
            if let Err(e) = fs::remove_file(&path) {
                log::warn!("Failed to evict {}: {}", path.display(), e);
            } else {
                log::debug!("evicted {} ({} bytes)", key, size);
            }
        }
    }
}

impl std::fmt::Debug for MediaCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaCache")
            .field("dir", &self.shared.dir)
            .field("total_bytes", &self.total_bytes())
            .finish()
    }
}

fn is_http(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Stable on-disk name for a URL
fn entry_key(url: &str) -> String {
    let mut hasher = DefaultHasher::new();
    url.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(dir: &Path, max_cache: u64, max_file: u64) -> CacheConfig {
        CacheConfig {
            dir: Some(dir.to_path_buf()),
            max_cache_bytes: max_cache,
            max_file_bytes: max_file,
            in_flight_wait_ms: 200,
        }
    }

    fn write_part(cache: &MediaCache, key: &str, bytes: &[u8]) -> PathBuf {
        let part = cache.dir().join(format!("{key}.part"));
        fs::write(&part, bytes).unwrap();
        part
    }

    #[test]
    fn test_scan_rebuilds_index() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("aaaa"), b"12345").unwrap();
        fs::write(dir.path().join("bbbb"), b"678").unwrap();
        fs::write(dir.path().join("cccc.part"), b"partial").unwrap();

        let cache = MediaCache::new(&test_config(dir.path(), 1024, 1024)).unwrap();
        assert_eq!(cache.total_bytes(), 8);
        // Interrupted fills are discarded at startup
        assert!(!dir.path().join("cccc.part").exists());
    }

    #[test]
    fn test_local_paths_pass_through() {
        let dir = tempfile::tempdir().unwrap();
        let cache = MediaCache::new(&test_config(dir.path(), 1024, 1024)).unwrap();

        let media = dir.path().join("clip.mp4");
        fs::write(&media, b"data").unwrap();

        let location = cache.resolve(media.to_str().unwrap());
        assert_eq!(location, SourceLocation::Local(media));

        // A path that does not exist stays remote for the engine to reject
        let location = cache.resolve("/nonexistent/clip.mp4");
        assert!(matches!(location, SourceLocation::Remote(_)));
    }

    #[test]
    fn test_commit_then_resolve_serves_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let cache = MediaCache::new(&test_config(dir.path(), 1024, 1024)).unwrap();

        let url = "https://example.com/clip.mp4";
        let key = entry_key(url);
        let part = write_part(&cache, &key, b"frames");
        assert!(cache.commit(&key, &part).unwrap());

        assert!(cache.contains(url));
        let location = cache.resolve(url);
        assert_eq!(location, SourceLocation::Local(cache.dir().join(&key)));
    }

    #[test]
    fn test_eviction_respects_window() {
        let dir = tempfile::tempdir().unwrap();
        let cache = MediaCache::new(&test_config(dir.path(), 10, 10)).unwrap();

        for (key, data) in [("k1", b"aaaa"), ("k2", b"bbbb"), ("k3", b"cccc")] {
            let part = write_part(&cache, key, data);
            assert!(cache.commit(key, &part).unwrap());
        }

        // 12 bytes committed into a 10-byte window: the oldest entry goes
        assert!(cache.total_bytes() <= 10);
        assert!(!cache.dir().join("k1").exists());
        assert!(cache.dir().join("k2").exists());
        assert!(cache.dir().join("k3").exists());
    }

    #[test]
    fn test_oversize_entry_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cache = MediaCache::new(&test_config(dir.path(), 1024, 4)).unwrap();

        let part = write_part(&cache, "big", b"too large");
        assert!(!cache.commit("big", &part).unwrap());
        assert_eq!(cache.total_bytes(), 0);
        assert!(!cache.dir().join("big").exists());
    }

    #[test]
    fn test_bounded_wait_picks_up_finished_fill() {
        let dir = tempfile::tempdir().unwrap();
        let cache = MediaCache::new(&test_config(dir.path(), 1024, 1024)).unwrap();

        let url = "https://example.com/slow.mp4";
        let key = entry_key(url);
        assert!(cache.mark_in_flight(&key));

        let filler = cache.clone();
        let filler_key = key.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            let part = write_part(&filler, &filler_key, b"frames");
            filler.commit(&filler_key, &part).unwrap();
            filler.finish_fill(&filler_key);
        });

        // Resolve blocks on the in-flight fill and then serves from disk
        let location = cache.resolve(url);
        handle.join().unwrap();
        assert_eq!(location, SourceLocation::Local(cache.dir().join(&key)));
    }

    #[test]
    fn test_wait_bound_fails_open() {
        let dir = tempfile::tempdir().unwrap();
        let cache = MediaCache::new(&test_config(dir.path(), 1024, 1024)).unwrap();

        let url = "https://example.com/stuck.mp4";
        assert!(cache.mark_in_flight(&entry_key(url)));

        // Nobody ever finishes the fill; the wait bound expires and the
        // caller falls back to the network
        let started = std::time::Instant::now();
        let location = cache.resolve(url);
        assert!(matches!(location, SourceLocation::Remote(_)));
        assert!(started.elapsed() >= Duration::from_millis(150));
    }
}
