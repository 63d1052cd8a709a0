//! File discovery cache.
//!
//! One store per working root, holding the file lists of recent walks keyed by
//! `(root, include pattern, sorted ignore set)`. An entry is reused only while it is younger
//! than the TTL **and** every directory it snapshotted still has its recorded mtime. In-place
//! edits that leave directory mtimes alone are tolerated; the TTL bounds that risk.

use crate::atomic_io::{atomic_write, to_unix_ms, unix_now_ms};
use crate::paths::{default_cache_dir, DISCOVERY_CACHE_FILE_NAME};
use crate::scanner::{DiscoveryQuery, FileScanner, ScanOutcome};
use crate::{CacheError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DISCOVERY_CACHE_MAX_KEYS: usize = 16;
pub const DEFAULT_DISCOVERY_TTL: Duration = Duration::from_secs(30);

const DISCOVERY_STORE_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiscoveryEntry {
    pub created_at_ms: u64,
    pub files: Vec<String>,
    pub dir_mtimes: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DiscoveryStore {
    version: u32,
    #[serde(default)]
    entries: BTreeMap<String, DiscoveryEntry>,
}

impl Default for DiscoveryStore {
    fn default() -> Self {
        Self {
            version: DISCOVERY_STORE_VERSION,
            entries: BTreeMap::new(),
        }
    }
}

/// Explicit handle over the on-disk discovery store: load once, use, persist once.
#[derive(Debug, Clone)]
pub struct DiscoveryCache {
    path: PathBuf,
    store: DiscoveryStore,
    dirty: bool,
}

impl DiscoveryCache {
    #[must_use]
    pub fn store_path_for_root(root: &Path) -> PathBuf {
        default_cache_dir(root).join(DISCOVERY_CACHE_FILE_NAME)
    }

    /// Load the store at `path`. A missing, unreadable or corrupt store yields an empty cache.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let store = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<DiscoveryStore>(&bytes) {
                Ok(store) if store.version == DISCOVERY_STORE_VERSION => store,
                Ok(store) => {
                    log::debug!(
                        "Discovery cache {} has version {}, starting fresh",
                        path.display(),
                        store.version
                    );
                    DiscoveryStore::default()
                }
                Err(err) => {
                    log::warn!("Discovery cache corrupted {}: {err}", path.display());
                    DiscoveryStore::default()
                }
            },
            Err(_) => DiscoveryStore::default(),
        };
        Self {
            path,
            store,
            dirty: false,
        }
    }

    #[must_use]
    pub fn key(query: &DiscoveryQuery) -> String {
        let mut hasher = Sha256::new();
        hasher.update(query.root.to_string_lossy().as_bytes());
        hasher.update(b"|");
        hasher.update(query.include.as_bytes());
        // BTreeSet iteration is already sorted.
        for pattern in &query.ignore {
            hasher.update(b"|");
            hasher.update(pattern.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }

    pub fn len(&self) -> usize {
        self.store.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.entries.is_empty()
    }

    pub fn entry(&self, key: &str) -> Option<&DiscoveryEntry> {
        self.store.entries.get(key)
    }

    /// Return the cached file list for `key` if it is still fresh at `now_ms`.
    pub async fn lookup(&self, key: &str, ttl: Duration, now_ms: u64) -> Option<Vec<String>> {
        let entry = self.store.entries.get(key)?;
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        if now_ms.saturating_sub(entry.created_at_ms) > ttl_ms {
            log::debug!("Discovery cache expired for {key}");
            return None;
        }
        for (dir, recorded) in &entry.dir_mtimes {
            match dir_mtime_ms(Path::new(dir)).await {
                Some(current) if current == *recorded => {}
                _ => {
                    log::debug!("Discovery cache stale: {dir} changed");
                    return None;
                }
            }
        }
        Some(entry.files.clone())
    }

    /// Record an entry, keeping only the most recently created keys.
    pub fn insert(&mut self, key: String, entry: DiscoveryEntry) {
        self.store.entries.insert(key, entry);
        self.evict_oldest();
        self.dirty = true;
    }

    fn evict_oldest(&mut self) {
        if self.store.entries.len() <= DISCOVERY_CACHE_MAX_KEYS {
            return;
        }
        let mut ranked: Vec<(&String, u64)> = self
            .store
            .entries
            .iter()
            .map(|(key, entry)| (key, entry.created_at_ms))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        let evicted: Vec<String> = ranked
            .into_iter()
            .skip(DISCOVERY_CACHE_MAX_KEYS)
            .map(|(key, _)| key.clone())
            .collect();
        for key in evicted {
            self.store.entries.remove(&key);
        }
    }

    /// Cached walk: reuse a fresh entry, otherwise scan `query.root` and record the result.
    pub async fn discover(&mut self, query: &DiscoveryQuery, ttl: Duration) -> Result<Vec<String>> {
        let key = Self::key(query);
        if let Some(files) = self.lookup(&key, ttl, unix_now_ms()).await {
            log::debug!("Discovery cache hit for {}", query.root.display());
            return Ok(files);
        }

        let owned = query.clone();
        let entry = tokio::task::spawn_blocking(move || {
            let outcome = FileScanner::new(&owned)?.scan();
            Ok::<_, CacheError>(snapshot_entry(outcome, unix_now_ms()))
        })
        .await
        .map_err(|e| CacheError::TaskFailed(format!("file discovery walk: {e}")))??;

        let files = entry.files.clone();
        self.insert(key, entry);
        Ok(files)
    }

    /// Write the store if anything changed. Failures are logged and swallowed: the cache is an
    /// optimization, never a source of truth.
    pub async fn persist(&self) {
        if !self.dirty {
            return;
        }
        let bytes = match serde_json::to_vec(&self.store) {
            Ok(bytes) => bytes,
            Err(err) => {
                log::warn!("Failed to serialize discovery cache: {err}");
                return;
            }
        };
        if let Err(err) = atomic_write(&self.path, &bytes).await {
            log::warn!(
                "Failed to write discovery cache {}: {err}",
                self.path.display()
            );
        }
    }
}

/// Build a cache entry from a finished walk. Directory mtimes are the ones the walk observed,
/// so a file added behind the walker leaves the entry stale rather than fresh.
pub fn snapshot_entry(outcome: ScanOutcome, created_at_ms: u64) -> DiscoveryEntry {
    let dir_mtimes = outcome
        .dirs
        .into_iter()
        .map(|(dir, mtime)| (dir.to_string_lossy().into_owned(), mtime))
        .collect();
    DiscoveryEntry {
        created_at_ms,
        files: outcome.files,
        dir_mtimes,
    }
}

async fn dir_mtime_ms(dir: &Path) -> Option<u64> {
    let meta = tokio::fs::metadata(dir).await.ok()?;
    meta.modified().ok().map(to_unix_ms)
}
