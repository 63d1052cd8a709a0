//! Per-file content cache.
//!
//! Entries are keyed by relative path and carry a `(size, mtime)` signature, a derived result
//! and, budget permitting, the raw file text. Derived results are cheap to keep and always
//! survive pruning; raw text is what the byte budget bounds.

use crate::atomic_io::unix_now_ms;
use crate::paths::{default_cache_dir, CONTENT_CACHE_FILE_NAME};
use crate::structured::StructuredCache;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONTENT_CACHE_MAX_RAW_BYTES: u64 = 8 * 1024 * 1024;
pub const CONTENT_CACHE_COMPRESS_THRESHOLD: usize = 64 * 1024;

const CONTENT_STORE_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContentCacheEntry<D> {
    pub size: u64,
    pub mtime_ms: u64,
    pub derived: D,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl<D> ContentCacheEntry<D> {
    pub fn matches(&self, size: u64, mtime_ms: u64) -> bool {
        self.size == size && self.mtime_ms == mtime_ms
    }

    fn raw_len(&self) -> u64 {
        self.raw.as_ref().map_or(0, |raw| raw.len() as u64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ContentStore<D> {
    version: u32,
    saved_at_unix_ms: u64,
    entries: BTreeMap<String, ContentCacheEntry<D>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneStats {
    pub removed_entries: usize,
    pub dropped_raw: usize,
    pub retained_raw_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct ContentCache<D> {
    store: StructuredCache,
    entries: BTreeMap<String, ContentCacheEntry<D>>,
    max_raw_bytes: u64,
    dirty: bool,
}

impl<D> ContentCache<D>
where
    D: Serialize + DeserializeOwned + Clone,
{
    #[must_use]
    pub fn store_path_for_root(root: &Path) -> PathBuf {
        default_cache_dir(root).join(CONTENT_CACHE_FILE_NAME)
    }

    /// Empty cache that persists to `store`.
    pub fn new(store: StructuredCache, max_raw_bytes: u64) -> Self {
        Self {
            store,
            entries: BTreeMap::new(),
            max_raw_bytes,
            dirty: false,
        }
    }

    /// Load from `store`; anything unreadable starts an empty cache.
    pub async fn load(store: StructuredCache, max_raw_bytes: u64) -> Self {
        let entries = match store.read::<ContentStore<D>>().await {
            Some(saved) if saved.version == CONTENT_STORE_VERSION => saved.entries,
            Some(_) => {
                log::debug!("Content cache version changed, starting fresh");
                BTreeMap::new()
            }
            None => BTreeMap::new(),
        };
        Self {
            store,
            entries,
            max_raw_bytes,
            dirty: false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_raw_bytes(&self) -> u64 {
        self.max_raw_bytes
    }

    pub fn get(&self, rel_path: &str) -> Option<&ContentCacheEntry<D>> {
        self.entries.get(rel_path)
    }

    /// Entry for `rel_path` only if its signature still matches the file on disk.
    pub fn lookup(&self, rel_path: &str, size: u64, mtime_ms: u64) -> Option<&ContentCacheEntry<D>> {
        self.entries
            .get(rel_path)
            .filter(|entry| entry.matches(size, mtime_ms))
    }

    pub fn insert(&mut self, rel_path: impl Into<String>, entry: ContentCacheEntry<D>) {
        self.entries.insert(rel_path.into(), entry);
        self.dirty = true;
    }

    pub fn raw_bytes(&self) -> u64 {
        self.entries.values().map(ContentCacheEntry::raw_len).sum()
    }

    /// Remove entries outside `active`, then enforce the raw byte budget in path order.
    ///
    /// Raw content is kept for the longest path-sorted prefix that fits the budget; from the
    /// first entry that would overflow it onward, raw content is dropped and the derived
    /// result kept.
    pub fn prune(&mut self, active: &BTreeSet<String>) -> PruneStats {
        let mut stats = PruneStats::default();

        let before = self.entries.len();
        self.entries.retain(|path, _| active.contains(path));
        stats.removed_entries = before - self.entries.len();

        let mut total = 0u64;
        let mut exceeded = false;
        for entry in self.entries.values_mut() {
            let len = entry.raw_len();
            if entry.raw.is_none() {
                continue;
            }
            if !exceeded && total.saturating_add(len) <= self.max_raw_bytes {
                total += len;
                continue;
            }
            exceeded = true;
            entry.raw = None;
            stats.dropped_raw += 1;
        }
        stats.retained_raw_bytes = total;

        if stats.removed_entries > 0 || stats.dropped_raw > 0 {
            self.dirty = true;
            log::debug!(
                "Content cache pruned: removed {} entries, dropped raw text of {}",
                stats.removed_entries,
                stats.dropped_raw
            );
        }
        stats
    }

    pub async fn persist(&self) {
        if !self.dirty {
            return;
        }
        let saved = ContentStore {
            version: CONTENT_STORE_VERSION,
            saved_at_unix_ms: unix_now_ms(),
            entries: self.entries.clone(),
        };
        if let Err(err) = self.store.write(&saved).await {
            log::warn!(
                "Failed to write content cache {}: {err}",
                self.store.plain_path().display()
            );
        }
    }
}
