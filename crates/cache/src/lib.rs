//! # Context Cache
//!
//! Caches that make repeated documentation builds cheap.
//!
//! ## Caches
//!
//! ```text
//! Working root
//!     │
//!     ├──> File discovery cache (TTL + directory mtime snapshot)
//!     │      └─> file lists for (root, include, ignore set)
//!     │
//!     ├──> Content cache (size + mtime signature, raw-text byte budget)
//!     │      └─> derived per-file results, raw text when it fits
//!     │
//!     └──> Structured cache (JSON, gzip sibling above a size threshold)
//! ```
//!
//! Every write goes to a temporary sibling and is renamed into place, so a reader never sees
//! a half-written cache. Every read failure degrades to a miss.

mod atomic_io;
mod content;
mod discovery;
mod error;
mod limits;
mod paths;
mod scan;
mod scanner;
mod structured;

pub use atomic_io::{atomic_write, remove_if_exists, to_unix_ms, unix_now_ms};
pub use content::{
    ContentCache, ContentCacheEntry, PruneStats, CONTENT_CACHE_COMPRESS_THRESHOLD,
    DEFAULT_CONTENT_CACHE_MAX_RAW_BYTES,
};
pub use discovery::{
    snapshot_entry, DiscoveryCache, DiscoveryEntry, DEFAULT_DISCOVERY_TTL,
    DISCOVERY_CACHE_MAX_KEYS,
};
pub use error::{CacheError, Result};
pub use limits::{
    ScanConcurrencySnapshot, ScanLimiter, DEFAULT_SCAN_CONCURRENCY, SCAN_CONCURRENCY_ENV,
};
pub use paths::{
    context_dir_for_project_root, default_cache_dir, relative_display, CONTENT_CACHE_FILE_NAME,
    CONTEXT_DIR_NAME, DISCOVERY_CACHE_FILE_NAME,
};
pub use scan::{scan_files, ScannedFile};
pub use scanner::{DiscoveryQuery, FileScanner, ScanOutcome};
pub use structured::{StoredForm, StructuredCache};
