//! # Context Indexer
//!
//! Section indexing for generated project documentation.
//!
//! ## Pipeline
//!
//! ```text
//! .context/docs/
//!     │
//!     ├──> manifest.json
//!     │      └─> declared section ids per document
//!     │
//!     ├──> File discovery + content cache (bounded concurrency)
//!     │      └─> document text and digests
//!     │
//!     ├──> Marker parser (lockstep with the manifest)
//!     │      └─> sections with line ranges and content hashes
//!     │
//!     └──> index.json (atomic write)
//! ```
//!
//! Any manifest/document divergence is a [`StructuralError`] and no index is written.
//!
//! ## Example
//!
//! ```no_run
//! use context_indexer::{build_index, DocsLayout};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let layout = DocsLayout::resolve("/path/to/project").await;
//!     let report = build_index(&layout).await?;
//!
//!     println!("Indexed {} sections", report.stats.sections);
//!     Ok(())
//! }
//! ```

mod builder;
mod drift;
mod error;
mod index;
mod layout;
mod manifest;
mod markers;
mod section;
mod stats;

pub use builder::{build_index, BuildReport, DocsIndexer, DocumentDigest};
pub use drift::{verify_index, DriftReport};
pub use error::{IndexerError, Result, StructuralError};
pub use index::{IndexedDocument, SectionIndex, UpstreamPresence};
pub use layout::{
    DocsConfig, DocsLayout, CONFIG_FILE_NAME, CONTRACTS_DIR_NAME, DESIGN_PROFILE_FILE_NAME,
    DOCS_DIR_NAME, INDEX_FILE_NAME, LEDGER_FILE_NAME, MANIFEST_FILE_NAME, ROUTES_DIR_NAME,
};
pub use manifest::SectionManifest;
pub use markers::{count_markers, parse_sections};
pub use section::{content_hash, section_body, Priority, Section, SectionType};
pub use stats::IndexStats;
