use crate::section::Section;
use crate::{IndexerError, Result};
use context_cache::atomic_write;
use context_protocol::INDEX_SCHEMA_VERSION;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which optional upstream inputs existed when the index was built.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct UpstreamPresence {
    pub routes: bool,
    pub contracts: bool,
    pub design_profile: bool,
    pub ledger: bool,
    pub state_log: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct IndexedDocument {
    /// Path relative to the project root.
    pub path: String,
    pub content_hash: String,
    pub sections: usize,
}

/// The authoritative manifest of sections. Rebuilt wholesale on every build.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct SectionIndex {
    pub schema_version: u32,
    pub built_at_unix_ms: u64,
    #[serde(default)]
    pub documents: Vec<IndexedDocument>,
    #[serde(default)]
    pub upstream: UpstreamPresence,
    pub sections: Vec<Section>,
}

impl SectionIndex {
    pub fn new(built_at_unix_ms: u64) -> Self {
        Self {
            schema_version: INDEX_SCHEMA_VERSION,
            built_at_unix_ms,
            documents: Vec::new(),
            upstream: UpstreamPresence::default(),
            sections: Vec::new(),
        }
    }

    pub fn section(&self, id: &str) -> Option<&Section> {
        self.sections.iter().find(|section| section.id == id)
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(self)?;
        atomic_write(path, &bytes).await?;
        Ok(())
    }

    /// Load an index. A missing file is `IndexMissing`: retrieval has nothing to rank.
    pub async fn load(path: &Path) -> Result<Self> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(IndexerError::IndexMissing(path.to_path_buf()));
            }
            Err(err) => return Err(err.into()),
        };
        let index: Self = serde_json::from_slice(&bytes)?;
        if index.schema_version != INDEX_SCHEMA_VERSION {
            return Err(IndexerError::Other(format!(
                "index schema version {} is not supported (expected {INDEX_SCHEMA_VERSION}); rebuild the index",
                index.schema_version
            )));
        }
        Ok(index)
    }
}
