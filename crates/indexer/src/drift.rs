use crate::index::SectionIndex;
use crate::section::{content_hash, section_body};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// A section whose live text no longer matches the hash recorded at build time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DriftReport {
    pub id: String,
    pub source: String,
    pub expected_hash: String,
    /// `None` when the source document could not be read.
    pub actual_hash: Option<String>,
    #[serde(default)]
    pub missing_source: bool,
}

/// Recompute every section hash from its recorded line range and report the mismatches.
///
/// Each source document is read once. Reports follow index order.
pub async fn verify_index(root: &Path, index: &SectionIndex) -> Vec<DriftReport> {
    let mut documents: HashMap<&str, Option<String>> = HashMap::new();
    let mut drift = Vec::new();

    for section in &index.sections {
        if !documents.contains_key(section.source.as_str()) {
            let text = match tokio::fs::read_to_string(root.join(&section.source)).await {
                Ok(text) => Some(text),
                Err(err) => {
                    log::debug!("Drift check cannot read {}: {err}", section.source);
                    None
                }
            };
            documents.insert(section.source.as_str(), text);
        }

        let report = match documents.get(section.source.as_str()).and_then(Option::as_ref) {
            None => Some(DriftReport {
                id: section.id.clone(),
                source: section.source.clone(),
                expected_hash: section.content_hash.clone(),
                actual_hash: None,
                missing_source: true,
            }),
            Some(text) => {
                let actual = content_hash(&section_body(text, section.start_line, section.end_line));
                (actual != section.content_hash).then(|| DriftReport {
                    id: section.id.clone(),
                    source: section.source.clone(),
                    expected_hash: section.content_hash.clone(),
                    actual_hash: Some(actual),
                    missing_source: false,
                })
            }
        };
        drift.extend(report);
    }

    if !drift.is_empty() {
        log::warn!("{} indexed sections drifted from their sources", drift.len());
    }
    drift
}
