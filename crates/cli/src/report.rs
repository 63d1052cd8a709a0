use context_indexer::{BuildReport, DriftReport, IndexStats, UpstreamPresence};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// JSON printed by `index`.
#[derive(Debug, Serialize)]
pub struct IndexSummary {
    pub status: &'static str,
    pub index_path: PathBuf,
    pub built_at_unix_ms: u64,
    pub documents: usize,
    pub sections: usize,
    pub reused_documents: usize,
    pub time_ms: u64,
    pub by_type: BTreeMap<String, usize>,
    pub by_priority: BTreeMap<String, usize>,
    pub by_document: BTreeMap<String, usize>,
    pub upstream: UpstreamPresence,
}

impl IndexSummary {
    pub fn from_report(report: BuildReport) -> Self {
        let IndexStats {
            documents,
            sections,
            reused_documents,
            time_ms,
            by_type,
            by_priority,
            by_document,
        } = report.stats;
        Self {
            status: "ok",
            index_path: report.index_path,
            built_at_unix_ms: report.index.built_at_unix_ms,
            documents,
            sections,
            reused_documents,
            time_ms,
            by_type,
            by_priority,
            by_document,
            upstream: report.index.upstream,
        }
    }
}

/// JSON printed by `check`.
#[derive(Debug, Serialize)]
pub struct CheckSummary {
    pub status: &'static str,
    pub sections: usize,
    pub drifted: usize,
    pub drift: Vec<DriftReport>,
}

impl CheckSummary {
    pub fn new(sections: usize, drift: Vec<DriftReport>) -> Self {
        Self {
            status: if drift.is_empty() { "ok" } else { "drift" },
            sections,
            drifted: drift.len(),
            drift,
        }
    }

    pub fn has_drift(&self) -> bool {
        self.drifted > 0
    }
}
