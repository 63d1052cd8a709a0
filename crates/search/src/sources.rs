//! Optional, externally produced inputs read at retrieval time.
//!
//! None of these are required: a file that does not exist (or cannot be read) is simply not
//! available and never fails retrieval.

use crate::routing::QueryRouting;
use context_cache::relative_display;
use context_indexer::DocsLayout;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RoutedContextChunk {
    pub route: String,
    pub depth: u8,
    pub source: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ContractChunk {
    pub domain: String,
    pub source: String,
    pub content: String,
}

/// A whole auxiliary document (design-profile summary or ledger).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AuxDocument {
    pub source: String,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StateKind {
    Decision,
    Hypothesis,
}

impl StateKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Decision => "decision",
            Self::Hypothesis => "hypothesis",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StateLogEntry {
    pub kind: StateKind,
    pub timestamp: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl StateLogEntry {
    /// Text counted against the word budget and shown to the caller.
    pub fn display_text(&self) -> String {
        match (self.note.trim(), self.text.trim()) {
            ("", text) => text.to_string(),
            (note, "") => note.to_string(),
            (note, text) => format!("{note}: {text}"),
        }
    }
}

async fn read_optional(path: &Path) -> Option<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => Some(text),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
        Err(err) => {
            log::warn!("Treating {} as unavailable: {err}", path.display());
            None
        }
    }
}

/// Routed files for every selected route, depths `1..=tier`, in route then depth order.
pub async fn load_routed(layout: &DocsLayout, routing: &QueryRouting) -> Vec<RoutedContextChunk> {
    let mut chunks = Vec::new();
    for route in &routing.routes {
        for depth in routing.depths() {
            let path = layout.route_file(route, depth);
            let Some(text) = read_optional(&path).await else {
                log::debug!("No routed context for {route} at depth {depth}");
                continue;
            };
            let content = text.trim();
            if content.is_empty() {
                continue;
            }
            chunks.push(RoutedContextChunk {
                route: route.clone(),
                depth,
                source: relative_display(&layout.root, &path),
                content: content.to_string(),
            });
        }
    }
    chunks
}

pub async fn load_contracts(layout: &DocsLayout, routing: &QueryRouting) -> Vec<ContractChunk> {
    let mut chunks = Vec::new();
    for domain in &routing.contracts {
        let path = layout.contract_file(domain);
        let Some(text) = read_optional(&path).await else {
            log::debug!("No contract chunk for {domain}");
            continue;
        };
        let content = text.trim();
        if content.is_empty() {
            continue;
        }
        chunks.push(ContractChunk {
            domain: domain.clone(),
            source: relative_display(&layout.root, &path),
            content: content.to_string(),
        });
    }
    chunks
}

/// The first `design_summary_max_lines` lines of the trimmed design profile.
pub async fn load_design_summary(layout: &DocsLayout) -> Option<AuxDocument> {
    let path = layout.design_profile_path();
    let text = read_optional(&path).await?;
    let content = text
        .trim()
        .lines()
        .take(layout.design_summary_max_lines)
        .collect::<Vec<_>>()
        .join("\n");
    (!content.is_empty()).then(|| AuxDocument {
        source: relative_display(&layout.root, &path),
        content,
    })
}

pub async fn load_ledger(layout: &DocsLayout) -> Option<AuxDocument> {
    let path = layout.ledger_path();
    let text = read_optional(&path).await?;
    let content = text.trim();
    (!content.is_empty()).then(|| AuxDocument {
        source: relative_display(&layout.root, &path),
        content: content.to_string(),
    })
}

/// The most recent `state_window` valid entries of the state log, newest first.
pub async fn load_state(layout: &DocsLayout) -> Vec<StateLogEntry> {
    let Some(text) = read_optional(&layout.state_log).await else {
        return Vec::new();
    };
    parse_state_log(&text, layout.state_window)
}

/// Parse JSONL state, keeping the last `window` valid entries in reverse file order.
pub fn parse_state_log(text: &str, window: usize) -> Vec<StateLogEntry> {
    let lines: Vec<&str> = text.lines().collect();
    let mut entries = Vec::new();
    for (idx, line) in lines.iter().enumerate().rev() {
        if entries.len() >= window {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<StateLogEntry>(line) {
            Ok(entry) => entries.push(entry),
            Err(err) => log::debug!("Skipping state log line {}: {err}", idx + 1),
        }
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::RoutingClassifier;
    use crate::tokenize::tokenize;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn write(root: &Path, rel: &str, body: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }

    fn entry(n: usize) -> String {
        format!(
            r#"{{"kind":"decision","timestamp":"2024-01-0{n}","source":"agent","note":"n{n}","text":"t{n}"}}"#
        )
    }

    #[test]
    fn state_log_keeps_newest_valid_entries() {
        let mut lines: Vec<String> = (1..=5).map(entry).collect();
        lines.insert(3, "{not json".to_string());
        lines.push(r#"{"kind":"rumor","timestamp":"x"}"#.to_string());
        let parsed = parse_state_log(&lines.join("\n"), 3);

        let notes: Vec<&str> = parsed.iter().map(|e| e.note.as_str()).collect();
        assert_eq!(notes, vec!["n5", "n4", "n3"]);
        assert_eq!(parsed[0].display_text(), "n5: t5");
    }

    #[tokio::test]
    async fn routed_files_follow_route_then_depth() {
        let temp = tempdir().unwrap();
        let layout = DocsLayout::new(temp.path());
        write(temp.path(), ".context/docs/routes/auth/depth-1.md", "auth one\n");
        write(temp.path(), ".context/docs/routes/auth/depth-2.md", "auth two");
        write(temp.path(), ".context/docs/routes/auth/depth-3.md", "auth three");
        write(temp.path(), ".context/docs/routes/db/depth-1.md", "db one");

        let routing = RoutingClassifier::classify(&tokenize("change login db"), None, None);
        assert_eq!(routing.escalation_level, 2);
        let routed = load_routed(&layout, &routing).await;

        let got: Vec<(&str, u8)> = routed.iter().map(|c| (c.route.as_str(), c.depth)).collect();
        assert_eq!(got, vec![("auth", 1), ("auth", 2), ("db", 1)]);
        assert_eq!(routed[0].content, "auth one");
        assert_eq!(routed[0].source, ".context/docs/routes/auth/depth-1.md");
    }

    #[tokio::test]
    async fn absent_inputs_are_not_errors() {
        let temp = tempdir().unwrap();
        let layout = DocsLayout::new(temp.path());
        let routing = RoutingClassifier::classify(&tokenize("login endpoint"), None, None);

        assert!(load_routed(&layout, &routing).await.is_empty());
        assert!(load_contracts(&layout, &routing).await.is_empty());
        assert!(load_design_summary(&layout).await.is_none());
        assert!(load_ledger(&layout).await.is_none());
        assert!(load_state(&layout).await.is_empty());
    }

    #[tokio::test]
    async fn design_summary_is_truncated() {
        let temp = tempdir().unwrap();
        let layout = DocsLayout::new(temp.path());
        let body: String = (1..=60).map(|i| format!("line {i}\n")).collect();
        write(temp.path(), ".context/docs/design-profile.md", &format!("\n\n{body}"));

        let summary = load_design_summary(&layout).await.unwrap();
        assert_eq!(summary.content.lines().count(), 40);
        assert!(summary.content.starts_with("line 1\n"));
        assert!(summary.content.ends_with("line 40"));
    }
}
