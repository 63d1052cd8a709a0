use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SectionType {
    Overview,
    Architecture,
    Module,
    Api,
    Schema,
    Flow,
    Config,
    Decision,
    Reference,
    Other,
}

impl SectionType {
    pub const ALL: [SectionType; 10] = [
        Self::Overview,
        Self::Architecture,
        Self::Module,
        Self::Api,
        Self::Schema,
        Self::Flow,
        Self::Config,
        Self::Decision,
        Self::Reference,
        Self::Other,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Overview => "overview",
            Self::Architecture => "architecture",
            Self::Module => "module",
            Self::Api => "api",
            Self::Schema => "schema",
            Self::Flow => "flow",
            Self::Config => "config",
            Self::Decision => "decision",
            Self::Reference => "reference",
            Self::Other => "other",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(raw))
    }
}

impl std::fmt::Display for SectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    pub const fn weight(self) -> u32 {
        match self {
            Self::High => 2,
            Self::Medium => 1,
            Self::Low => 0,
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }
}

/// A delimited, independently addressable unit of generated documentation.
///
/// `start_line` and `end_line` are the 1-based lines of the start and end markers; the body is
/// the text strictly between them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct Section {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub section_type: SectionType,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub priority: Priority,
    pub source: String,
    pub start_line: usize,
    pub end_line: usize,
    pub content_hash: String,
}

impl Section {
    /// Lower-cased `id title type tags` haystack used for metadata matching.
    pub fn metadata_text(&self) -> String {
        let mut out = format!("{} {} {}", self.id, self.title, self.section_type.as_str());
        for tag in &self.tags {
            out.push(' ');
            out.push_str(tag);
        }
        out.to_lowercase()
    }
}

/// Hex SHA-256 of the trimmed body.
pub fn content_hash(body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body.trim().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Text strictly between the marker lines `start_line` and `end_line` (1-based). Lines past
/// the end of `text` are ignored, so a shrunken document yields a shorter body rather than an
/// error.
pub fn section_body(text: &str, start_line: usize, end_line: usize) -> String {
    if end_line <= start_line + 1 {
        return String::new();
    }
    text.lines()
        .skip(start_line)
        .take(end_line - start_line - 1)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn body_excludes_marker_lines() {
        let text = "intro\n<!-- start -->\nline one\nline two\n<!-- end -->\noutro";
        assert_eq!(section_body(text, 2, 5), "line one\nline two");
        assert_eq!(section_body(text, 2, 3), "");
    }

    #[test]
    fn body_clamps_to_document_length() {
        let text = "<!-- start -->\nonly";
        assert_eq!(section_body(text, 1, 10), "only");
    }

    #[test]
    fn hash_ignores_surrounding_whitespace() {
        assert_eq!(content_hash("  body\n\n"), content_hash("body"));
        assert_ne!(content_hash("body"), content_hash("Body"));
        assert_eq!(content_hash("").len(), 64);
    }

    #[test]
    fn parses_enumerations_case_insensitively() {
        assert_eq!(SectionType::parse("Flow"), Some(SectionType::Flow));
        assert_eq!(SectionType::parse("nope"), None);
        assert_eq!(Priority::parse("HIGH"), Some(Priority::High));
        assert_eq!(Priority::High.weight(), 2);
        assert_eq!(Priority::Low.weight(), 0);
    }
}
