use crate::index::SectionIndex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Statistics about an index build
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexStats {
    /// Number of documents indexed
    pub documents: usize,

    /// Number of sections indexed
    pub sections: usize,

    /// Documents served from the content cache without a read
    pub reused_documents: usize,

    /// Time taken in milliseconds
    pub time_ms: u64,

    /// Sections per section type
    pub by_type: BTreeMap<String, usize>,

    /// Sections per priority
    pub by_priority: BTreeMap<String, usize>,

    /// Sections per source document
    pub by_document: BTreeMap<String, usize>,
}

impl IndexStats {
    pub fn from_index(index: &SectionIndex) -> Self {
        let mut stats = Self {
            documents: index.documents.len(),
            ..Self::default()
        };
        for section in &index.sections {
            stats.add_section(
                section.section_type.as_str(),
                section.priority.as_str(),
                &section.source,
            );
        }
        stats
    }

    pub fn add_section(&mut self, section_type: &str, priority: &str, source: &str) {
        self.sections += 1;
        *self.by_type.entry(section_type.to_string()).or_insert(0) += 1;
        *self.by_priority.entry(priority.to_string()).or_insert(0) += 1;
        *self.by_document.entry(source.to_string()).or_insert(0) += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::section::{Priority, Section, SectionType};
    use pretty_assertions::assert_eq;

    fn section(id: &str, kind: SectionType, priority: Priority, source: &str) -> Section {
        Section {
            id: id.into(),
            title: id.into(),
            section_type: kind,
            tags: Default::default(),
            priority,
            source: source.into(),
            start_line: 1,
            end_line: 2,
            content_hash: String::new(),
        }
    }

    #[test]
    fn counts_by_type_priority_and_document() {
        let mut index = SectionIndex::new(0);
        index.sections = vec![
            section("a", SectionType::Flow, Priority::High, "x.md"),
            section("b", SectionType::Flow, Priority::Medium, "x.md"),
            section("c", SectionType::Api, Priority::High, "y.md"),
        ];

        let stats = IndexStats::from_index(&index);
        assert_eq!(stats.sections, 3);
        assert_eq!(stats.by_type.get("flow"), Some(&2));
        assert_eq!(stats.by_priority.get("high"), Some(&2));
        assert_eq!(stats.by_document.get("y.md"), Some(&1));
    }
}
