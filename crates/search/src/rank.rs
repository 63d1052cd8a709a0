use crate::error::{Result, SearchError};
use crate::tokenize::word_set;
use context_indexer::{content_hash, section_body, Section, SectionIndex, SectionType};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Terms that mark a section as risky to get wrong.
pub const RISK_TERMS: &[&str] = &[
    "invariant",
    "constraint",
    "edge case",
    "migration",
    "contract",
    "decision",
    "rollback",
];

const RISK_IN_METADATA: u32 = 4;
const RISK_IN_BODY: u32 = 2;
const HIGH_PRIORITY_BONUS: u32 = 1;
const METADATA_HIT_WEIGHT: u32 = 3;

#[derive(Debug, Clone, Default)]
pub struct SectionFilter {
    pub section_type: Option<SectionType>,
    /// Every tag must be present on the section.
    pub tags: Vec<String>,
}

impl SectionFilter {
    pub fn matches(&self, section: &Section) -> bool {
        if self
            .section_type
            .is_some_and(|kind| kind != section.section_type)
        {
            return false;
        }
        self.tags
            .iter()
            .all(|tag| section.tags.contains(&tag.trim().to_lowercase()))
    }
}

#[derive(Debug, Clone)]
pub struct Stage1Hit<'a> {
    pub section: &'a Section,
    pub score: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StalenessWarning {
    pub id: String,
    pub source: String,
    pub expected_hash: String,
    pub actual_hash: String,
}

#[derive(Debug, Clone)]
pub struct RankedSection {
    pub section: Section,
    pub body: String,
    pub stage1_score: u32,
    pub criticality: u32,
    pub score: u32,
    pub stale: bool,
}

/// Text prepared for term matching. Single-word terms match whole words only; phrases such as
/// `edge case` match as substrings of the lower-cased text.
#[derive(Debug, Clone)]
pub struct MatchText {
    lower: String,
    words: HashSet<String>,
}

impl MatchText {
    pub fn new(text: &str) -> Self {
        Self {
            lower: text.to_lowercase(),
            words: word_set(text),
        }
    }

    pub fn has_term(&self, term: &str) -> bool {
        if term.contains(char::is_whitespace) {
            self.lower.contains(term)
        } else {
            self.words.contains(term)
        }
    }

    /// Number of query tokens present as words.
    pub fn count_hits(&self, tokens: &[String]) -> u32 {
        tokens
            .iter()
            .filter(|token| self.words.contains(token.as_str()))
            .count() as u32
    }
}

/// Metadata-only scoring over the whole index. Keeps the best `keep`.
pub fn stage_one<'a>(
    index: &'a SectionIndex,
    tokens: &[String],
    filter: &SectionFilter,
    keep: usize,
) -> Vec<Stage1Hit<'a>> {
    let mut hits: Vec<Stage1Hit<'a>> = index
        .sections
        .iter()
        .filter(|section| filter.matches(section))
        .map(|section| Stage1Hit {
            section,
            score: section.priority.weight()
                + METADATA_HIT_WEIGHT * MatchText::new(&section.metadata_text()).count_hits(tokens),
        })
        .collect();

    hits.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.section.id.cmp(&b.section.id))
            .then_with(|| a.section.start_line.cmp(&b.section.start_line))
    });
    hits.truncate(keep);
    hits
}

/// Per risk term: found in metadata, else found in body. High priority adds a point.
pub fn criticality(section: &Section, metadata: &MatchText, body: &MatchText) -> u32 {
    let mut score: u32 = RISK_TERMS
        .iter()
        .map(|term| {
            if metadata.has_term(term) {
                RISK_IN_METADATA
            } else if body.has_term(term) {
                RISK_IN_BODY
            } else {
                0
            }
        })
        .sum();
    if section.priority == context_indexer::Priority::High {
        score += HIGH_PRIORITY_BONUS;
    }
    score
}

/// Recover each candidate's body from the live document, flag hash drift, and rescore.
///
/// A source document that no longer exists is a hard error; a changed one is only stale.
pub async fn stage_two(
    root: &Path,
    hits: &[Stage1Hit<'_>],
    tokens: &[String],
) -> Result<(Vec<RankedSection>, Vec<StalenessWarning>)> {
    let mut documents: HashMap<&str, String> = HashMap::new();
    let mut ranked = Vec::with_capacity(hits.len());
    let mut warnings = Vec::new();

    for hit in hits {
        let section = hit.section;
        if !documents.contains_key(section.source.as_str()) {
            let text = match tokio::fs::read_to_string(root.join(&section.source)).await {
                Ok(text) => text,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    return Err(SearchError::SourceMissing(section.source.clone()));
                }
                Err(err) => return Err(err.into()),
            };
            documents.insert(section.source.as_str(), text);
        }
        let text = documents
            .get(section.source.as_str())
            .map(String::as_str)
            .unwrap_or_default();

        let body = section_body(text, section.start_line, section.end_line);
        let actual_hash = content_hash(&body);
        let stale = actual_hash != section.content_hash;
        if stale {
            log::warn!(
                "Section `{}` in {} changed since the index was built",
                section.id,
                section.source
            );
            warnings.push(StalenessWarning {
                id: section.id.clone(),
                source: section.source.clone(),
                expected_hash: section.content_hash.clone(),
                actual_hash,
            });
        }

        let body_text = MatchText::new(&body);
        let metadata = MatchText::new(&section.metadata_text());
        let criticality = criticality(section, &metadata, &body_text);
        let score = 2 * hit.score + 2 * body_text.count_hits(tokens) + criticality;
        ranked.push(RankedSection {
            section: section.clone(),
            body: body.trim().to_string(),
            stage1_score: hit.score,
            criticality,
            score,
            stale,
        });
    }

    ranked.sort_by(compare_ranked);
    Ok((ranked, warnings))
}

fn compare_ranked(a: &RankedSection, b: &RankedSection) -> Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| b.criticality.cmp(&a.criticality))
        .then_with(|| b.stage1_score.cmp(&a.stage1_score))
        .then_with(|| a.section.id.cmp(&b.section.id))
        .then_with(|| a.section.start_line.cmp(&b.section.start_line))
}

#[cfg(test)]
mod tests {
    use super::*;
    use context_indexer::{parse_sections, Priority};
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    const DOC: &str = r#"<!-- section:start id="auth-flow" title="Login flow" type="flow" tags="auth" priority="high" -->
Login issues a session token. Invariant: tokens expire after one hour.
<!-- section:end id="auth-flow" -->
<!-- section:start id="db-schema" title="Schema" type="schema" tags="db" priority="low" -->
Users table with a migration history.
<!-- section:end id="db-schema" -->
<!-- section:start id="notes" title="Notes" type="other" -->
General notes about login.
<!-- section:end id="notes" -->
"#;

    fn tokens(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    fn index() -> SectionIndex {
        let mut index = SectionIndex::new(0);
        index.sections = parse_sections("docs/a.md", DOC, &[]).unwrap();
        index
    }

    #[test]
    fn stage_one_scores_priority_and_metadata() {
        let index = index();
        let hits = stage_one(&index, &tokens(&["login", "schema"]), &SectionFilter::default(), 24);
        let scored: Vec<(&str, u32)> = hits.iter().map(|h| (h.section.id.as_str(), h.score)).collect();
        assert_eq!(
            scored,
            vec![("auth-flow", 5), ("db-schema", 3), ("notes", 1)]
        );
    }

    #[test]
    fn stage_one_ties_break_by_id_and_truncate() {
        let index = index();
        let hits = stage_one(&index, &tokens(&["zzz"]), &SectionFilter::default(), 2);
        let ids: Vec<&str> = hits.iter().map(|h| h.section.id.as_str()).collect();
        assert_eq!(ids, vec!["auth-flow", "notes"]);
    }

    #[test]
    fn filters_by_type_and_all_tags() {
        let index = index();
        let filter = SectionFilter {
            section_type: Some(SectionType::Schema),
            tags: vec![],
        };
        let hits = stage_one(&index, &tokens(&["users"]), &filter, 24);
        assert_eq!(hits.len(), 1);

        let filter = SectionFilter {
            section_type: None,
            tags: vec!["auth".into(), "db".into()],
        };
        assert!(stage_one(&index, &tokens(&["users"]), &filter, 24).is_empty());
    }

    #[test]
    fn criticality_prefers_metadata_over_body() {
        let index = index();
        let flow = index.section("auth-flow").unwrap();
        // "invariant" only in body (+2), high priority (+1).
        let metadata = MatchText::new(&flow.metadata_text());
        assert_eq!(
            criticality(flow, &metadata, &MatchText::new("Invariant: tokens expire")),
            3
        );

        let mut decision = flow.clone();
        decision.id = "decision-log".into();
        decision.priority = Priority::Low;
        // "decision" in metadata (+4) and body is ignored for that term; "rollback" in body (+2).
        let metadata = MatchText::new(&decision.metadata_text());
        assert_eq!(
            criticality(&decision, &metadata, &MatchText::new("decision and rollback")),
            6
        );
    }

    #[test]
    fn criticality_matches_phrases_but_not_word_fragments() {
        let index = index();
        let mut notes = index.section("notes").unwrap().clone();
        notes.priority = Priority::Low;
        let metadata = MatchText::new(&notes.metadata_text());
        // "edge case" is a phrase (+2); "contractor" and "decisions" are other words.
        assert_eq!(
            criticality(
                &notes,
                &metadata,
                &MatchText::new("One edge case: the contractor logs decisions.")
            ),
            2
        );
    }

    #[test]
    fn tokens_match_whole_words_and_tags_only() {
        let doc = r#"<!-- section:start id="build-pipeline" title="Feedback loop" priority="low" -->
Runs on every push.
<!-- section:end id="build-pipeline" -->
"#;
        let mut index = SectionIndex::new(0);
        index.sections = parse_sections("docs/b.md", doc, &[]).unwrap();

        let hits = stage_one(&index, &tokens(&["ui", "db"]), &SectionFilter::default(), 24);
        assert_eq!(hits[0].score, 0);

        let hits = stage_one(&index, &tokens(&["build", "loop"]), &SectionFilter::default(), 24);
        assert_eq!(hits[0].score, 6);
    }

    #[tokio::test]
    async fn stage_two_rescores_and_flags_drift() {
        let temp = tempdir().unwrap();
        std::fs::create_dir_all(temp.path().join("docs")).unwrap();
        std::fs::write(
            temp.path().join("docs/a.md"),
            DOC.replace("Users table", "Accounts table"),
        )
        .unwrap();

        let index = index();
        let query = tokens(&["login", "migration"]);
        let hits = stage_one(&index, &query, &SectionFilter::default(), 24);
        let (ranked, warnings) = stage_two(temp.path(), &hits, &query).await.unwrap();

        let ids: Vec<&str> = ranked.iter().map(|r| r.section.id.as_str()).collect();
        assert_eq!(ids, vec!["auth-flow", "db-schema", "notes"]);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].id, "db-schema");
        assert!(ranked[1].stale);
        assert!(ranked[1].body.starts_with("Accounts table"));

        // auth-flow: stage1 = 2 + 3 = 5; body hits: login = 1; criticality: invariant body +2,
        // high +1 = 3. final = 10 + 2 + 3.
        assert_eq!(ranked[0].score, 15);
        assert_eq!(ranked[0].criticality, 3);
    }

    #[tokio::test]
    async fn missing_source_is_a_hard_error() {
        let temp = tempdir().unwrap();
        let index = index();
        let query = tokens(&["login"]);
        let hits = stage_one(&index, &query, &SectionFilter::default(), 24);
        let err = stage_two(temp.path(), &hits, &query).await.unwrap_err();
        assert!(matches!(err, SearchError::SourceMissing(source) if source == "docs/a.md"));
    }
}
