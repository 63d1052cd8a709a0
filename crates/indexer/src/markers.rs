//! Section marker parsing and manifest cross-validation.
//!
//! ```text
//! <!-- section:start id="auth-flow" title="Auth flow" type="flow" tags="auth,session" priority="high" -->
//! ...body...
//! <!-- section:end id="auth-flow" -->
//! ```
//!
//! Parsing is two steps: lex every marker line, then pair and validate. The result is either
//! the full ordered section list or the first structural defect in document order.

use crate::error::StructuralError;
use crate::section::{content_hash, section_body, Priority, Section, SectionType};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MarkerKind {
    Start,
    End,
}

#[derive(Debug, Clone)]
struct Marker {
    kind: MarkerKind,
    id: String,
    attrs: BTreeMap<String, String>,
    line: usize,
}

fn marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*<!--\s*section:(start|end)\b(.*?)-->\s*$").expect("valid marker regex")
    })
}

fn attr_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"([A-Za-z_][A-Za-z0-9_-]*)\s*=\s*"([^"]*)""#).expect("valid attribute regex")
    })
}

fn lex_line(document: &str, line: &str, line_no: usize) -> Result<Option<Marker>, StructuralError> {
    if !line.contains("section:") {
        return Ok(None);
    }
    let Some(caps) = marker_regex().captures(line) else {
        if line.trim_start().starts_with("<!--")
            && (line.contains("section:start") || line.contains("section:end"))
        {
            return Err(StructuralError::MalformedMarker {
                document: document.to_string(),
                line: line_no,
                reason: "marker must be a single `<!-- section:start|end ... -->` line".into(),
            });
        }
        return Ok(None);
    };

    let kind = if &caps[1] == "start" {
        MarkerKind::Start
    } else {
        MarkerKind::End
    };
    let mut attrs = BTreeMap::new();
    for attr in attr_regex().captures_iter(&caps[2]) {
        attrs.insert(attr[1].to_ascii_lowercase(), attr[2].to_string());
    }
    let id = attrs
        .get("id")
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| StructuralError::MalformedMarker {
            document: document.to_string(),
            line: line_no,
            reason: "missing `id` attribute".into(),
        })?;

    Ok(Some(Marker {
        kind,
        id,
        attrs,
        line: line_no,
    }))
}

fn lex(document: &str, text: &str) -> Result<Vec<Marker>, StructuralError> {
    let mut markers = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        if let Some(marker) = lex_line(document, line, idx + 1)? {
            markers.push(marker);
        }
    }
    Ok(markers)
}

/// Parse `text` (the document at `document`, a root-relative path) into sections and check it
/// against the manifest ids declared for that document.
pub fn parse_sections(
    document: &str,
    text: &str,
    manifest_ids: &[String],
) -> Result<Vec<Section>, StructuralError> {
    let markers = lex(document, text)?;

    // Pair markers per id, remembering first-appearance order for deterministic reporting.
    let mut order: Vec<&str> = Vec::new();
    let mut starts: HashMap<&str, Vec<&Marker>> = HashMap::new();
    let mut ends: HashMap<&str, Vec<&Marker>> = HashMap::new();
    for marker in &markers {
        let id = marker.id.as_str();
        if !starts.contains_key(id) && !ends.contains_key(id) {
            order.push(id);
        }
        let bucket = match marker.kind {
            MarkerKind::Start => starts.entry(id).or_default(),
            MarkerKind::End => ends.entry(id).or_default(),
        };
        bucket.push(marker);
    }

    let mut pairs: Vec<(&Marker, &Marker)> = Vec::new();
    for id in &order {
        let id_starts = starts.get(id).map(Vec::as_slice).unwrap_or_default();
        let id_ends = ends.get(id).map(Vec::as_slice).unwrap_or_default();

        for dupes in [id_starts, id_ends] {
            if let [first, second, ..] = dupes {
                return Err(StructuralError::DuplicateId {
                    document: document.to_string(),
                    id: id.to_string(),
                    first_line: first.line,
                    second_line: second.line,
                });
            }
        }

        match (id_starts.first(), id_ends.first()) {
            (Some(start), Some(end)) if end.line < start.line => {
                return Err(StructuralError::InvertedRange {
                    document: document.to_string(),
                    id: id.to_string(),
                    start_line: start.line,
                    end_line: end.line,
                });
            }
            (Some(start), Some(end)) => pairs.push((*start, *end)),
            (Some(start), None) => {
                return Err(StructuralError::UnclosedSection {
                    document: document.to_string(),
                    id: id.to_string(),
                    line: start.line,
                });
            }
            (None, Some(end)) => {
                return Err(StructuralError::UnpairedEnd {
                    document: document.to_string(),
                    id: id.to_string(),
                    line: end.line,
                });
            }
            (None, None) => {}
        }
    }

    pairs.sort_by_key(|(start, _)| start.line);
    for window in pairs.windows(2) {
        let (outer_start, outer_end) = window[0];
        let (inner_start, _) = window[1];
        if inner_start.line < outer_end.line {
            return Err(StructuralError::NestedSection {
                document: document.to_string(),
                outer: outer_start.id.clone(),
                inner: inner_start.id.clone(),
                line: inner_start.line,
            });
        }
    }

    let found: HashSet<&str> = pairs.iter().map(|(start, _)| start.id.as_str()).collect();
    if let Some(missing) = manifest_ids.iter().find(|id| !found.contains(id.as_str())) {
        return Err(StructuralError::MissingSection {
            document: document.to_string(),
            id: missing.clone(),
        });
    }

    let declared: HashSet<&str> = manifest_ids.iter().map(String::as_str).collect();
    let mut sections = Vec::with_capacity(pairs.len());
    for (start, end) in pairs {
        if !declared.contains(start.id.as_str()) {
            log::warn!(
                "{document}: section `{}` is not declared in the manifest",
                start.id
            );
        }
        sections.push(build_section(document, text, start, end));
    }
    Ok(sections)
}

fn build_section(document: &str, text: &str, start: &Marker, end: &Marker) -> Section {
    let attr = |key: &str| start.attrs.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

    let section_type = match attr("type") {
        None => SectionType::Other,
        Some(raw) => SectionType::parse(raw).unwrap_or_else(|| {
            log::warn!(
                "{document}:{}: unknown section type `{raw}` for `{}`, using `other`",
                start.line,
                start.id
            );
            SectionType::Other
        }),
    };
    let priority = match attr("priority") {
        None => Priority::default(),
        Some(raw) => Priority::parse(raw).unwrap_or_else(|| {
            log::warn!(
                "{document}:{}: unknown priority `{raw}` for `{}`, using `medium`",
                start.line,
                start.id
            );
            Priority::default()
        }),
    };
    let tags: BTreeSet<String> = attr("tags")
        .map(|raw| {
            raw.split(',')
                .map(|tag| tag.trim().to_lowercase())
                .filter(|tag| !tag.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let body = section_body(text, start.line, end.line);
    Section {
        id: start.id.clone(),
        title: attr("title").unwrap_or(start.id.as_str()).to_string(),
        section_type,
        tags,
        priority,
        source: document.to_string(),
        start_line: start.line,
        end_line: end.line,
        content_hash: content_hash(&body),
    }
}

/// Number of well-formed marker lines in `text`. Used for document digests.
pub fn count_markers(text: &str) -> usize {
    text.lines()
        .filter(|line| marker_regex().is_match(line))
        .count()
}
