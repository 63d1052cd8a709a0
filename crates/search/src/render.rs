use crate::retrieve::RetrievalResponse;
use std::fmt::Write as _;

/// Render a response as markdown carrying the same information as the JSON form.
pub fn render_markdown(response: &RetrievalResponse) -> String {
    let mut out = String::new();
    let routing = &response.routing;
    let _ = writeln!(out, "# Context");
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Routes: {} | Contracts: {} | Escalation: {}",
        join_or_none(&routing.routes),
        join_or_none(&routing.contracts),
        routing.escalation_level
    );
    let _ = writeln!(
        out,
        "Budget: {}/{} words, limit {}",
        response.budget.used_words, response.budget.max_words, response.budget.limit
    );

    if !response.warnings.is_empty() {
        let _ = writeln!(out, "\n## Warnings\n");
        for warning in &response.warnings {
            let _ = writeln!(
                out,
                "- `{}` in {} is stale (indexed {}, now {})",
                warning.id,
                warning.source,
                short_hash(&warning.expected_hash),
                short_hash(&warning.actual_hash)
            );
        }
    }

    if !response.contracts.is_empty() {
        let _ = writeln!(out, "\n## Contracts");
        for chunk in &response.contracts {
            let _ = writeln!(out, "\n### {} ({})\n\n{}", chunk.domain, chunk.source, chunk.content);
        }
    }

    if !response.routed.is_empty() {
        let _ = writeln!(out, "\n## Routed context");
        for chunk in &response.routed {
            let _ = writeln!(
                out,
                "\n### {} depth {} ({})\n\n{}",
                chunk.route, chunk.depth, chunk.source, chunk.content
            );
        }
    }

    if let Some(design) = &response.design_system {
        let _ = writeln!(out, "\n## Design system ({})\n\n{}", design.source, design.content);
    }

    if !response.state.is_empty() {
        let _ = writeln!(out, "\n## Recent state\n");
        for entry in &response.state {
            let status = entry
                .status
                .as_deref()
                .map(|s| format!(" [{s}]"))
                .unwrap_or_default();
            let _ = writeln!(
                out,
                "- {} {}{status}: {}",
                entry.timestamp,
                entry.kind.as_str(),
                entry.display_text()
            );
        }
    }

    if let Some(ledger) = &response.ledger {
        let _ = writeln!(out, "\n## Ledger ({})\n\n{}", ledger.source, ledger.content);
    }

    let _ = writeln!(out, "\n## Sections");
    if response.selected.is_empty() {
        let _ = writeln!(out, "\nNo matching sections.");
    }
    for section in &response.selected {
        let stale = if section.stale { " (stale)" } else { "" };
        let _ = writeln!(
            out,
            "\n### {} `{}`{stale}\n\n{}:{}-{} | type {} | priority {} | score {} (stage1 {}, criticality {}) | {} words",
            section.title,
            section.id,
            section.source,
            section.start_line,
            section.end_line,
            section.section_type,
            section.priority.as_str(),
            section.score,
            section.stage1_score,
            section.criticality,
            section.words
        );
        if !section.tags.is_empty() {
            let tags: Vec<&str> = section.tags.iter().map(String::as_str).collect();
            let _ = writeln!(out, "Tags: {}", tags.join(", "));
        }
        let _ = writeln!(out, "\n{}", section.content);
    }
    out
}

fn join_or_none(values: &[String]) -> String {
    if values.is_empty() {
        "none".to_string()
    } else {
        values.join(", ")
    }
}

fn short_hash(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rank::StalenessWarning;
    use crate::retrieve::SelectedSection;
    use crate::routing::QueryRouting;
    use crate::select::WordBudget;
    use crate::sources::{StateKind, StateLogEntry};
    use context_indexer::{Priority, SectionType};

    #[test]
    fn renders_every_category() {
        let response = RetrievalResponse {
            routing: QueryRouting {
                routes: vec!["auth".into()],
                contracts: vec![],
                escalation_level: 2,
            },
            contracts: vec![],
            routed: vec![],
            design_system: None,
            state: vec![StateLogEntry {
                kind: StateKind::Decision,
                timestamp: "2024-05-01".into(),
                source: "agent".into(),
                note: "sessions".into(),
                text: "use redis".into(),
                status: Some("accepted".into()),
            }],
            ledger: None,
            selected: vec![SelectedSection {
                id: "auth-flow".into(),
                title: "Login flow".into(),
                section_type: SectionType::Flow,
                tags: ["auth".to_string()].into_iter().collect(),
                priority: Priority::High,
                source: "docs/a.md".into(),
                start_line: 3,
                end_line: 5,
                score: 15,
                stage1_score: 5,
                criticality: 3,
                stale: true,
                words: 4,
                content: "Login issues a token.".into(),
            }],
            warnings: vec![StalenessWarning {
                id: "auth-flow".into(),
                source: "docs/a.md".into(),
                expected_hash: "a".repeat(64),
                actual_hash: "b".repeat(64),
            }],
            budget: WordBudget::new(1400, 6),
        };

        let text = render_markdown(&response);
        assert!(text.contains("Routes: auth | Contracts: none | Escalation: 2"));
        assert!(text.contains("- 2024-05-01 decision [accepted]: sessions: use redis"));
        assert!(text.contains("### Login flow `auth-flow` (stale)"));
        assert!(text.contains("docs/a.md:3-5 | type flow | priority high"));
        assert!(text.contains("is stale (indexed aaaaaaaaaaaa, now bbbbbbbbbbbb)"));
        assert!(text.contains("Login issues a token."));
    }
}
