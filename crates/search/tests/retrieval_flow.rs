use context_indexer::{build_index, DocsLayout, IndexerError, SectionType};
use context_search::{retrieve, word_count, RetrievalRequest, RetrievalResponse, SearchError};
use pretty_assertions::assert_eq;
use std::path::Path;
use tempfile::TempDir;

const ARCHITECTURE: &str = r#"# Architecture

<!-- section:start id="auth-flow" title="Login flow" type="flow" tags="auth,session" priority="high" -->
Login issues a session token. Invariant: a token expires after one hour.
<!-- section:end id="auth-flow" -->

<!-- section:start id="db-schema" title="Database schema" type="schema" tags="db" -->
Users and sessions tables. Every migration needs a rollback plan.
<!-- section:end id="db-schema" -->

<!-- section:start id="ui-theme" title="Theme" type="reference" tags="ui,design,spacing" priority="low" -->
Spacing and typography tokens for the design system.
<!-- section:end id="ui-theme" -->
"#;

fn write(root: &Path, rel: &str, body: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    std::fs::write(path, body).expect("write");
}

async fn seed() -> (TempDir, DocsLayout) {
    let temp = TempDir::new().expect("tempdir");
    write(temp.path(), ".context/docs/architecture.md", ARCHITECTURE);
    write(
        temp.path(),
        ".context/docs/manifest.json",
        r#"{"documents": {"architecture.md": ["auth-flow", "db-schema", "ui-theme"]}}"#,
    );
    write(
        temp.path(),
        ".context/docs/contracts/auth.md",
        "Sessions are validated on every request.",
    );
    write(temp.path(), ".context/docs/routes/auth/depth-1.md", "Auth lives in the gateway.");
    write(temp.path(), ".context/docs/routes/auth/depth-2.md", "Token refresh details.");
    write(temp.path(), ".context/docs/design-profile.md", "Use the 8px grid.");
    write(temp.path(), ".context/docs/ledger.md", "2024: moved sessions to redis.");
    write(
        temp.path(),
        ".context/state/log.jsonl",
        concat!(
            r#"{"kind":"decision","timestamp":"t1","source":"a","note":"old","text":"first"}"#,
            "\n",
            r#"{"kind":"hypothesis","timestamp":"t2","source":"a","note":"new","text":"second","status":"open"}"#,
            "\n"
        ),
    );
    let layout = DocsLayout::new(temp.path());
    build_index(&layout).await.expect("build index");
    (temp, layout)
}

#[tokio::test]
async fn session_token_query_pulls_auth_context_first() {
    let (_temp, layout) = seed().await;
    let response = retrieve(&layout, &RetrievalRequest::new("session token expired"))
        .await
        .expect("retrieve");

    assert_eq!(response.routing.routes, vec!["auth"]);
    assert_eq!(response.routing.contracts, vec!["auth"]);
    assert_eq!(response.routing.escalation_level, 1);
    assert_eq!(response.contracts.len(), 1);
    assert_eq!(response.routed.len(), 1);
    assert!(response.design_system.is_none());
    assert!(response.ledger.is_none());
    assert!(response.state.is_empty());
    assert_eq!(response.selected[0].id, "auth-flow");
    assert!(response.warnings.is_empty());
}

#[tokio::test]
async fn design_query_includes_design_profile() {
    let (_temp, layout) = seed().await;
    let response = retrieve(&layout, &RetrievalRequest::new("design token spacing"))
        .await
        .expect("retrieve");

    assert_eq!(response.routing.routes, vec!["ui"]);
    assert_eq!(response.routing.contracts, vec!["ui-design"]);
    assert_eq!(
        response.design_system.as_ref().map(|d| d.content.as_str()),
        Some("Use the 8px grid.")
    );
    assert_eq!(response.selected[0].id, "ui-theme");
}

#[tokio::test]
async fn state_request_brings_state_and_ledger() {
    let (_temp, layout) = seed().await;
    let mut request = RetrievalRequest::new("change session handling");
    request.include_state = true;
    let response = retrieve(&layout, &request).await.expect("retrieve");

    assert_eq!(response.routing.escalation_level, 2);
    assert_eq!(response.routed.len(), 2);
    let notes: Vec<&str> = response.state.iter().map(|e| e.note.as_str()).collect();
    assert_eq!(notes, vec!["new", "old"]);
    assert!(response.ledger.is_some());
}

/// Word counts per category, in selection precedence order.
fn category_words(response: &RetrievalResponse) -> Vec<Vec<usize>> {
    vec![
        response.contracts.iter().map(|c| word_count(&c.content)).collect(),
        response.routed.iter().map(|c| word_count(&c.content)).collect(),
        response.design_system.iter().map(|d| word_count(&d.content)).collect(),
        response.state.iter().map(|e| word_count(&e.display_text())).collect(),
        response.ledger.iter().map(|d| word_count(&d.content)).collect(),
        response.selected.iter().map(|s| s.words).collect(),
    ]
}

/// Only the first item of a category may overrun the budget.
fn assert_budget_respected(response: &RetrievalResponse) {
    let max = response.budget.max_words;
    let mut used = 0;
    let mut firsts = 0;
    for words in category_words(response) {
        for (idx, count) in words.into_iter().enumerate() {
            if idx == 0 {
                firsts += count;
            } else {
                assert!(used + count <= max, "item {idx} admitted past budget {max}");
            }
            used += count;
        }
    }
    assert_eq!(response.budget.used_words, used);
    assert!(used <= max + firsts);
}

#[tokio::test]
async fn small_budget_keeps_first_item_per_category_and_cuts_the_rest() {
    let (temp, layout) = seed().await;
    write(
        temp.path(),
        ".context/docs/contracts/database.md",
        "Migrations run in a single transaction.",
    );
    let mut request = RetrievalRequest::new("session migration layout");
    request.include_state = true;

    request.max_words = 8;
    let response = retrieve(&layout, &request).await.expect("retrieve");
    assert_eq!(response.routing.contracts, vec!["auth", "database"]);
    assert_eq!(response.routing.escalation_level, 3);
    assert_budget_respected(&response);
    assert_eq!(response.contracts.len(), 1);
    assert_eq!(response.contracts[0].domain, "auth");
    assert_eq!(response.routed.len(), 1);
    assert!(response.design_system.is_some());
    let notes: Vec<&str> = response.state.iter().map(|e| e.note.as_str()).collect();
    assert_eq!(notes, vec!["new"]);
    assert!(response.ledger.is_some());
    assert_eq!(response.selected.len(), 1);
    assert!(response.budget.used_words > response.budget.max_words);

    request.max_words = 20;
    let response = retrieve(&layout, &request).await.expect("retrieve");
    assert_budget_respected(&response);
    assert_eq!(response.contracts.len(), 2);
    assert_eq!(response.routed.len(), 2);
    assert_eq!(response.state.len(), 1);
    assert_eq!(response.selected.len(), 1);
}

#[tokio::test]
async fn path_like_route_is_rejected() {
    let (_temp, layout) = seed().await;
    let mut request = RetrievalRequest::new("session");
    request.routes = Some(vec!["../../x".to_string()]);

    let err = retrieve(&layout, &request).await.expect_err("invalid route");
    assert!(matches!(err, SearchError::InvalidRoute(ref route) if route == "../../x"));
    assert_eq!(err.to_envelope().code, "invalid_route");
}

#[tokio::test]
async fn filters_and_limit_apply_to_sections() {
    let (_temp, layout) = seed().await;
    let mut request = RetrievalRequest::new("session tables");
    request.type_filter = Some(SectionType::Schema);
    let response = retrieve(&layout, &request).await.expect("retrieve");
    let ids: Vec<&str> = response.selected.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["db-schema"]);

    let mut request = RetrievalRequest::new("session");
    request.limit = 1;
    let response = retrieve(&layout, &request).await.expect("retrieve");
    assert_eq!(response.selected.len(), 1);
}

#[tokio::test]
async fn edited_document_yields_staleness_warning_not_failure() {
    let (temp, layout) = seed().await;
    write(
        temp.path(),
        ".context/docs/architecture.md",
        &ARCHITECTURE.replace("one hour", "one day"),
    );

    let response = retrieve(&layout, &RetrievalRequest::new("login session"))
        .await
        .expect("retrieve");
    assert_eq!(response.warnings.len(), 1);
    assert_eq!(response.warnings[0].id, "auth-flow");
    let flow = response
        .selected
        .iter()
        .find(|s| s.id == "auth-flow")
        .expect("stale section still selected");
    assert!(flow.stale);
    assert!(flow.content.contains("one day"));
}

#[tokio::test]
async fn deleted_document_is_a_hard_error() {
    let (temp, layout) = seed().await;
    std::fs::remove_file(temp.path().join(".context/docs/architecture.md")).expect("remove");

    let err = retrieve(&layout, &RetrievalRequest::new("login"))
        .await
        .expect_err("source missing");
    assert!(matches!(err, SearchError::SourceMissing(_)));
    assert_eq!(err.to_envelope().code, "source_missing");
}

#[tokio::test]
async fn missing_index_and_empty_query_are_errors() {
    let temp = TempDir::new().expect("tempdir");
    let layout = DocsLayout::new(temp.path());

    let err = retrieve(&layout, &RetrievalRequest::new("login"))
        .await
        .expect_err("no index");
    assert!(matches!(
        err,
        SearchError::Indexer(IndexerError::IndexMissing(_))
    ));

    let err = retrieve(&layout, &RetrievalRequest::new("? !"))
        .await
        .expect_err("empty query");
    assert!(matches!(err, SearchError::EmptyQuery));
}

#[tokio::test]
async fn same_inputs_give_identical_output() {
    let (_temp, layout) = seed().await;
    let request = RetrievalRequest::new("session migration rollback");
    let first = retrieve(&layout, &request).await.expect("first");
    let second = retrieve(&layout, &request).await.expect("second");
    assert_eq!(first, second);
}
