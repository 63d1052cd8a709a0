use crate::error::{Result, SearchError};
use crate::rank::{stage_one, stage_two, SectionFilter, StalenessWarning};
use crate::routing::{invalid_route, QueryRouting, RoutingClassifier};
use crate::select::WordBudget;
use crate::sources::{
    load_contracts, load_design_summary, load_ledger, load_routed, load_state, AuxDocument,
    ContractChunk, RoutedContextChunk, StateLogEntry,
};
use crate::tokenize::{tokenize, word_count};
use context_indexer::{DocsLayout, Priority, SectionIndex, SectionType};
use context_protocol::DefaultBudgets;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RetrievalRequest {
    pub query: String,
    #[serde(default)]
    pub type_filter: Option<SectionType>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Replaces the derived routes when non-empty.
    #[serde(default)]
    pub routes: Option<Vec<String>>,
    #[serde(default)]
    pub escalation: Option<u8>,
    #[serde(default)]
    pub include_state: bool,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default = "default_max_words")]
    pub max_words: usize,
}

fn default_limit() -> usize {
    DefaultBudgets::default().limit
}

fn default_max_words() -> usize {
    DefaultBudgets::default().max_words
}

impl RetrievalRequest {
    pub fn new(query: impl Into<String>) -> Self {
        let defaults = DefaultBudgets::default();
        Self {
            query: query.into(),
            type_filter: None,
            tags: Vec::new(),
            routes: None,
            escalation: None,
            include_state: false,
            limit: defaults.limit,
            max_words: defaults.max_words,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SelectedSection {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub section_type: SectionType,
    pub tags: BTreeSet<String>,
    pub priority: Priority,
    pub source: String,
    pub start_line: usize,
    pub end_line: usize,
    pub score: u32,
    pub stage1_score: u32,
    pub criticality: u32,
    pub stale: bool,
    pub words: usize,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RetrievalResponse {
    pub routing: QueryRouting,
    pub contracts: Vec<ContractChunk>,
    pub routed: Vec<RoutedContextChunk>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub design_system: Option<AuxDocument>,
    pub state: Vec<StateLogEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger: Option<AuxDocument>,
    pub selected: Vec<SelectedSection>,
    pub warnings: Vec<StalenessWarning>,
    pub budget: WordBudget,
}

/// Load the index for `layout` and answer `request`.
pub async fn retrieve(layout: &DocsLayout, request: &RetrievalRequest) -> Result<RetrievalResponse> {
    validate(request)?;
    let index = SectionIndex::load(&layout.index_path()).await?;
    retrieve_with_index(layout, &index, request).await
}

/// Answer `request` against an already loaded index.
///
/// Selection precedence is fixed: contracts, routed context, design-profile summary, state
/// log, ledger, then ranked sections.
pub async fn retrieve_with_index(
    layout: &DocsLayout,
    index: &SectionIndex,
    request: &RetrievalRequest,
) -> Result<RetrievalResponse> {
    let tokens = validate(request)?;

    let routing =
        RoutingClassifier::classify(&tokens, request.routes.as_deref(), request.escalation);
    log::debug!(
        "Query routed to {:?} with contracts {:?} at tier {}",
        routing.routes,
        routing.contracts,
        routing.escalation_level
    );

    let contracts = load_contracts(layout, &routing).await;
    let routed = load_routed(layout, &routing).await;
    let design = if RoutingClassifier::wants_design_profile(&tokens, &routing) {
        load_design_summary(layout).await
    } else {
        None
    };
    let state = if request.include_state {
        load_state(layout).await
    } else {
        Vec::new()
    };
    let ledger = if RoutingClassifier::wants_ledger(&tokens, request.include_state) {
        load_ledger(layout).await
    } else {
        None
    };

    let filter = SectionFilter {
        section_type: request.type_filter,
        tags: request.tags.clone(),
    };
    let hits = stage_one(index, &tokens, &filter, DefaultBudgets::default().stage1_keep);
    let (ranked, warnings) = stage_two(&layout.root, &hits, &tokens).await?;

    let mut budget = WordBudget::new(request.max_words, request.limit);
    let contracts = strip_words(budget.admit(contracts, None, |c| word_count(&c.content)));
    let routed = strip_words(budget.admit(routed, None, |c| word_count(&c.content)));
    let design_system = strip_words(budget.admit(
        design.into_iter().collect::<Vec<AuxDocument>>(),
        None,
        |d| word_count(&d.content),
    ))
    .pop();
    let state = strip_words(budget.admit(state, None, |entry| word_count(&entry.display_text())));
    let ledger = strip_words(budget.admit(
        ledger.into_iter().collect::<Vec<AuxDocument>>(),
        None,
        |d| word_count(&d.content),
    ))
    .pop();
    let selected = budget
        .admit(ranked, Some(request.limit), |r| word_count(&r.body))
        .into_iter()
        .map(|(ranked, words)| SelectedSection {
            id: ranked.section.id,
            title: ranked.section.title,
            section_type: ranked.section.section_type,
            tags: ranked.section.tags,
            priority: ranked.section.priority,
            source: ranked.section.source,
            start_line: ranked.section.start_line,
            end_line: ranked.section.end_line,
            score: ranked.score,
            stage1_score: ranked.stage1_score,
            criticality: ranked.criticality,
            stale: ranked.stale,
            words,
            content: ranked.body,
        })
        .collect::<Vec<_>>();

    log::debug!(
        "Selected {} sections using {}/{} words",
        selected.len(),
        budget.used_words,
        budget.max_words
    );

    Ok(RetrievalResponse {
        routing,
        contracts,
        routed,
        design_system,
        state,
        ledger,
        selected,
        warnings,
        budget,
    })
}

fn strip_words<T>(admitted: Vec<(T, usize)>) -> Vec<T> {
    admitted.into_iter().map(|(item, _)| item).collect()
}

/// Reject requests that cannot be answered before touching the index. Returns query tokens.
fn validate(request: &RetrievalRequest) -> Result<Vec<String>> {
    let tokens = tokenize(&request.query);
    if tokens.is_empty() {
        return Err(SearchError::EmptyQuery);
    }
    if let Some(route) = request.routes.as_deref().and_then(invalid_route) {
        return Err(SearchError::InvalidRoute(route.clone()));
    }
    Ok(tokens)
}
