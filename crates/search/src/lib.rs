//! # Context Search
//!
//! Deterministic, budget-bounded retrieval over the section index.
//!
//! ## Pipeline
//!
//! ```text
//! Query
//!     │
//!     ├──> Tokenizer ──> Routing classifier (routes, contracts, escalation tier)
//!     │
//!     ├──> Auxiliary sources (contracts, routed depth files, design profile, state, ledger)
//!     │
//!     ├──> Stage 1: metadata score over the index (top 24)
//!     ├──> Stage 2: body score + criticality from live documents, staleness check
//!     │
//!     └──> Selection under one word budget, fixed category precedence
//! ```

mod error;
mod rank;
mod render;
mod retrieve;
mod routing;
mod select;
mod sources;
mod tokenize;

pub use error::{Result, SearchError};
pub use rank::{
    criticality, stage_one, stage_two, MatchText, RankedSection, SectionFilter, Stage1Hit,
    StalenessWarning, RISK_TERMS,
};
pub use render::render_markdown;
pub use retrieve::{
    retrieve, retrieve_with_index, RetrievalRequest, RetrievalResponse, SelectedSection,
};
pub use routing::{
    QueryRouting, RoutingClassifier, DESIGN_PROFILE_TRIGGERS, LEDGER_TRIGGERS, MAX_ESCALATION,
    MIN_ESCALATION,
};
pub use select::WordBudget;
pub use sources::{
    load_contracts, load_design_summary, load_ledger, load_routed, load_state, parse_state_log,
    AuxDocument, ContractChunk, RoutedContextChunk, StateKind, StateLogEntry,
};
pub use tokenize::{tokenize, word_count, word_set};
