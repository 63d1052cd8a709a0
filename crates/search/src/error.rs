use context_indexer::IndexerError;
use context_protocol::{ErrorCode, ErrorEnvelope};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SearchError>;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Indexer error: {0}")]
    Indexer(#[from] IndexerError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Empty query")]
    EmptyQuery,

    #[error("Source document {0} is missing; rebuild the index")]
    SourceMissing(String),

    #[error("Invalid route `{0}`: route names use only a-z, 0-9, `_` and `-`")]
    InvalidRoute(String),
}

impl SearchError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Indexer(IndexerError::IndexMissing(_)) => ErrorCode::IndexMissing,
            Self::Indexer(IndexerError::Structural(_)) => ErrorCode::Structural,
            Self::SourceMissing(_) => ErrorCode::SourceMissing,
            Self::EmptyQuery => ErrorCode::EmptyQuery,
            Self::InvalidRoute(_) => ErrorCode::InvalidRoute,
            _ => ErrorCode::Internal,
        }
    }

    /// Machine-readable form for structured output.
    pub fn to_envelope(&self) -> ErrorEnvelope {
        let envelope = ErrorEnvelope::new(self.code(), self.to_string());
        match self {
            Self::Indexer(IndexerError::IndexMissing(path)) => envelope
                .with_details(serde_json::json!({ "path": path.display().to_string() }))
                .with_hint("run `context-docs index` first"),
            Self::SourceMissing(source) => envelope
                .with_details(serde_json::json!({ "source": source }))
                .with_hint("regenerate the docs and run `context-docs index`"),
            Self::EmptyQuery => envelope.with_hint("use at least one word of two or more characters"),
            Self::InvalidRoute(route) => envelope
                .with_details(serde_json::json!({ "route": route }))
                .with_hint("pass a route directory name such as `auth` or `api`"),
            _ => envelope,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    #[test]
    fn maps_errors_to_protocol_codes() {
        let missing = SearchError::from(IndexerError::IndexMissing(PathBuf::from("/x/index.json")));
        assert_eq!(missing.code(), ErrorCode::IndexMissing);
        let envelope = missing.to_envelope();
        assert_eq!(envelope.code, "index_missing");
        assert!(envelope.hint.is_some());

        assert_eq!(SearchError::EmptyQuery.code(), ErrorCode::EmptyQuery);
        assert_eq!(
            SearchError::SourceMissing("a.md".into()).to_envelope().code,
            "source_missing"
        );
        let invalid = SearchError::InvalidRoute("../x".into()).to_envelope();
        assert_eq!(invalid.code, "invalid_route");
        assert_eq!(invalid.details.unwrap()["route"], "../x");
        assert_eq!(
            SearchError::from(std::io::Error::other("disk")).code(),
            ErrorCode::Internal
        );
    }
}
