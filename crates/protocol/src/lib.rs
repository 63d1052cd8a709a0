use anyhow::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const INDEX_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    IndexMissing,
    SourceMissing,
    Structural,
    EmptyQuery,
    InvalidRoute,
    Internal,
}

impl ErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::IndexMissing => "index_missing",
            Self::SourceMissing => "source_missing",
            Self::Structural => "structural",
            Self::EmptyQuery => "empty_query",
            Self::InvalidRoute => "invalid_route",
            Self::Internal => "internal",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema)]
pub struct ErrorEnvelope {
    pub code: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
    pub hint: Option<String>,
}

impl ErrorEnvelope {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.as_str().to_string(),
            message: message.into(),
            details: None,
            hint: None,
        }
    }

    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Defaults for a retrieval request when the caller leaves them unset.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
pub struct DefaultBudgets {
    pub limit: usize,
    pub max_words: usize,
    pub stage1_keep: usize,
    pub state_window: usize,
}

impl Default for DefaultBudgets {
    fn default() -> Self {
        Self {
            limit: 6,
            max_words: 1_400,
            stage1_keep: 24,
            state_window: 8,
        }
    }
}

pub fn serialize_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(Into::into)
}

pub fn serialize_json_pretty<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn error_envelope_serializes_code_as_snake_case() {
        let envelope = ErrorEnvelope::new(ErrorCode::IndexMissing, "no index")
            .with_hint("run `context-docs index` first");
        let value: serde_json::Value =
            serde_json::from_str(&serialize_json(&envelope).unwrap()).unwrap();
        assert_eq!(value["code"], "index_missing");
        assert_eq!(value["message"], "no index");
        assert_eq!(value["hint"], "run `context-docs index` first");
        assert!(value["details"].is_null());
    }

    #[test]
    fn default_budgets_match_retrieval_defaults() {
        let budgets = DefaultBudgets::default();
        assert_eq!(budgets.limit, 6);
        assert_eq!(budgets.max_words, 1_400);
        assert_eq!(budgets.stage1_keep, 24);
    }
}
