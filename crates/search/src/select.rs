use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Shared word budget across every output category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct WordBudget {
    pub max_words: usize,
    pub used_words: usize,
    pub limit: usize,
}

impl WordBudget {
    pub fn new(max_words: usize, limit: usize) -> Self {
        Self {
            max_words,
            used_words: 0,
            limit,
        }
    }

    pub fn remaining(&self) -> usize {
        self.max_words.saturating_sub(self.used_words)
    }

    /// Admit items of one category in order.
    ///
    /// The first item is always admitted, even alone over budget. After that, admission stops
    /// at the first item that does not fit. `cap` bounds the number admitted.
    pub fn admit<T>(
        &mut self,
        items: Vec<T>,
        cap: Option<usize>,
        words_of: impl Fn(&T) -> usize,
    ) -> Vec<(T, usize)> {
        let cap = cap.unwrap_or(usize::MAX);
        let mut admitted = Vec::new();
        for item in items {
            if admitted.len() >= cap {
                break;
            }
            let words = words_of(&item);
            if !admitted.is_empty() && words > self.remaining() {
                break;
            }
            self.used_words += words;
            admitted.push((item, words));
        }
        admitted
    }
}
