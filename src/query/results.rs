//! Search result sets: ranked item references with scores and excerpts.

use serde::{Deserialize, Serialize};

/// One matched item: a datasource-qualified item reference plus relevance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultItem {
    pub datasource: String,
    pub item_id: String,
    pub score: f32,
    /// Snippet of matched text, present for fulltext matches.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
}

impl ResultItem {
    pub fn new(datasource: impl Into<String>, item_id: impl Into<String>, score: f32) -> Self {
        Self {
            datasource: datasource.into(),
            item_id: item_id.into(),
            score,
            excerpt: None,
        }
    }

    pub fn with_excerpt(mut self, excerpt: impl Into<String>) -> Self {
        self.excerpt = Some(excerpt.into());
        self
    }
}

/// The outcome of one executed query.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResultSet {
    /// Total number of matching items. May exceed `items.len()` when the
    /// query was paged.
    result_count: u64,
    items: Vec<ResultItem>,
    warnings: Vec<String>,
    /// Keywords the backend skipped (e.g. below its minimum word length).
    ignored: Vec<String>,
}

impl ResultSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn result_count(&self) -> u64 {
        self.result_count
    }

    pub fn set_result_count(&mut self, count: u64) {
        self.result_count = count;
    }

    pub fn items(&self) -> &[ResultItem] {
        &self.items
    }

    pub fn items_mut(&mut self) -> &mut Vec<ResultItem> {
        &mut self.items
    }

    pub fn add_item(&mut self, item: ResultItem) {
        self.items.push(item);
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn ignored_keys(&self) -> &[String] {
        &self.ignored
    }

    pub fn add_ignored_key(&mut self, key: impl Into<String>) {
        let key = key.into();
        if !self.ignored.contains(&key) {
            self.ignored.push(key);
        }
    }
}
