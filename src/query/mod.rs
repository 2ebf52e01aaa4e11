//! The query object: accumulates keywords, conditions, sorts, and options,
//! and orchestrates pre/post-processing around backend dispatch.
//!
//! A [`SearchQuery`] is built per search against one [`Index`], mutated
//! through fluent setters, and executed at most once: repeated
//! [`execute`](SearchQuery::execute) calls return the cached result set.
//! Aborting (explicitly, or through an empty language list) is not an
//! error: execution skips the backend but still runs the post-search
//! hooks on an empty result.

pub mod condition;
pub mod hooks;
pub mod results;

pub use condition::{Condition, ConditionGroup, ConditionItem};
pub use hooks::{HookRegistry, QueryHook};
pub use results::{ResultItem, ResultSet};

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::backend::SearchBackend;
use crate::error::{Error, Result};
use crate::index::Index;
use crate::parse::{Conjunction, KeyExpr, Keys, ParseMode, TermsParseMode};

/// Magic sort field: order by relevance score.
pub const SORT_RELEVANCE: &str = "relevance";
/// Magic sort field: order by item id.
pub const SORT_ITEM_ID: &str = "item_id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// One entry of the sort list. Insertion order is sort priority.
#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    pub field: String,
    pub order: SortOrder,
}

/// How much pre/postprocessing a query goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessingLevel {
    /// Skip all pre/postprocessing. For trusted, already-prepared
    /// internal queries.
    None,
    #[default]
    Full,
}

/// One search request against an index.
#[derive(Clone)]
pub struct SearchQuery {
    index: Arc<Index>,
    backend: Arc<dyn SearchBackend>,
    hooks: Arc<HookRegistry>,
    parse_mode: Option<Box<dyn ParseMode>>,
    original_keys: Option<String>,
    keys: Option<Keys>,
    fulltext_fields: Option<Vec<String>>,
    conditions: ConditionGroup,
    sorts: Vec<Sort>,
    offset: u64,
    limit: Option<u64>,
    languages: Option<Vec<String>>,
    options: ahash::AHashMap<String, Value>,
    tags: BTreeSet<String>,
    processing: ProcessingLevel,
    preprocessed: bool,
    aborted: bool,
    abort_message: Option<String>,
    results: Option<ResultSet>,
}

impl std::fmt::Debug for SearchQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchQuery")
            .field("original_keys", &self.original_keys)
            .field("offset", &self.offset)
            .field("limit", &self.limit)
            .field("aborted", &self.aborted)
            .finish_non_exhaustive()
    }
}

impl SearchQuery {
    /// Build a query against `index`, dispatching to `backend` and running
    /// the hooks in `hooks`. Searching a disabled index is a
    /// configuration error.
    pub fn new(
        index: Arc<Index>,
        backend: Arc<dyn SearchBackend>,
        hooks: Arc<HookRegistry>,
    ) -> Result<Self> {
        if !index.is_enabled() {
            return Err(Error::config(format!(
                "cannot search disabled index '{}'",
                index.id()
            )));
        }
        Ok(Self {
            index,
            backend,
            hooks,
            parse_mode: None,
            original_keys: None,
            keys: None,
            fulltext_fields: None,
            conditions: ConditionGroup::default(),
            sorts: Vec::new(),
            offset: 0,
            limit: None,
            languages: None,
            options: ahash::AHashMap::new(),
            tags: BTreeSet::new(),
            processing: ProcessingLevel::default(),
            preprocessed: false,
            aborted: false,
            abort_message: None,
            results: None,
        })
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    /// Override the parse mode used by subsequent [`set_keys`] calls.
    ///
    /// [`set_keys`]: SearchQuery::set_keys
    pub fn set_parse_mode(&mut self, mode: Box<dyn ParseMode>) -> &mut Self {
        self.parse_mode = Some(mode);
        self
    }

    /// The parse mode in effect: an explicit one if set, otherwise terms
    /// mode with the conjunction from the `conjunction` option.
    fn effective_parse_mode(&self) -> Box<dyn ParseMode> {
        match &self.parse_mode {
            Some(mode) => mode.clone(),
            None => {
                let conjunction = match self.options.get("conjunction").and_then(Value::as_str) {
                    Some("OR") => Conjunction::Or,
                    _ => Conjunction::And,
                };
                Box::new(TermsParseMode::new(conjunction))
            }
        }
    }

    /// Set the fulltext keywords from raw user input, parsed through the
    /// current parse mode. Both the original and the parsed form are kept.
    pub fn set_keys(&mut self, keys: &str) -> &mut Self {
        self.keys = Some(self.effective_parse_mode().parse_input(keys));
        self.original_keys = Some(keys.to_string());
        self
    }

    /// Set a pre-built keyword expression tree, bypassing parsing.
    pub fn set_parsed_keys(&mut self, expr: KeyExpr) -> &mut Self {
        self.keys = Some(Keys::Parsed(expr));
        self.original_keys = None;
        self
    }

    pub fn keys(&self) -> Option<&Keys> {
        self.keys.as_ref()
    }

    /// The unparsed input of the last [`set_keys`](SearchQuery::set_keys)
    /// call, if any.
    pub fn original_keys(&self) -> Option<&str> {
        self.original_keys.as_deref()
    }

    /// Restrict keyword search to these fields instead of every fulltext
    /// field of the index.
    pub fn set_fulltext_fields(&mut self, fields: Vec<String>) -> &mut Self {
        self.fulltext_fields = Some(fields);
        self
    }

    pub fn fulltext_fields(&self) -> Option<&[String]> {
        self.fulltext_fields.as_deref()
    }

    /// Add a leaf condition to the root condition group.
    pub fn add_condition(
        &mut self,
        field: impl Into<String>,
        value: impl Into<Value>,
        operator: impl Into<String>,
    ) -> &mut Self {
        self.conditions.add_condition(field, value, operator);
        self
    }

    /// Add a nested condition group to the root group.
    pub fn add_condition_group(&mut self, group: ConditionGroup) -> &mut Self {
        self.conditions.add_group(group);
        self
    }

    pub fn condition_group(&self) -> &ConditionGroup {
        &self.conditions
    }

    pub fn condition_group_mut(&mut self) -> &mut ConditionGroup {
        &mut self.conditions
    }

    /// Append a sort. Re-sorting on an existing field moves it to the end
    /// of the priority list with the new order.
    pub fn sort(&mut self, field: &str, order: SortOrder) -> &mut Self {
        self.sorts.retain(|s| s.field != field);
        self.sorts.push(Sort {
            field: field.to_string(),
            order,
        });
        self
    }

    pub fn sorts(&self) -> &[Sort] {
        &self.sorts
    }

    /// Set the paging window. `range(None, None)` clears paging entirely.
    pub fn range(&mut self, offset: Option<u64>, limit: Option<u64>) -> &mut Self {
        self.offset = offset.unwrap_or(0);
        self.limit = limit;
        self
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    /// Restrict results to these languages. `None` means unrestricted; an
    /// explicit empty list is a deliberate zero-result short-circuit.
    pub fn set_languages(&mut self, languages: Option<Vec<String>>) -> &mut Self {
        self.languages = languages;
        self
    }

    pub fn languages(&self) -> Option<&[String]> {
        self.languages.as_deref()
    }

    /// Set an option, returning the previous value if there was one.
    pub fn set_option(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.options.insert(name.into(), value.into())
    }

    pub fn option(&self, name: &str) -> Option<&Value> {
        self.options.get(name)
    }

    pub fn add_tag(&mut self, tag: impl Into<String>) -> &mut Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn set_processing_level(&mut self, level: ProcessingLevel) -> &mut Self {
        self.processing = level;
        self
    }

    pub fn processing_level(&self) -> ProcessingLevel {
        self.processing
    }

    /// Abort the query. Execution will skip backend dispatch and complete
    /// the postprocessing path with an empty result.
    pub fn abort(&mut self, message: Option<&str>) {
        self.aborted = true;
        if let Some(message) = message {
            self.abort_message = Some(message.to_string());
        }
    }

    pub fn was_aborted(&self) -> bool {
        self.aborted
    }

    pub fn abort_message(&self) -> Option<&str> {
        self.abort_message.as_deref()
    }

    /// The cached result set, present once the query has executed.
    pub fn results(&self) -> Option<&ResultSet> {
        self.results.as_ref()
    }

    /// Execute the query.
    ///
    /// Idempotent: the first call runs the search and caches the result
    /// set; every further call returns the cached set unchanged.
    pub fn execute(&mut self) -> Result<&ResultSet> {
        if self.results.is_none() {
            let results = self.execute_uncached()?;
            self.results = Some(results);
        }
        // The cache is guaranteed populated at this point; this only
        // returns the reference.
        Ok(self.results.get_or_insert_with(ResultSet::empty))
    }

    fn execute_uncached(&mut self) -> Result<ResultSet> {
        // An explicit empty language list aborts before backend dispatch.
        if !self.aborted && matches!(&self.languages, Some(langs) if langs.is_empty()) {
            self.abort(Some("no languages selected"));
        }

        if !self.aborted && self.processing == ProcessingLevel::Full && !self.preprocessed {
            self.preprocessed = true;
            let index = Arc::clone(&self.index);
            index.preprocess_search_query(self)?;
            let hooks = Arc::clone(&self.hooks);
            hooks.dispatch_pre(self);
        }

        // Pre-search hooks may abort; re-check before dispatching.
        let mut results = if self.aborted {
            debug!(index = self.index.id(), "query aborted, skipping backend");
            ResultSet::empty()
        } else {
            debug!(
                index = self.index.id(),
                backend = self.backend.id(),
                "dispatching query to backend"
            );
            let backend = Arc::clone(&self.backend);
            backend.search(self)?
        };

        if self.processing == ProcessingLevel::Full {
            let index = Arc::clone(&self.index);
            index.postprocess_search_results(&mut results, self);
            let hooks = Arc::clone(&self.hooks);
            hooks.dispatch_post(&mut results, self);
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Backend that counts dispatches and returns one fixed item.
    struct CountingBackend {
        calls: AtomicUsize,
    }

    impl CountingBackend {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl SearchBackend for CountingBackend {
        fn id(&self) -> &'static str {
            "counting"
        }

        fn search(&self, _query: &SearchQuery) -> Result<ResultSet> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut results = ResultSet::empty();
            results.set_result_count(1);
            results.add_item(ResultItem::new("node", "1", 1.0));
            Ok(results)
        }
    }

    fn test_query(backend: Arc<CountingBackend>) -> SearchQuery {
        SearchQuery::new(
            Arc::new(Index::new("content")),
            backend,
            Arc::new(HookRegistry::new()),
        )
        .unwrap()
    }

    #[test]
    fn test_execute_is_idempotent() {
        let backend = CountingBackend::new();
        let mut query = test_query(backend.clone());
        let first = query.execute().unwrap() as *const ResultSet;
        let second = query.execute().unwrap() as *const ResultSet;
        assert_eq!(first, second);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_disabled_index_is_config_error() {
        let mut index = Index::new("content");
        index.set_enabled(false);
        let err = SearchQuery::new(
            Arc::new(index),
            CountingBackend::new(),
            Arc::new(HookRegistry::new()),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_range_clears_paging() {
        let mut query = test_query(CountingBackend::new());
        query.range(Some(5), Some(10));
        assert_eq!(query.offset(), 5);
        assert_eq!(query.limit(), Some(10));
        query.range(None, None);
        assert_eq!(query.offset(), 0);
        assert_eq!(query.limit(), None);
    }

    #[test]
    fn test_sort_last_write_wins() {
        let mut query = test_query(CountingBackend::new());
        query.sort("title", SortOrder::Ascending);
        query.sort("created", SortOrder::Descending);
        query.sort("title", SortOrder::Descending);
        let sorts = query.sorts();
        assert_eq!(sorts.len(), 2);
        assert_eq!(sorts[0].field, "created");
        assert_eq!(sorts[1].field, "title");
        assert_eq!(sorts[1].order, SortOrder::Descending);
    }

    #[test]
    fn test_empty_language_list_bypasses_backend() {
        let backend = CountingBackend::new();
        let mut query = test_query(backend.clone());
        query.set_languages(Some(vec![]));
        let results = query.execute().unwrap();
        assert_eq!(results.result_count(), 0);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
        assert!(query.was_aborted());
    }

    #[test]
    fn test_none_language_filter_is_unrestricted() {
        let backend = CountingBackend::new();
        let mut query = test_query(backend.clone());
        query.set_languages(None);
        query.execute().unwrap();
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert!(!query.was_aborted());
    }

    #[test]
    fn test_abort_skips_backend_but_completes() {
        let backend = CountingBackend::new();
        let mut query = test_query(backend.clone());
        query.abort(Some("cancelled by access check"));
        let results = query.execute().unwrap();
        assert_eq!(results.result_count(), 0);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
        assert_eq!(query.abort_message(), Some("cancelled by access check"));
    }

    #[test]
    fn test_pre_search_hook_can_abort() {
        struct Aborter;
        impl QueryHook for Aborter {
            fn pre_search(&self, query: &mut SearchQuery) {
                query.abort(None);
            }
        }
        let backend = CountingBackend::new();
        let mut hooks = HookRegistry::new();
        hooks.register(Arc::new(Aborter));
        let mut query = SearchQuery::new(
            Arc::new(Index::new("content")),
            backend.clone(),
            Arc::new(hooks),
        )
        .unwrap();
        let results = query.execute().unwrap();
        assert_eq!(results.result_count(), 0);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_post_search_hooks_run_on_aborted_queries() {
        struct Warner;
        impl QueryHook for Warner {
            fn post_search(&self, results: &mut ResultSet, query: &SearchQuery) {
                if query.was_aborted() {
                    results.add_warning("aborted");
                }
            }
        }
        let mut hooks = HookRegistry::new();
        hooks.register(Arc::new(Warner));
        let mut query = SearchQuery::new(
            Arc::new(Index::new("content")),
            CountingBackend::new(),
            Arc::new(hooks),
        )
        .unwrap();
        query.set_languages(Some(vec![]));
        let results = query.execute().unwrap();
        assert_eq!(results.warnings(), ["aborted"]);
    }

    #[test]
    fn test_processing_none_skips_hooks() {
        struct Marker(AtomicUsize);
        impl QueryHook for Marker {
            fn pre_search(&self, _query: &mut SearchQuery) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
            fn post_search(&self, _results: &mut ResultSet, _query: &SearchQuery) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
        let marker = Arc::new(Marker(AtomicUsize::new(0)));
        let mut hooks = HookRegistry::new();
        hooks.register(marker.clone());
        let mut query = SearchQuery::new(
            Arc::new(Index::new("content")),
            CountingBackend::new(),
            Arc::new(hooks),
        )
        .unwrap();
        query.set_processing_level(ProcessingLevel::None);
        query.execute().unwrap();
        assert_eq!(marker.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_cloned_query_gets_independent_results() {
        let mut query = test_query(CountingBackend::new());
        query.execute().unwrap();
        let mut cloned = query.clone();
        if let Some(results) = cloned.results.as_mut() {
            results.set_result_count(99);
        }
        assert_eq!(query.results().map(|r| r.result_count()), Some(1));
        assert_eq!(cloned.results().map(|r| r.result_count()), Some(99));
    }

    #[test]
    fn test_keys_keep_original_form() {
        let mut query = test_query(CountingBackend::new());
        query.set_keys("foo bar");
        assert_eq!(query.original_keys(), Some("foo bar"));
        assert!(matches!(query.keys(), Some(Keys::Parsed(_))));
    }

    #[test]
    fn test_conjunction_option_controls_default_parse_mode() {
        let mut query = test_query(CountingBackend::new());
        query.set_option("conjunction", "OR");
        query.set_keys("foo bar");
        match query.keys() {
            Some(Keys::Parsed(KeyExpr::Group { conjunction, .. })) => {
                assert_eq!(*conjunction, Conjunction::Or);
            }
            other => panic!("unexpected keys: {other:?}"),
        }
    }
}
