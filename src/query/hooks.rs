//! Query and result alteration hooks.
//!
//! An explicit, ordered middleware list replaces implicit observer
//! discovery: callers register [`QueryHook`] implementations up front,
//! optionally restricted to a query tag, and the registry dispatches them
//! synchronously in registration order at two points: immediately before
//! backend dispatch and immediately after.

use std::sync::Arc;

use super::{ResultSet, SearchQuery};

/// Observer invoked around backend dispatch. Both methods default to
/// no-ops so implementations only override the point they care about.
pub trait QueryHook: Send + Sync {
    /// Runs after index-level preprocessing, before backend dispatch.
    /// May mutate the query, including aborting it.
    fn pre_search(&self, _query: &mut SearchQuery) {}

    /// Runs after backend dispatch (also on the aborted/short-circuit
    /// path, with an empty result set). May mutate the results.
    fn post_search(&self, _results: &mut ResultSet, _query: &SearchQuery) {}
}

struct HookEntry {
    /// `None` registrations run for every query; tagged ones only for
    /// queries carrying the tag.
    tag: Option<String>,
    hook: Arc<dyn QueryHook>,
}

/// Ordered list of registered hooks.
#[derive(Default)]
pub struct HookRegistry {
    entries: Vec<HookEntry>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook that runs for every query.
    pub fn register(&mut self, hook: Arc<dyn QueryHook>) -> &mut Self {
        self.entries.push(HookEntry { tag: None, hook });
        self
    }

    /// Register a hook that runs only for queries tagged with `tag`.
    pub fn register_for_tag(&mut self, tag: impl Into<String>, hook: Arc<dyn QueryHook>) -> &mut Self {
        self.entries.push(HookEntry {
            tag: Some(tag.into()),
            hook,
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn dispatch_pre(&self, query: &mut SearchQuery) {
        for entry in self.applicable(query) {
            entry.hook.pre_search(query);
        }
    }

    pub(crate) fn dispatch_post(&self, results: &mut ResultSet, query: &SearchQuery) {
        for entry in self.applicable(query) {
            entry.hook.post_search(results, query);
        }
    }

    fn applicable<'a>(&'a self, query: &SearchQuery) -> Vec<&'a HookEntry> {
        self.entries
            .iter()
            .filter(|entry| match &entry.tag {
                None => true,
                Some(tag) => query.has_tag(tag),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::backend::SearchBackend;
    use crate::error::Result;
    use crate::index::Index;

    struct NullBackend;

    impl SearchBackend for NullBackend {
        fn id(&self) -> &'static str {
            "null"
        }

        fn search(&self, _query: &SearchQuery) -> Result<ResultSet> {
            Ok(ResultSet::empty())
        }
    }

    struct Counter(AtomicUsize);

    impl QueryHook for Counter {
        fn pre_search(&self, _query: &mut SearchQuery) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn query_with(hooks: HookRegistry) -> SearchQuery {
        SearchQuery::new(
            Arc::new(Index::new("content")),
            Arc::new(NullBackend),
            Arc::new(hooks),
        )
        .unwrap()
    }

    #[test]
    fn test_untagged_hooks_always_run() {
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        let mut registry = HookRegistry::new();
        registry.register(counter.clone());
        let mut query = query_with(registry);
        query.execute().unwrap();
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_tagged_hooks_filtered() {
        let tagged = Arc::new(Counter(AtomicUsize::new(0)));
        let other = Arc::new(Counter(AtomicUsize::new(0)));
        let mut registry = HookRegistry::new();
        registry.register_for_tag("views", tagged.clone());
        registry.register_for_tag("autocomplete", other.clone());

        let mut query = query_with(registry);
        query.add_tag("views");
        query.execute().unwrap();

        assert_eq!(tagged.0.load(Ordering::SeqCst), 1);
        assert_eq!(other.0.load(Ordering::SeqCst), 0);
    }
}
