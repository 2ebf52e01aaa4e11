//! Search backends: executing a finalized query against storage.
//!
//! A backend receives the fully built [`SearchQuery`] after preprocessing
//! and is responsible for translating its condition tree and fulltext keys
//! into storage operations. The bundled implementation is [`Database`], a
//! relational adapter over per-field SQLite tables.

pub mod database;

pub use database::Database;

use crate::error::Result;
use crate::query::{ResultSet, SearchQuery};

/// Executes finalized queries.
///
/// Backends must reject comparison operators they cannot translate with
/// [`Error::UnsupportedOperator`](crate::error::Error::UnsupportedOperator)
/// instead of silently matching everything or nothing.
pub trait SearchBackend: Send + Sync {
    /// Backend id for diagnostics.
    fn id(&self) -> &'static str;

    /// Execute a search and return the ranked result set.
    fn search(&self, query: &SearchQuery) -> Result<ResultSet>;
}
