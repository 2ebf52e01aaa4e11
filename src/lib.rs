//! # Quarry - Fielded Search Query Layer
//!
//! Quarry is an embeddable search layer: typed field definitions over
//! arbitrary datasources, parse modes for user-entered keywords, a
//! fluent query object with pre/post-processing hooks, and a pluggable
//! backend seam with a bundled SQLite adapter.
//!
//! ## Architecture
//!
//! The crate is organized into these main modules:
//!
//! - [`index`] - Index and field configuration
//! - [`types`] - Data type plugins and the fulltext value model
//! - [`parse`] - Parse modes turning raw input into keyword trees
//! - [`query`] - The query object, conditions, hooks, and result sets
//! - [`backend`] - The backend trait and the relational SQLite adapter
//! - [`error`] - The crate-wide error type
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use quarry::backend::{Database, SearchBackend};
//! use quarry::index::{Field, Index};
//! use quarry::query::{HookRegistry, SearchQuery};
//!
//! # fn main() -> quarry::error::Result<()> {
//! // Define an index with a fulltext field.
//! let mut index = Index::new("content");
//! index.add_datasource("node");
//! index.add_field(Field::new("content", "title", "title", "text"))?;
//! let index = Arc::new(index);
//!
//! // Open a backend and create its tables.
//! let backend = Arc::new(Database::open("search.db")?);
//! backend.create_index_tables(&index)?;
//!
//! // Search.
//! let mut query = SearchQuery::new(
//!     Arc::clone(&index),
//!     Arc::clone(&backend) as Arc<dyn SearchBackend>,
//!     Arc::new(HookRegistry::new()),
//! )?;
//! query.set_keys("hello world");
//! let results = query.execute()?;
//! for item in results.items() {
//!     println!("{}/{}: {}", item.datasource, item.item_id, item.score);
//! }
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod error;
pub mod index;
pub mod parse;
pub mod query;
pub mod types;

pub use backend::{Database, SearchBackend};
pub use error::{Error, Result};
pub use index::{Field, Index};
pub use parse::{Conjunction, KeyExpr, Keys, ParseMode};
pub use query::{HookRegistry, QueryHook, ResultItem, ResultSet, SearchQuery};
