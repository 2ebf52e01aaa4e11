//! Error types for the quarry search layer.
//!
//! Two of these are part of the documented contract: [`Error::Config`] for
//! invalid setup detected while building or mutating a query, and
//! [`Error::UnsupportedOperator`] for comparison operators a backend cannot
//! translate. Aborting a query is *not* an error and is reported through
//! [`crate::query::SearchQuery::was_aborted`] instead.

use thiserror::Error;

/// Main error type for the quarry library.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration: searching a disabled index, changing a
    /// type-locked field's type, sorting on a fulltext field, and so on.
    #[error("configuration error: {0}")]
    Config(String),

    /// A condition used a comparison operator the backend does not
    /// implement. Backends must raise this rather than silently matching
    /// everything or nothing.
    #[error("unsupported operator: {operator}")]
    UnsupportedOperator { operator: String },

    /// Underlying storage failure.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A data type id with no registered plugin.
    #[error("unknown data type: {0}")]
    UnknownDataType(String),

    /// A parse mode id with no registered plugin.
    #[error("unknown parse mode: {0}")]
    UnknownParseMode(String),
}

impl Error {
    /// Shorthand for a configuration error with a formatted message.
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
