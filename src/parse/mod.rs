//! Parse modes: converting user-entered query strings into structured
//! keyword expressions.
//!
//! A [`ParseMode`] turns the raw string handed to
//! [`SearchQuery::set_keys`](crate::query::SearchQuery::set_keys) into a
//! [`Keys`] value: either the untouched input (`direct` mode) or a
//! [`KeyExpr`] tree of terms grouped under an AND/OR conjunction (`phrase`
//! and `terms` modes).
//!
//! Modes are looked up through an explicit compile-time registry; see
//! [`create_parse_mode`].

pub mod modes;

pub use modes::{DirectParseMode, PhraseParseMode, TermsParseMode};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// AND/OR combinator applied to a set of keywords or conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Conjunction {
    And,
    Or,
}

impl Conjunction {
    pub fn as_str(self) -> &'static str {
        match self {
            Conjunction::And => "AND",
            Conjunction::Or => "OR",
        }
    }
}

/// A parsed keyword expression: a single term, or a group of
/// sub-expressions combined with a conjunction, optionally negated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum KeyExpr {
    /// One keyword. May contain spaces when it came from a quoted phrase.
    Term(String),
    /// Nested expressions combined with `conjunction`.
    Group {
        conjunction: Conjunction,
        negated: bool,
        children: Vec<KeyExpr>,
    },
}

impl KeyExpr {
    /// Convenience constructor for a non-negated group.
    pub fn group(conjunction: Conjunction, children: Vec<KeyExpr>) -> Self {
        KeyExpr::Group {
            conjunction,
            negated: false,
            children,
        }
    }

    /// Collect every non-negated term in the expression, in order.
    pub fn terms(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_terms(&mut out);
        out
    }

    fn collect_terms<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            KeyExpr::Term(t) => out.push(t),
            KeyExpr::Group {
                negated, children, ..
            } => {
                if !*negated {
                    for child in children {
                        child.collect_terms(out);
                    }
                }
            }
        }
    }
}

/// The keys of a query: either the raw input passed through unparsed, or a
/// structured expression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Keys {
    /// Raw passthrough; the backend is responsible for any syntax.
    Raw(String),
    /// Parsed expression tree.
    Parsed(KeyExpr),
}

/// Converts a raw query string into [`Keys`].
///
/// Implementations are stateless apart from their configured conjunction
/// and are cheap to clone.
pub trait ParseMode: Send + Sync {
    /// Registry id of this mode (`"direct"`, `"phrase"`, `"terms"`).
    fn id(&self) -> &'static str;

    /// The conjunction applied to parsed keyword groups.
    fn conjunction(&self) -> Conjunction;

    /// Parse raw user input into keys.
    fn parse_input(&self, raw: &str) -> Keys;

    fn clone_box(&self) -> Box<dyn ParseMode>;
}

impl Clone for Box<dyn ParseMode> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

impl std::fmt::Debug for dyn ParseMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParseMode")
            .field("id", &self.id())
            .finish_non_exhaustive()
    }
}

/// Parse mode ids known to [`create_parse_mode`].
pub const PARSE_MODE_IDS: &[&str] = &["direct", "phrase", "terms"];

/// Instantiate a parse mode by id.
///
/// This is the explicit registry: new modes are added here, not discovered.
pub fn create_parse_mode(id: &str, conjunction: Conjunction) -> Result<Box<dyn ParseMode>> {
    match id {
        "direct" => Ok(Box::new(DirectParseMode)),
        "phrase" => Ok(Box::new(PhraseParseMode::new(conjunction))),
        "terms" => Ok(Box::new(TermsParseMode::new(conjunction))),
        other => Err(Error::UnknownParseMode(other.to_string())),
    }
}
