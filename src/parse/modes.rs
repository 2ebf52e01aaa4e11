//! The three built-in parse modes: direct, phrase, and terms.

use super::{Conjunction, KeyExpr, Keys, ParseMode};

/// Passes the raw input through unaltered.
///
/// The caller (or backend) is responsible for handling whatever syntax the
/// string contains.
#[derive(Debug, Clone, Copy)]
pub struct DirectParseMode;

impl ParseMode for DirectParseMode {
    fn id(&self) -> &'static str {
        "direct"
    }

    fn conjunction(&self) -> Conjunction {
        Conjunction::And
    }

    fn parse_input(&self, raw: &str) -> Keys {
        Keys::Raw(raw.to_string())
    }

    fn clone_box(&self) -> Box<dyn ParseMode> {
        Box::new(*self)
    }
}

/// Treats the entire input as a single multi-word term.
#[derive(Debug, Clone, Copy)]
pub struct PhraseParseMode {
    conjunction: Conjunction,
}

impl PhraseParseMode {
    pub fn new(conjunction: Conjunction) -> Self {
        Self { conjunction }
    }
}

impl ParseMode for PhraseParseMode {
    fn id(&self) -> &'static str {
        "phrase"
    }

    fn conjunction(&self) -> Conjunction {
        self.conjunction
    }

    fn parse_input(&self, raw: &str) -> Keys {
        let mut children = Vec::new();
        if !raw.is_empty() {
            children.push(KeyExpr::Term(raw.to_string()));
        }
        Keys::Parsed(KeyExpr::group(self.conjunction, children))
    }

    fn clone_box(&self) -> Box<dyn ParseMode> {
        Box::new(*self)
    }
}

/// Splits the input into whitespace-separated terms, honoring double-quoted
/// substrings as single multi-word terms.
///
/// A term beginning with `"` accumulates subsequent tokens until one ends
/// in `"`. An unterminated quote is deliberately lenient: the accumulated
/// run is kept as a single term as if the quote had been closed, rather
/// than dropped or rejected.
#[derive(Debug, Clone, Copy)]
pub struct TermsParseMode {
    conjunction: Conjunction,
}

impl TermsParseMode {
    pub fn new(conjunction: Conjunction) -> Self {
        Self { conjunction }
    }
}

impl ParseMode for TermsParseMode {
    fn id(&self) -> &'static str {
        "terms"
    }

    fn conjunction(&self) -> Conjunction {
        self.conjunction
    }

    fn parse_input(&self, raw: &str) -> Keys {
        let mut terms: Vec<KeyExpr> = Vec::new();
        // Accumulates a quoted run once a token starting with `"` is seen.
        let mut quoted: Option<String> = None;

        for token in raw.split_whitespace() {
            match quoted.as_mut() {
                Some(acc) => {
                    acc.push(' ');
                    acc.push_str(token);
                    if token.ends_with('"') {
                        let acc = quoted.take().unwrap_or_default();
                        push_term(&mut terms, &acc);
                    }
                }
                None => {
                    if token.starts_with('"') && !(token.len() >= 2 && token.ends_with('"')) {
                        quoted = Some(token.to_string());
                    } else {
                        push_term(&mut terms, token);
                    }
                }
            }
        }

        // Unterminated quote: keep the run as if it were closed.
        if let Some(acc) = quoted {
            push_term(&mut terms, &acc);
        }

        Keys::Parsed(KeyExpr::group(self.conjunction, terms))
    }

    fn clone_box(&self) -> Box<dyn ParseMode> {
        Box::new(*self)
    }
}

/// Trim surrounding quotes and discard empty tokens.
fn push_term(terms: &mut Vec<KeyExpr>, token: &str) {
    let trimmed = token.trim_matches('"');
    if !trimmed.is_empty() {
        terms.push(KeyExpr::Term(trimmed.to_string()));
    }
}
