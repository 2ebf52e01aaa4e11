//! Fulltext value model: a raw string plus optional boost-weighted tokens.

use serde::{Deserialize, Serialize};

/// A single token of a tokenized text value, with its relevance boost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextToken {
    pub text: String,
    pub boost: f32,
}

impl TextToken {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            boost: 1.0,
        }
    }

    pub fn with_boost(text: impl Into<String>, boost: f32) -> Self {
        Self {
            text: text.into(),
            boost,
        }
    }
}

/// A fulltext field value.
///
/// Wraps the original string plus an optional token list produced by an
/// upstream processing pipeline, and flags recording which processing steps
/// have already run. Tokenization itself is not this layer's job.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TextValue {
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tokens: Option<Vec<TextToken>>,
    /// Processing steps already applied upstream.
    #[serde(default, skip_serializing_if = "ProcessingFlags::is_empty")]
    properties: ProcessingFlags,
}

/// Flags for processing steps a text value has been through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProcessingFlags {
    #[serde(default)]
    pub lowercased: bool,
    #[serde(default)]
    pub tokenized: bool,
    #[serde(default)]
    pub stripped_html: bool,
}

impl ProcessingFlags {
    fn is_empty(&self) -> bool {
        !self.lowercased && !self.tokenized && !self.stripped_html
    }
}

impl TextValue {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tokens: None,
            properties: ProcessingFlags::default(),
        }
    }

    /// Build an already-tokenized value. Marks the `tokenized` flag.
    pub fn with_tokens(text: impl Into<String>, tokens: Vec<TextToken>) -> Self {
        Self {
            text: text.into(),
            tokens: Some(tokens),
            properties: ProcessingFlags {
                tokenized: true,
                ..ProcessingFlags::default()
            },
        }
    }

    /// The original, unprocessed string.
    pub fn original_text(&self) -> &str {
        &self.text
    }

    pub fn tokens(&self) -> Option<&[TextToken]> {
        self.tokens.as_deref()
    }

    pub fn set_tokens(&mut self, tokens: Option<Vec<TextToken>>) {
        self.properties.tokenized = tokens.is_some();
        self.tokens = tokens;
    }

    pub fn properties(&self) -> ProcessingFlags {
        self.properties
    }

    pub fn set_properties(&mut self, properties: ProcessingFlags) {
        self.properties = properties;
    }

    /// The textual form of this value.
    ///
    /// Invariant: reflects the tokens when present (joined on single
    /// spaces), the raw text otherwise.
    pub fn to_text(&self) -> String {
        match &self.tokens {
            Some(tokens) => tokens
                .iter()
                .map(|t| t.text.as_str())
                .collect::<Vec<_>>()
                .join(" "),
            None => self.text.clone(),
        }
    }
}

impl std::fmt::Display for TextValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_text_without_tokens() {
        let value = TextValue::new("raw text here");
        assert_eq!(value.to_text(), "raw text here");
    }

    #[test]
    fn test_to_text_reflects_tokens() {
        let mut value = TextValue::new("Raw Text");
        value.set_tokens(Some(vec![
            TextToken::new("raw"),
            TextToken::with_boost("text", 2.0),
        ]));
        assert_eq!(value.to_text(), "raw text");
        assert_eq!(value.original_text(), "Raw Text");
        assert!(value.properties().tokenized);
    }

    #[test]
    fn test_clearing_tokens_restores_raw() {
        let mut value = TextValue::with_tokens("ab cd", vec![TextToken::new("ab")]);
        assert_eq!(value.to_text(), "ab");
        value.set_tokens(None);
        assert_eq!(value.to_text(), "ab cd");
        assert!(!value.properties().tokenized);
    }
}
