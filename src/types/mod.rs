//! Data type plugins: converting raw property values into typed,
//! searchable representations.
//!
//! Each [`DataType`] is a stateless transformer from a free-form JSON value
//! to a [`FieldValue`]. Types are registered in an explicit compile-time
//! table and instantiated through [`DataTypeManager`], which memoizes
//! instances so repeated lookups return the same `Arc`.

pub mod text;

pub use text::{ProcessingFlags, TextToken, TextValue};

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// A typed field value as produced by a data type plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Text(TextValue),
    String(String),
    Integer(i64),
    Decimal(f64),
    Boolean(bool),
    /// Unix timestamp, seconds.
    Date(i64),
}

/// Stateless transformer from raw property values to typed values.
pub trait DataType: Send + Sync {
    /// Registry id (`"text"`, `"string"`, `"integer"`, ...).
    fn id(&self) -> &'static str;

    /// Human-readable label.
    fn label(&self) -> &'static str;

    /// The type to fall back to when a backend does not support this one.
    fn fallback_type(&self) -> &'static str {
        "string"
    }

    /// Convert a raw value into this type's representation.
    fn value(&self, raw: &Value) -> FieldValue;
}

impl std::fmt::Debug for dyn DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataType")
            .field("id", &self.id())
            .finish_non_exhaustive()
    }
}

fn raw_to_string(raw: &Value) -> String {
    match raw {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn raw_to_i64(raw: &Value) -> i64 {
    match raw {
        Value::Number(n) => n.as_i64().unwrap_or_else(|| {
            n.as_f64().map(|f| f as i64).unwrap_or(0)
        }),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        Value::Bool(b) => *b as i64,
        _ => 0,
    }
}

fn raw_to_f64(raw: &Value) -> f64 {
    match raw {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        Value::Bool(b) => *b as i64 as f64,
        _ => 0.0,
    }
}

/// Fulltext. Wraps any scalar into a [`TextValue`]; tokenization is an
/// upstream processing concern, not this plugin's.
pub struct TextDataType;

impl DataType for TextDataType {
    fn id(&self) -> &'static str {
        "text"
    }

    fn label(&self) -> &'static str {
        "Fulltext"
    }

    fn value(&self, raw: &Value) -> FieldValue {
        FieldValue::Text(TextValue::new(raw_to_string(raw)))
    }
}

/// Plain string, matched exactly.
pub struct StringDataType;

impl DataType for StringDataType {
    fn id(&self) -> &'static str {
        "string"
    }

    fn label(&self) -> &'static str {
        "String"
    }

    fn value(&self, raw: &Value) -> FieldValue {
        FieldValue::String(raw_to_string(raw))
    }
}

pub struct IntegerDataType;

impl DataType for IntegerDataType {
    fn id(&self) -> &'static str {
        "integer"
    }

    fn label(&self) -> &'static str {
        "Integer"
    }

    fn value(&self, raw: &Value) -> FieldValue {
        FieldValue::Integer(raw_to_i64(raw))
    }
}

pub struct DecimalDataType;

impl DataType for DecimalDataType {
    fn id(&self) -> &'static str {
        "decimal"
    }

    fn label(&self) -> &'static str {
        "Decimal"
    }

    fn value(&self, raw: &Value) -> FieldValue {
        FieldValue::Decimal(raw_to_f64(raw))
    }
}

pub struct BooleanDataType;

impl DataType for BooleanDataType {
    fn id(&self) -> &'static str {
        "boolean"
    }

    fn label(&self) -> &'static str {
        "Boolean"
    }

    fn fallback_type(&self) -> &'static str {
        "integer"
    }

    fn value(&self, raw: &Value) -> FieldValue {
        let b = match raw {
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_i64().unwrap_or(0) != 0,
            Value::String(s) => !s.is_empty() && s != "0" && s != "false",
            _ => false,
        };
        FieldValue::Boolean(b)
    }
}

/// Date as a unix timestamp.
pub struct DateDataType;

impl DataType for DateDataType {
    fn id(&self) -> &'static str {
        "date"
    }

    fn label(&self) -> &'static str {
        "Date"
    }

    fn fallback_type(&self) -> &'static str {
        "integer"
    }

    fn value(&self, raw: &Value) -> FieldValue {
        FieldValue::Date(raw_to_i64(raw))
    }
}

type Factory = fn() -> Arc<dyn DataType>;

fn make_text() -> Arc<dyn DataType> {
    Arc::new(TextDataType)
}
fn make_string() -> Arc<dyn DataType> {
    Arc::new(StringDataType)
}
fn make_integer() -> Arc<dyn DataType> {
    Arc::new(IntegerDataType)
}
fn make_decimal() -> Arc<dyn DataType> {
    Arc::new(DecimalDataType)
}
fn make_boolean() -> Arc<dyn DataType> {
    Arc::new(BooleanDataType)
}
fn make_date() -> Arc<dyn DataType> {
    Arc::new(DateDataType)
}

/// The explicit registry of known data types. New types are added here.
const DEFAULT_TYPES: &[(&str, Factory)] = &[
    ("text", make_text),
    ("string", make_string),
    ("integer", make_integer),
    ("decimal", make_decimal),
    ("boolean", make_boolean),
    ("date", make_date),
];

/// Creates and caches data type plugin instances.
///
/// Instances are effectively singletons within a manager: `create` returns
/// the same `Arc` for a given id on every call.
pub struct DataTypeManager {
    instances: ahash::AHashMap<&'static str, Arc<dyn DataType>>,
}

impl DataTypeManager {
    pub fn new() -> Self {
        Self {
            instances: ahash::AHashMap::new(),
        }
    }

    /// Get (or lazily create) the instance for `id`.
    pub fn create(&mut self, id: &str) -> Result<Arc<dyn DataType>> {
        if let Some(existing) = self.instances.get(id) {
            return Ok(Arc::clone(existing));
        }
        for &(type_id, factory) in DEFAULT_TYPES {
            if type_id == id {
                let instance = factory();
                self.instances.insert(type_id, Arc::clone(&instance));
                return Ok(instance);
            }
        }
        Err(Error::UnknownDataType(id.to_string()))
    }

    /// Instantiate every registered definition once and return them all.
    pub fn all(&mut self) -> Vec<Arc<dyn DataType>> {
        DEFAULT_TYPES
            .iter()
            .filter_map(|&(id, _)| self.create(id).ok())
            .collect()
    }

    /// Whether `id` names a registered type.
    pub fn is_known(id: &str) -> bool {
        DEFAULT_TYPES.iter().any(|&(type_id, _)| type_id == id)
    }
}

impl Default for DataTypeManager {
    fn default() -> Self {
        Self::new()
    }
}
