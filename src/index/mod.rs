//! The index: a named collection of datasources and field definitions.
//!
//! An [`Index`] is configuration: it owns the property-to-field mappings
//! and is read-only while a query executes. Creating and persisting index
//! configuration is an administrative concern; queries only load it.

pub mod field;

pub use field::Field;

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::query::{ResultSet, SearchQuery};

/// A named collection of datasources and fields that queries run against.
#[derive(Debug, Clone)]
pub struct Index {
    id: String,
    name: Option<String>,
    datasources: Vec<String>,
    fields: BTreeMap<String, Field>,
    enabled: bool,
}

impl Index {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            datasources: Vec::new(),
            fields: BTreeMap::new(),
            enabled: true,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = Some(name.into());
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) -> &mut Self {
        self.enabled = enabled;
        self
    }

    pub fn datasources(&self) -> &[String] {
        &self.datasources
    }

    pub fn add_datasource(&mut self, datasource: impl Into<String>) -> &mut Self {
        self.datasources.push(datasource.into());
        self
    }

    /// Add (or replace) a field definition.
    ///
    /// The field must have been created for this index.
    pub fn add_field(&mut self, field: Field) -> Result<&mut Self> {
        if field.index_id() != self.id {
            return Err(Error::config(format!(
                "field '{}' belongs to index '{}', not '{}'",
                field.field_id(),
                field.index_id(),
                self.id
            )));
        }
        self.fields.insert(field.field_id().to_string(), field);
        Ok(self)
    }

    pub fn field(&self, field_id: &str) -> Option<&Field> {
        self.fields.get(field_id)
    }

    pub fn fields(&self) -> &BTreeMap<String, Field> {
        &self.fields
    }

    /// Ids of all fields eligible for keyword search.
    pub fn fulltext_fields(&self) -> Vec<&str> {
        self.fields
            .values()
            .filter(|f| f.data_type() == "text")
            .map(|f| f.field_id())
            .collect()
    }

    /// Index-level query mutation, run once before the tagged pre-search
    /// hooks. Validates the query's field references against this index.
    pub fn preprocess_search_query(&self, query: &mut SearchQuery) -> Result<()> {
        if let Some(fields) = query.fulltext_fields() {
            for field_id in fields {
                match self.field(field_id) {
                    None => {
                        return Err(Error::config(format!(
                            "unknown fulltext field '{field_id}' on index '{}'",
                            self.id
                        )));
                    }
                    Some(field) if field.data_type() != "text" => {
                        return Err(Error::config(format!(
                            "field '{field_id}' on index '{}' is not a fulltext field",
                            self.id
                        )));
                    }
                    Some(_) => {}
                }
            }
        }
        Ok(())
    }

    /// Index-level result mutation, run before the tagged post-search
    /// hooks. Result processors live upstream of this layer, so the
    /// default index leaves results untouched.
    pub fn postprocess_search_results(&self, _results: &mut ResultSet, _query: &SearchQuery) {}
}
