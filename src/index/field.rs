//! A single indexable property mapped to a typed search field.

use serde_json::{Map, Value, json};

use crate::error::{Error, Result};

/// Maps one entity property onto a typed, searchable field of an index.
///
/// Holds only the owning index's id, never a live reference; a field
/// deserialized from settings is rehydrated against its index by id.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    index_id: String,
    field_id: String,
    label: Option<String>,
    datasource_id: Option<String>,
    property_path: String,
    data_type: String,
    boost: f32,
    indexed_locked: bool,
    type_locked: bool,
    configuration: Map<String, Value>,
    dependencies: Vec<String>,
}

impl Field {
    pub fn new(
        index_id: impl Into<String>,
        field_id: impl Into<String>,
        property_path: impl Into<String>,
        data_type: impl Into<String>,
    ) -> Self {
        Self {
            index_id: index_id.into(),
            field_id: field_id.into(),
            label: None,
            datasource_id: None,
            property_path: property_path.into(),
            data_type: data_type.into(),
            boost: 1.0,
            indexed_locked: false,
            type_locked: false,
            configuration: Map::new(),
            dependencies: Vec::new(),
        }
    }

    pub fn index_id(&self) -> &str {
        &self.index_id
    }

    pub fn field_id(&self) -> &str {
        &self.field_id
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn set_label(&mut self, label: impl Into<String>) -> &mut Self {
        self.label = Some(label.into());
        self
    }

    pub fn datasource_id(&self) -> Option<&str> {
        self.datasource_id.as_deref()
    }

    pub fn set_datasource_id(&mut self, datasource_id: impl Into<String>) -> &mut Self {
        self.datasource_id = Some(datasource_id.into());
        self
    }

    pub fn property_path(&self) -> &str {
        &self.property_path
    }

    pub fn data_type(&self) -> &str {
        &self.data_type
    }

    /// Change the field's data type.
    ///
    /// Fails with a configuration error on a type-locked field when the
    /// requested type differs from the current one; setting the same type
    /// on a locked field is a no-op.
    pub fn set_type(&mut self, data_type: &str) -> Result<()> {
        if self.type_locked && data_type != self.data_type {
            return Err(Error::config(format!(
                "cannot change the type of type-locked field '{}' on index '{}'",
                self.field_id, self.index_id
            )));
        }
        self.data_type = data_type.to_string();
        Ok(())
    }

    pub fn boost(&self) -> f32 {
        self.boost
    }

    pub fn set_boost(&mut self, boost: f32) -> &mut Self {
        self.boost = boost;
        self
    }

    pub fn is_indexed_locked(&self) -> bool {
        self.indexed_locked
    }

    pub fn set_indexed_locked(&mut self, locked: bool) -> &mut Self {
        self.indexed_locked = locked;
        self
    }

    pub fn is_type_locked(&self) -> bool {
        self.type_locked
    }

    pub fn set_type_locked(&mut self, locked: bool) -> &mut Self {
        self.type_locked = locked;
        self
    }

    /// Free-form configuration, used by computed or aggregated fields.
    pub fn configuration(&self) -> &Map<String, Value> {
        &self.configuration
    }

    pub fn set_configuration(&mut self, configuration: Map<String, Value>) -> &mut Self {
        self.configuration = configuration;
        self
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn set_dependencies(&mut self, dependencies: Vec<String>) -> &mut Self {
        self.dependencies = dependencies;
        self
    }

    /// Serialize to a settings map.
    ///
    /// Sparse: attributes at their defaults (boost 1.0, unset locks, empty
    /// configuration and dependencies) are omitted entirely, so the map
    /// round-trips byte-for-byte through [`Field::from_settings`].
    pub fn settings(&self) -> Map<String, Value> {
        let mut settings = Map::new();
        if let Some(label) = &self.label {
            settings.insert("label".to_string(), json!(label));
        }
        if let Some(datasource_id) = &self.datasource_id {
            settings.insert("datasource_id".to_string(), json!(datasource_id));
        }
        settings.insert("property_path".to_string(), json!(self.property_path));
        settings.insert("type".to_string(), json!(self.data_type));
        if self.boost != 1.0 {
            settings.insert("boost".to_string(), json!(self.boost));
        }
        if self.indexed_locked {
            settings.insert("indexed_locked".to_string(), json!(true));
        }
        if self.type_locked {
            settings.insert("type_locked".to_string(), json!(true));
        }
        if !self.configuration.is_empty() {
            settings.insert(
                "configuration".to_string(),
                Value::Object(self.configuration.clone()),
            );
        }
        if !self.dependencies.is_empty() {
            settings.insert("dependencies".to_string(), json!(self.dependencies));
        }
        settings
    }

    /// Rehydrate a field from a sparse settings map.
    pub fn from_settings(
        index_id: impl Into<String>,
        field_id: impl Into<String>,
        settings: &Map<String, Value>,
    ) -> Result<Self> {
        let field_id = field_id.into();
        let property_path = settings
            .get("property_path")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                Error::config(format!("field '{field_id}' settings lack a property path"))
            })?;
        let data_type = settings.get("type").and_then(Value::as_str).ok_or_else(|| {
            Error::config(format!("field '{field_id}' settings lack a data type"))
        })?;

        let mut field = Field::new(index_id, field_id, property_path, data_type);
        if let Some(label) = settings.get("label").and_then(Value::as_str) {
            field.set_label(label);
        }
        if let Some(datasource_id) = settings.get("datasource_id").and_then(Value::as_str) {
            field.set_datasource_id(datasource_id);
        }
        if let Some(boost) = settings.get("boost").and_then(Value::as_f64) {
            field.set_boost(boost as f32);
        }
        if let Some(true) = settings.get("indexed_locked").and_then(Value::as_bool) {
            field.set_indexed_locked(true);
        }
        if let Some(true) = settings.get("type_locked").and_then(Value::as_bool) {
            field.set_type_locked(true);
        }
        if let Some(Value::Object(configuration)) = settings.get("configuration") {
            field.set_configuration(configuration.clone());
        }
        if let Some(Value::Array(dependencies)) = settings.get("dependencies") {
            field.set_dependencies(
                dependencies
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect(),
            );
        }
        Ok(field)
    }
}
