// SPDX-License-Identifier: MIT

//! State schema definitions

use crate::adk::error::{FlowError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Schema defining the fields of a [`DynamicState`](super::DynamicState)
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct StateSchema {
    /// Field definitions
    #[serde(flatten)]
    pub fields: BTreeMap<String, StateFieldDef>,
}

/// Definition of a single state field
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct StateFieldDef {
    /// Type of the field
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Default value
    #[serde(default)]
    pub default: Option<Value>,
    /// Must be present once defaults are applied
    #[serde(default)]
    pub required: bool,
}

impl StateFieldDef {
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            default: None,
            required: false,
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Supported field types
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Array,
    Object,
    Any,
}

impl FieldType {
    /// Whether `value` has this type; `null` never matches except for `any`
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Number => value.is_number(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Array => value.is_array(),
            FieldType::Object => value.is_object(),
            FieldType::Any => true,
        }
    }
}

impl StateSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field definition
    pub fn field(mut self, name: impl Into<String>, def: StateFieldDef) -> Self {
        self.fields.insert(name.into(), def);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Check a single value against its field definition
    ///
    /// An empty schema accepts any field.
    pub fn check_field(&self, name: &str, value: &Value) -> Result<()> {
        if self.fields.is_empty() {
            return Ok(());
        }

        let def = self
            .fields
            .get(name)
            .ok_or_else(|| FlowError::validation(format!("Unknown state field '{}'", name)))?;

        if !def.field_type.matches(value) {
            return Err(FlowError::validation(format!(
                "Field '{}' expects {:?}, got {}",
                name, def.field_type, value
            )));
        }
        Ok(())
    }

    /// Check a complete set of field values, including required fields
    pub fn check(&self, values: &serde_json::Map<String, Value>) -> Result<()> {
        for (name, value) in values {
            self.check_field(name, value)?;
        }

        for (name, def) in &self.fields {
            if def.required && !values.contains_key(name) {
                return Err(FlowError::validation(format!(
                    "Missing required field '{}'",
                    name
                )));
            }
        }
        Ok(())
    }
}
