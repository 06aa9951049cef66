// SPDX-License-Identifier: MIT

//! Schema-driven state for workflows without a dedicated state struct

use crate::adk::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

use super::node_state::{Context, NodeState};
use super::schema::StateSchema;

/// Workflow state whose fields are declared at runtime by a [`StateSchema`]
///
/// Serializes as a flat object: the schema fields alongside `context` and
/// `error`. The schema itself is not serialized, so a state rebuilt with
/// [`NodeState::from_json`] is unchecked; use [`DynamicState::new`] to keep it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DynamicState {
    #[serde(flatten)]
    fields: Map<String, Value>,
    #[serde(default)]
    context: Context,
    #[serde(default)]
    error: String,
    #[serde(skip)]
    schema: Arc<StateSchema>,
}

impl DynamicState {
    /// Create a state from a schema and initial values
    ///
    /// Defaults fill fields missing from `values`; the result must satisfy
    /// the schema.
    pub fn new(schema: StateSchema, values: Value) -> Result<Self> {
        let mut fields = match values {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(crate::adk::error::FlowError::validation(format!(
                    "State values must be an object, got {}",
                    other
                )))
            }
        };

        for (name, def) in &schema.fields {
            if let Some(default) = &def.default {
                fields
                    .entry(name.clone())
                    .or_insert_with(|| default.clone());
            }
        }

        let state = Self {
            fields,
            context: Context::new(),
            error: String::new(),
            schema: Arc::new(schema),
        };
        state.validate()?;
        Ok(state)
    }

    /// State with no schema; every field is accepted
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn schema(&self) -> &StateSchema {
        &self.schema
    }

    /// Get a field value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Get a nested field value using dot notation (e.g., "result.intent")
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.fields.get(parts.next()?)?;
        for part in parts {
            current = current.get(part)?;
        }
        Some(current)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Set a field, checking it against the schema
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        let key = key.into();
        let value = value.into();
        self.schema.check_field(&key, &value)?;
        self.fields.insert(key, value);
        Ok(())
    }

    /// Get all field names
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }
}

impl NodeState for DynamicState {
    fn context(&self) -> &Context {
        &self.context
    }

    fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    fn error(&self) -> Option<&str> {
        if self.error.is_empty() {
            None
        } else {
            Some(&self.error)
        }
    }

    fn set_error(&mut self, error: String) {
        self.error = error;
    }

    fn validate(&self) -> Result<()> {
        self.schema.check(&self.fields)
    }
}
