// SPDX-License-Identifier: MIT

use crate::adk::error::{FlowError, Result};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Trait for tools that can be exposed to the model.
///
/// `name()` and `description()` return `&str` and `schema()` returns `&Value`
/// so implementations keep them in struct fields instead of rebuilding them
/// on every request.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the tool name (must be unique within a node's tool set)
    fn name(&self) -> &str;

    /// Returns a human-readable description of what the tool does
    fn description(&self) -> &str;

    /// Returns the JSON schema for the tool's input parameters
    fn schema(&self) -> &Value;

    /// Execute the tool with the given input and return the result
    async fn execute(&self, input: Value) -> Result<Value>;
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub arguments: Value,
}

type Handler = Arc<dyn Fn(Value) -> Result<Value> + Send + Sync>;

/// Tool backed by a plain function and a JSON-Schema parameter description
pub struct FunctionTool {
    name: String,
    description: String,
    parameters: Value,
    handler: Handler,
}

impl FunctionTool {
    pub fn new<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
        handler: F,
    ) -> Self
    where
        F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            handler: Arc::new(handler),
        }
    }

    /// Build a tool whose parameter schema is derived from `A`
    ///
    /// Arguments are deserialized into `A` before the handler runs; a
    /// mismatch fails with [`FlowError::Tool`].
    pub fn typed<A, R, F>(name: impl Into<String>, description: impl Into<String>, f: F) -> Self
    where
        A: JsonSchema + DeserializeOwned + 'static,
        R: Serialize + 'static,
        F: Fn(A) -> Result<R> + Send + Sync + 'static,
    {
        let name = name.into();
        let parameters = serde_json::to_value(schemars::schema_for!(A))
            .unwrap_or_else(|_| json!({"type": "object"}));
        let tool_name = name.clone();

        Self::new(name, description, parameters, move |input| {
            let args: A =
                serde_json::from_value(input).map_err(|e| FlowError::tool(&tool_name, e))?;
            Ok(serde_json::to_value(f(args)?)?)
        })
    }

    /// Dictionary form handed to providers that take plain function specs
    pub fn to_spec(&self) -> Value {
        tool_spec(self)
    }
}

#[async_trait]
impl Tool for FunctionTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn schema(&self) -> &Value {
        &self.parameters
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        (self.handler)(input)
    }
}

fn tool_spec(tool: &dyn Tool) -> Value {
    json!({
        "name": tool.name(),
        "description": tool.description(),
        "parameters": tool.schema(),
    })
}

/// Node-local tool set, ordered by first registration
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool; an existing tool with the same name is replaced in place
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        match self.index.get(tool.name()) {
            Some(&i) => {
                log::debug!("Replacing tool '{}'", tool.name());
                self.tools[i] = tool;
            }
            None => {
                self.index.insert(tool.name().to_string(), self.tools.len());
                self.tools.push(tool);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Registered tools in registration order
    pub fn as_slice(&self) -> &[Arc<dyn Tool>] {
        &self.tools
    }

    /// All tools as `{name, description, parameters}` dictionaries
    pub fn to_specs(&self) -> Vec<Value> {
        self.tools.iter().map(|t| tool_spec(t.as_ref())).collect()
    }

    /// Execute a registered tool by name
    pub async fn call(&self, name: &str, args: Value) -> Result<Value> {
        let tool = self
            .get(name)
            .ok_or_else(|| FlowError::tool_not_found(name))?;
        tool.execute(args).await
    }
}
