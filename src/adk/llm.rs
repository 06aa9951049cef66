// SPDX-License-Identifier: MIT

//! LLM wrapper - the uniform call shape nodes use
//!
//! Wraps any [`Model`] behind `complete(prompt, tools?) -> {text, tool_calls}`
//! plus chat and structured-output helpers.

use crate::adk::error::{ModelError, Result};
use crate::adk::model::{Content, GenerationConfig, Model, Part};
use crate::adk::tool::{Tool, ToolCall};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

static CODE_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^\s*```(?:json)?\s*(.*?)\s*```\s*$").expect("static regex is valid")
});

/// Text plus any tool invocations returned by one model call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
}

impl Completion {
    pub fn from_content(content: &Content) -> Self {
        let tool_calls = content
            .parts
            .iter()
            .filter_map(|p| match p {
                Part::FunctionCall { id, name, args, .. } => Some(ToolCall {
                    id: id.clone(),
                    name: name.clone(),
                    arguments: args.clone(),
                }),
                _ => None,
            })
            .collect();

        Self {
            text: content.joined_text(),
            tool_calls,
        }
    }
}

/// Cheap-to-clone handle to a model plus default generation settings
#[derive(Clone)]
pub struct Llm {
    model: Arc<dyn Model>,
    config: Option<GenerationConfig>,
}

impl Llm {
    pub fn new(model: Arc<dyn Model>) -> Self {
        Self {
            model,
            config: None,
        }
    }

    pub fn with_config(mut self, config: GenerationConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn model(&self) -> &Arc<dyn Model> {
        &self.model
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    pub fn provider_name(&self) -> &str {
        self.model.provider_name()
    }

    /// Send a single user prompt, optionally exposing tools
    pub async fn complete(
        &self,
        prompt: &str,
        tools: Option<&[Arc<dyn Tool>]>,
    ) -> Result<Completion> {
        let history = [Content::text("user", prompt)];
        let content = self.generate(&history, self.config.as_ref(), tools).await?;
        Ok(Completion::from_content(&content))
    }

    /// Send a single user prompt and return only the text
    pub async fn invoke(&self, prompt: &str) -> Result<String> {
        Ok(self.complete(prompt, None).await?.text)
    }

    /// Send a full conversation and return the text of the reply
    pub async fn invoke_with_chat(&self, messages: &[Content]) -> Result<String> {
        let content = self.generate(messages, self.config.as_ref(), None).await?;
        Ok(content.joined_text())
    }

    /// Ask for output following `schema` and parse it as JSON
    pub async fn invoke_structured(&self, prompt: &str, schema: &Value) -> Result<Value> {
        let mut config = self.config.clone().unwrap_or_default();
        config.response_schema = Some(schema.clone());

        let history = [Content::text("user", prompt)];
        let content = self.generate(&history, Some(&config), None).await?;
        Ok(parse_json_output(&content.joined_text())?)
    }

    /// Raw model call used by the agent loop
    pub async fn generate(
        &self,
        history: &[Content],
        config: Option<&GenerationConfig>,
        tools: Option<&[Arc<dyn Tool>]>,
    ) -> Result<Content> {
        log::debug!(
            "Calling {}/{} with {} message(s)",
            self.provider_name(),
            self.model_name(),
            history.len()
        );
        Ok(self.model.generate_content(history, config, tools).await?)
    }

    pub(crate) fn config(&self) -> Option<&GenerationConfig> {
        self.config.as_ref()
    }
}

/// Parse model text as JSON, tolerating a surrounding markdown code fence
pub fn parse_json_output(text: &str) -> std::result::Result<Value, ModelError> {
    let body = CODE_FENCE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(text);

    serde_json::from_str(body.trim()).map_err(|e| {
        ModelError::InvalidResponse(format!("Expected JSON output ({}): {}", e, text))
    })
}
