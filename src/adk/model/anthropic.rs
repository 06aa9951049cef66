// SPDX-License-Identifier: MIT

//! Anthropic Model - Claude Messages API implementation

use super::{Content, GenerationConfig, Model, Part};
use crate::adk::error::ModelError;
use crate::adk::tool::Tool;
use crate::config::ProviderSettings;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::sync::Arc;

pub const PROVIDER_NAME: &str = "anthropic";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";

/// Anthropic Claude model implementation
pub struct AnthropicModel {
    client: Client,
    api_key: String,
    model_name: String,
    base_url: String,
}

impl AnthropicModel {
    /// Create a new AnthropicModel
    ///
    /// Fails with [`ModelError::ApiKeyMissing`] when no API key is configured.
    pub fn new(model_name: String, settings: &ProviderSettings) -> Result<Self, ModelError> {
        let api_key = settings
            .api_key
            .clone()
            .ok_or_else(|| ModelError::ApiKeyMissing(PROVIDER_NAME.to_string()))?;
        let base_url = settings
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Ok(Self {
            client: Client::new(),
            api_key,
            model_name,
            base_url,
        })
    }

    /// Extract system message from history
    fn extract_system_message(history: &[Content]) -> Option<String> {
        history
            .iter()
            .find(|c| c.role == "system")
            .and_then(|c| c.parts.first())
            .and_then(|p| match p {
                Part::Text(t) => Some(t.clone()),
                _ => None,
            })
    }

    /// Convert internal Content to Anthropic message format
    ///
    /// Calls without a provider id fall back to an id derived from the tool
    /// name.
    fn content_to_anthropic_message(content: &Content) -> Option<serde_json::Value> {
        if content.role == "system" {
            return None;
        }

        let role = match content.role.as_str() {
            "user" => "user",
            "model" => "assistant",
            other => other,
        };

        let message_content: Vec<serde_json::Value> = content
            .parts
            .iter()
            .map(|part| match part {
                Part::Text(t) => json!({ "type": "text", "text": t }),
                Part::Thinking(t) => json!({ "type": "thinking", "thinking": t }),
                Part::FunctionCall { id, name, args, .. } => json!({
                    "type": "tool_use",
                    "id": tool_use_id(id.as_deref(), name),
                    "name": name,
                    "input": args
                }),
                Part::FunctionResponse { id, name, response } => json!({
                    "type": "tool_result",
                    "tool_use_id": tool_use_id(id.as_deref(), name),
                    "content": serde_json::to_string(response).unwrap_or_default()
                }),
            })
            .collect();

        if message_content.is_empty() {
            return None;
        }

        Some(json!({
            "role": role,
            "content": message_content
        }))
    }

    fn tools_to_anthropic_format(tools: &[Arc<dyn Tool>]) -> Vec<serde_json::Value> {
        tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name(),
                    "description": t.description(),
                    "input_schema": t.schema()
                })
            })
            .collect()
    }

    /// Build the request body for the Messages endpoint
    fn build_body(
        &self,
        history: &[Content],
        config: Option<&GenerationConfig>,
        tools: Option<&[Arc<dyn Tool>]>,
    ) -> serde_json::Value {
        let messages: Vec<serde_json::Value> = history
            .iter()
            .filter_map(Self::content_to_anthropic_message)
            .collect();

        let mut body = json!({
            "model": self.model_name,
            "messages": messages,
            "max_tokens": config.and_then(|c| c.max_output_tokens).unwrap_or(4096)
        });

        let mut system = Self::extract_system_message(history);

        if let Some(cfg) = config {
            if let Some(temp) = cfg.temperature {
                body["temperature"] = json!(temp);
            }
            if let Some(top_p) = cfg.top_p {
                body["top_p"] = json!(top_p);
            }
            if let Some(top_k) = cfg.top_k {
                body["top_k"] = json!(top_k);
            }
            // No native structured output: the schema goes into the system prompt
            if let Some(schema) = &cfg.response_schema {
                let rule = format!(
                    "Respond only with a JSON document that validates against this JSON Schema:\n{}",
                    schema
                );
                system = Some(match system {
                    Some(s) => format!("{}\n\n{}", s, rule),
                    None => rule,
                });
            }
        }

        if let Some(sys) = system {
            body["system"] = json!(sys);
        }

        if let Some(tools) = tools {
            if !tools.is_empty() {
                body["tools"] = json!(Self::tools_to_anthropic_format(tools));
            }
        }

        body
    }

    /// Parse Anthropic response into Content
    fn parse_anthropic_response(response: &serde_json::Value) -> Result<Content, ModelError> {
        let content_blocks = response["content"].as_array().ok_or_else(|| {
            ModelError::InvalidResponse("No content in Anthropic response".to_string())
        })?;

        let mut parts = Vec::new();

        for block in content_blocks {
            match block["type"].as_str() {
                Some("text") => {
                    if let Some(text) = block["text"].as_str().filter(|t| !t.is_empty()) {
                        parts.push(Part::Text(text.to_string()));
                    }
                }
                Some("thinking") => {
                    if let Some(thinking) = block["thinking"].as_str().filter(|t| !t.is_empty()) {
                        parts.push(Part::Thinking(thinking.to_string()));
                    }
                }
                Some("tool_use") => {
                    parts.push(Part::FunctionCall {
                        id: block["id"].as_str().map(|id| id.to_string()),
                        name: block["name"].as_str().unwrap_or_default().to_string(),
                        args: block["input"].clone(),
                        thought_signature: None,
                    });
                }
                _ => {}
            }
        }

        if let Some(stop_reason) = response["stop_reason"].as_str() {
            log::debug!("Anthropic stop reason: {}", stop_reason);
        }

        Ok(Content {
            role: "model".to_string(),
            parts,
        })
    }
}

fn tool_use_id(id: Option<&str>, name: &str) -> String {
    match id {
        Some(id) => id.to_string(),
        None => format!("tool_{}", name),
    }
}

#[async_trait]
impl Model for AnthropicModel {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn provider_name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn generate_content(
        &self,
        history: &[Content],
        config: Option<&GenerationConfig>,
        tools: Option<&[Arc<dyn Tool>]>,
    ) -> Result<Content, ModelError> {
        let url = format!("{}/messages", self.base_url);
        let body = self.build_body(history, config, tools);

        log::debug!(
            "Anthropic request body: {}",
            serde_json::to_string_pretty(&body).unwrap_or_default()
        );

        let resp = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(ModelError::from_response("Anthropic", resp).await);
        }

        let resp_json: serde_json::Value = resp.json().await?;
        log::debug!("Anthropic response: {}", resp_json);

        Self::parse_anthropic_response(&resp_json)
    }
}
