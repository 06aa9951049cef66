// SPDX-License-Identifier: MIT

//! OpenAI Model - Chat Completions API implementation
//!
//! LM Studio exposes the same API locally, so [`OpenAIModel::lmstudio`]
//! reuses this adapter with a different base URL and provider name.

use super::{Content, GenerationConfig, Model, Part};
use crate::adk::error::ModelError;
use crate::adk::tool::Tool;
use crate::config::ProviderSettings;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::sync::Arc;

pub const PROVIDER_NAME: &str = "openai";
pub const LMSTUDIO_PROVIDER_NAME: &str = "lmstudio";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_LMSTUDIO_HOST: &str = "http://localhost:1234/v1";

/// OpenAI-compatible chat model implementation
pub struct OpenAIModel {
    client: Client,
    api_key: String,
    model_name: String,
    base_url: String,
    provider: &'static str,
}

impl OpenAIModel {
    /// Create a new OpenAIModel
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
            base_url: base_url.trim_end_matches('/').to_string(),
            provider: PROVIDER_NAME,
        })
    }

    /// Create a model served by a local LM Studio instance (no API key needed)
    pub fn lmstudio(model_name: String, settings: &ProviderSettings) -> Self {
        let base_url = settings
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_LMSTUDIO_HOST.to_string());

        Self {
            client: Client::new(),
            api_key: settings
                .api_key
                .clone()
                .unwrap_or_else(|| "dummy".to_string()),
            model_name,
            base_url: base_url.trim_end_matches('/').to_string(),
            provider: LMSTUDIO_PROVIDER_NAME,
        }
    }

    /// Convert internal Content to OpenAI messages
    ///
    /// Tool results become one `tool` message each; everything else maps to a
    /// single message. Calls without a provider id fall back to the tool name.
    fn content_to_openai_messages(content: &Content) -> Vec<serde_json::Value> {
        let role = match content.role.as_str() {
            "model" => "assistant",
            other => other,
        };

        let tool_results: Vec<serde_json::Value> = content
            .parts
            .iter()
            .filter_map(|part| match part {
                Part::FunctionResponse { id, name, response } => Some(json!({
                    "role": "tool",
                    "tool_call_id": id.as_deref().unwrap_or(name.as_str()),
                    "content": serde_json::to_string(response).unwrap_or_default()
                })),
                _ => None,
            })
            .collect();
        if !tool_results.is_empty() {
            return tool_results;
        }

        let mut tool_calls = Vec::new();
        let mut text_content = String::new();

        for part in &content.parts {
            match part {
                Part::Text(t) => text_content.push_str(t),
                Part::Thinking(_) => {}
                Part::FunctionCall { id, name, args, .. } => {
                    tool_calls.push(json!({
                        "id": id.as_deref().unwrap_or(name.as_str()),
                        "type": "function",
                        "function": {
                            "name": name,
                            "arguments": serde_json::to_string(args).unwrap_or_default()
                        }
                    }));
                }
                Part::FunctionResponse { .. } => {}
            }
        }

        let message = if !tool_calls.is_empty() {
            json!({
                "role": role,
                "content": if text_content.is_empty() { serde_json::Value::Null } else { json!(text_content) },
                "tool_calls": tool_calls
            })
        } else {
            json!({
                "role": role,
                "content": text_content
            })
        };
        vec![message]
    }

    fn tools_to_openai_format(tools: &[Arc<dyn Tool>]) -> Vec<serde_json::Value> {
        tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name(),
                        "description": t.description(),
                        "parameters": t.schema()
                    }
                })
            })
            .collect()
    }

    pub(crate) fn build_body(
        &self,
        history: &[Content],
        config: Option<&GenerationConfig>,
        tools: Option<&[Arc<dyn Tool>]>,
    ) -> serde_json::Value {
        let messages: Vec<serde_json::Value> = history
            .iter()
            .flat_map(Self::content_to_openai_messages)
            .collect();

        let mut body = json!({
            "model": self.model_name,
            "messages": messages
        });

        if let Some(cfg) = config {
            if let Some(temp) = cfg.temperature {
                body["temperature"] = json!(temp);
            }
            if let Some(max_tokens) = cfg.max_output_tokens {
                body["max_tokens"] = json!(max_tokens);
            }
            if let Some(top_p) = cfg.top_p {
                body["top_p"] = json!(top_p);
            }
            if let Some(schema) = &cfg.response_schema {
                body["response_format"] = json!({
                    "type": "json_schema",
                    "json_schema": { "name": "output", "schema": schema }
                });
            }
        }

        if let Some(tools) = tools {
            if !tools.is_empty() {
                body["tools"] = json!(Self::tools_to_openai_format(tools));
                body["tool_choice"] = json!("auto");
            }
        }

        body
    }

    /// Parse OpenAI response into Content
    fn parse_openai_response(response: &serde_json::Value) -> Result<Content, ModelError> {
        let choice = response["choices"]
            .as_array()
            .and_then(|c| c.first())
            .ok_or_else(|| ModelError::InvalidResponse("No choices in OpenAI response".into()))?;

        let message = &choice["message"];
        let mut parts = Vec::new();

        if let Some(content) = message["content"].as_str().filter(|c| !c.is_empty()) {
            parts.push(Part::Text(content.to_string()));
        }

        if let Some(tool_calls) = message["tool_calls"].as_array() {
            for tc in tool_calls {
                let name = tc["function"]["name"]
                    .as_str()
                    .unwrap_or_default()
                    .to_string();
                let args_str = tc["function"]["arguments"].as_str().unwrap_or("{}");
                let args: serde_json::Value = serde_json::from_str(args_str).unwrap_or(json!({}));

                parts.push(Part::FunctionCall {
                    id: tc["id"].as_str().map(|id| id.to_string()),
                    name,
                    args,
                    thought_signature: None,
                });
            }
        }

        Ok(Content {
            role: "model".to_string(),
            parts,
        })
    }
}

#[async_trait]
impl Model for OpenAIModel {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn provider_name(&self) -> &str {
        self.provider
    }

    async fn generate_content(
        &self,
        history: &[Content],
        config: Option<&GenerationConfig>,
        tools: Option<&[Arc<dyn Tool>]>,
    ) -> Result<Content, ModelError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_body(history, config, tools);

        log::debug!(
            "{} request body: {}",
            self.provider,
            serde_json::to_string_pretty(&body).unwrap_or_default()
        );

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(ModelError::from_response(self.provider, resp).await);
        }

        let resp_json: serde_json::Value = resp.json().await?;
        log::debug!("{} response: {}", self.provider, resp_json);

        Self::parse_openai_response(&resp_json)
    }
}
