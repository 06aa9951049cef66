// SPDX-License-Identifier: MIT

//! Gemini Model - Google's Gemini API implementation

use super::{Content, GenerationConfig, Model, Part};
use crate::adk::error::ModelError;
use crate::adk::tool::Tool;
use crate::config::ProviderSettings;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::sync::Arc;

pub const PROVIDER_NAME: &str = "google";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Gemini model implementation
pub struct GeminiModel {
    client: Client,
    api_key: String,
    model_name: String,
    base_url: String,
}

impl GeminiModel {
    /// Create a new GeminiModel
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

    fn build_body(
        history: &[Content],
        config: Option<&GenerationConfig>,
        tools: Option<&[Arc<dyn Tool>]>,
    ) -> serde_json::Value {
        // Gemini only knows "user" and "model"; system text goes to systemInstruction
        let contents: Vec<serde_json::Value> = history
            .iter()
            .filter(|c| c.role != "system")
            .map(|c| {
                let parts: Vec<serde_json::Value> =
                    c.parts.iter().filter_map(part_to_gemini_json).collect();
                json!({ "role": c.role, "parts": parts })
            })
            .collect();

        let mut body = json!({ "contents": contents });

        let system: Vec<serde_json::Value> = history
            .iter()
            .filter(|c| c.role == "system")
            .flat_map(|c| c.parts.iter().filter_map(part_to_gemini_json))
            .collect();
        if !system.is_empty() {
            body["systemInstruction"] = json!({ "parts": system });
        }

        if let Some(cfg) = config {
            let mut generation = json!({});
            if let Some(temp) = cfg.temperature {
                generation["temperature"] = json!(temp);
            }
            if let Some(max_tokens) = cfg.max_output_tokens {
                generation["maxOutputTokens"] = json!(max_tokens);
            }
            if let Some(top_p) = cfg.top_p {
                generation["topP"] = json!(top_p);
            }
            if let Some(top_k) = cfg.top_k {
                generation["topK"] = json!(top_k);
            }
            if let Some(schema) = &cfg.response_schema {
                generation["responseMimeType"] = json!("application/json");
                generation["responseSchema"] = schema.clone();
            }
            body["generationConfig"] = generation;
        }

        if let Some(tools) = tools {
            if !tools.is_empty() {
                let function_declarations: Vec<serde_json::Value> = tools
                    .iter()
                    .map(|t| {
                        json!({
                            "name": t.name(),
                            "description": t.description(),
                            "parameters": t.schema()
                        })
                    })
                    .collect();

                body["tools"] = json!([{
                    "function_declarations": function_declarations
                }]);
            }
        }

        body
    }

    fn parse_gemini_response(resp_json: &serde_json::Value) -> Result<Content, ModelError> {
        let candidate = resp_json["candidates"]
            .as_array()
            .and_then(|c| c.first())
            .ok_or_else(|| ModelError::InvalidResponse("No candidates in response".into()))?;

        if let Some(finish_reason) = candidate.get("finishReason").and_then(|v| v.as_str()) {
            log::debug!("Gemini finish reason: {}", finish_reason);
            match finish_reason {
                "UNEXPECTED_TOOL_CALL" => {
                    return Err(ModelError::InvalidResponse(
                        "Gemini returned UNEXPECTED_TOOL_CALL. The tool schema may be incompatible."
                            .into(),
                    ))
                }
                "SAFETY" => {
                    return Err(ModelError::InvalidResponse(
                        "Gemini blocked response due to safety filters.".into(),
                    ))
                }
                _ => {}
            }
        }

        let parts_json = candidate["content"]["parts"].as_array().ok_or_else(|| {
            log::error!("No parts in candidate. Full response: {}", resp_json);
            ModelError::InvalidResponse(format!("No content in Gemini response: {}", candidate))
        })?;

        Ok(Content {
            role: "model".to_string(),
            parts: parts_json.iter().flat_map(parse_gemini_part).collect(),
        })
    }
}

/// Serialize a Part to Gemini API JSON format
/// Returns None for parts that shouldn't be sent (e.g., Thinking)
fn part_to_gemini_json(part: &Part) -> Option<serde_json::Value> {
    match part {
        Part::Text(t) => Some(json!({ "text": t })),
        Part::Thinking(_) => None,
        Part::FunctionCall {
            name,
            args,
            thought_signature,
            ..
        } => {
            let mut fc = json!({ "functionCall": { "name": name, "args": args } });
            if let Some(sig) = thought_signature {
                fc["thoughtSignature"] = json!(sig);
            }
            Some(fc)
        }
        Part::FunctionResponse { name, response, .. } => {
            Some(json!({ "functionResponse": { "name": name, "response": response } }))
        }
    }
}

/// Parse a Gemini API JSON part into Parts
fn parse_gemini_part(p: &serde_json::Value) -> Vec<Part> {
    let mut parts = Vec::new();

    if let Some(thought) = p.get("thought").and_then(|t| t.as_str()) {
        if !thought.is_empty() {
            parts.push(Part::Thinking(thought.to_string()));
        }
    }

    if let Some(text) = p["text"].as_str() {
        parts.push(Part::Text(text.to_string()));
    } else if let Some(fc) = p.get("functionCall") {
        parts.push(Part::FunctionCall {
            id: None,
            name: fc["name"].as_str().unwrap_or_default().to_string(),
            args: fc["args"].clone(),
            thought_signature: p
                .get("thoughtSignature")
                .and_then(|s| s.as_str())
                .map(|s| s.to_string()),
        });
    }

    parts
}

#[async_trait]
impl Model for GeminiModel {
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
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model_name, self.api_key
        );
        let body = Self::build_body(history, config, tools);

        log::debug!(
            "Gemini request body: {}",
            serde_json::to_string_pretty(&body).unwrap_or_default()
        );

        let resp = self.client.post(&url).json(&body).send().await?;

        if !resp.status().is_success() {
            return Err(ModelError::from_response("Gemini", resp).await);
        }

        let resp_json: serde_json::Value = resp.json().await?;
        log::debug!("Gemini response: {}", resp_json);

        Self::parse_gemini_response(&resp_json)
    }
}
