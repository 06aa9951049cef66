// SPDX-License-Identifier: MIT

//! Model factory - picks a provider adapter for a model name

use super::anthropic::AnthropicModel;
use super::gemini::GeminiModel;
use super::openai::OpenAIModel;
use super::Model;
use crate::adk::error::ModelError;
use crate::config::FrameworkConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Supported LLM providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    Anthropic,
    OpenAI,
    Google,
    LmStudio,
}

impl ProviderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderType::Anthropic => super::anthropic::PROVIDER_NAME,
            ProviderType::OpenAI => super::openai::PROVIDER_NAME,
            ProviderType::Google => super::gemini::PROVIDER_NAME,
            ProviderType::LmStudio => super::openai::LMSTUDIO_PROVIDER_NAME,
        }
    }

    /// Infer the provider from well-known model name prefixes
    pub fn infer(model_name: &str) -> Option<Self> {
        if model_name.starts_with("claude-") {
            Some(ProviderType::Anthropic)
        } else if model_name.starts_with("gemini-") {
            Some(ProviderType::Google)
        } else if model_name.starts_with("gpt-") {
            Some(ProviderType::OpenAI)
        } else {
            None
        }
    }

    /// Prefix inference, then membership in the models LM Studio has loaded
    pub fn infer_with_loaded(model_name: &str, loaded: &[String]) -> Option<Self> {
        Self::infer(model_name).or_else(|| {
            loaded
                .iter()
                .any(|m| m == model_name)
                .then_some(ProviderType::LmStudio)
        })
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "anthropic" => Ok(ProviderType::Anthropic),
            "openai" => Ok(ProviderType::OpenAI),
            "google" | "gemini" => Ok(ProviderType::Google),
            "lmstudio" => Ok(ProviderType::LmStudio),
            other => Err(ModelError::UnknownProvider(other.to_string())),
        }
    }
}

/// Creates model instances with a unified interface
pub struct ModelFactory {
    config: FrameworkConfig,
}

impl ModelFactory {
    pub fn new(config: FrameworkConfig) -> Self {
        Self { config }
    }

    /// Create a model instance for the given model name
    ///
    /// When `provider` is `None` the provider is inferred from the model name.
    pub fn create(
        &self,
        model_name: &str,
        provider: Option<ProviderType>,
    ) -> Result<Arc<dyn Model>, ModelError> {
        let provider = provider
            .or_else(|| ProviderType::infer(model_name))
            .ok_or_else(|| ModelError::UnknownProvider(model_name.to_string()))?;

        log::info!("Using provider: {} with model: {}", provider, model_name);

        let name = model_name.to_string();
        let model: Arc<dyn Model> = match provider {
            ProviderType::Anthropic => {
                Arc::new(AnthropicModel::new(name, &self.config.anthropic)?)
            }
            ProviderType::OpenAI => Arc::new(OpenAIModel::new(name, &self.config.openai)?),
            ProviderType::Google => Arc::new(GeminiModel::new(name, &self.config.google)?),
            ProviderType::LmStudio => Arc::new(OpenAIModel::lmstudio(name, &self.config.lmstudio)),
        };
        Ok(model)
    }

    /// Pick the provider for `model_name`
    ///
    /// An explicit provider wins, then the name prefix. Otherwise LM Studio is
    /// asked for its loaded models; an unreachable server counts as none.
    pub async fn resolve_provider(
        &self,
        model_name: &str,
        provider: Option<ProviderType>,
    ) -> Result<ProviderType, ModelError> {
        if let Some(provider) = provider.or_else(|| ProviderType::infer(model_name)) {
            return Ok(provider);
        }

        let loaded = match self.list_lmstudio_models().await {
            Ok(models) => models,
            Err(e) => {
                log::warn!("Could not list LM Studio models: {}", e);
                Vec::new()
            }
        };
        ProviderType::infer_with_loaded(model_name, &loaded)
            .ok_or_else(|| ModelError::UnknownProvider(model_name.to_string()))
    }

    /// [`resolve_provider`](Self::resolve_provider) followed by [`create`](Self::create)
    pub async fn create_resolved(
        &self,
        model_name: &str,
        provider: Option<ProviderType>,
    ) -> Result<Arc<dyn Model>, ModelError> {
        let provider = self.resolve_provider(model_name, provider).await?;
        self.create(model_name, Some(provider))
    }

    /// List the models currently loaded in LM Studio
    pub async fn list_lmstudio_models(&self) -> Result<Vec<String>, ModelError> {
        let host = self
            .config
            .lmstudio
            .base_url
            .clone()
            .unwrap_or_else(|| super::openai::DEFAULT_LMSTUDIO_HOST.to_string());
        let url = format!("{}/models", host.trim_end_matches('/'));

        let resp = reqwest::Client::new().get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(ModelError::from_response("LM Studio", resp).await);
        }

        let data: serde_json::Value = resp.json().await?;
        Ok(parse_model_list(&data))
    }
}

fn parse_model_list(data: &serde_json::Value) -> Vec<String> {
    data["data"]
        .as_array()
        .map(|models| {
            models
                .iter()
                .filter(|m| m["object"] == "model")
                .filter_map(|m| m["id"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
