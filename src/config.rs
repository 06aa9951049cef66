// SPDX-License-Identifier: MIT

//! Framework configuration
//!
//! Settings come from environment variables (after `dotenv`) or from a YAML
//! file. Values missing from the file are filled in from the environment.

use crate::adk::error::{FlowError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Default step budget for a single workflow run
pub const DEFAULT_RECURSION_LIMIT: usize = 100;

/// Credentials and endpoint for one provider
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProviderSettings {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

impl ProviderSettings {
    fn fill_from(&mut self, other: ProviderSettings) {
        if self.api_key.is_none() {
            self.api_key = other.api_key;
        }
        if self.base_url.is_none() {
            self.base_url = other.base_url;
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FrameworkConfig {
    #[serde(default)]
    pub anthropic: ProviderSettings,
    #[serde(default)]
    pub openai: ProviderSettings,
    #[serde(default)]
    pub google: ProviderSettings,
    #[serde(default)]
    pub lmstudio: ProviderSettings,
    /// Model used when none is given explicitly
    pub default_model: Option<String>,
    /// Step budget per run; unset means [`DEFAULT_RECURSION_LIMIT`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recursion_limit: Option<usize>,
}

impl FrameworkConfig {
    /// The configured step budget, or the default when unset
    pub fn recursion_limit(&self) -> usize {
        self.recursion_limit.unwrap_or(DEFAULT_RECURSION_LIMIT)
    }

    /// Build the configuration from process environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let settings = |key: &str, url: &str| ProviderSettings {
            api_key: lookup(key).filter(|v| !v.is_empty()),
            base_url: lookup(url).filter(|v| !v.is_empty()),
        };

        let recursion_limit = lookup("AGENTFLOW_RECURSION_LIMIT").and_then(|raw| {
            match raw.parse::<usize>() {
                Ok(limit) if limit > 0 => Some(limit),
                _ => {
                    log::warn!(
                        "Ignoring invalid AGENTFLOW_RECURSION_LIMIT '{}', using {}",
                        raw,
                        DEFAULT_RECURSION_LIMIT
                    );
                    None
                }
            }
        });

        Self {
            anthropic: settings("ANTHROPIC_API_KEY", "ANTHROPIC_BASE_URL"),
            openai: settings("OPENAI_API_KEY", "OPENAI_BASE_URL"),
            google: settings("GOOGLE_API_KEY", "GOOGLE_BASE_URL"),
            lmstudio: ProviderSettings {
                api_key: None,
                base_url: lookup("LMSTUDIO_HOST").filter(|v| !v.is_empty()),
            },
            default_model: lookup("AGENTFLOW_MODEL").filter(|v| !v.is_empty()),
            recursion_limit,
        }
    }

    /// Parse a YAML configuration document
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: FrameworkConfig = serde_yaml::from_str(content)?;
        if config.recursion_limit == Some(0) {
            return Err(FlowError::config(
                "recursion_limit must be greater than zero",
            ));
        }
        Ok(config)
    }

    /// Load a YAML file, then fill unset values from the environment
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let mut config = Self::from_yaml_str(&content)?;
        config.merge_missing(Self::from_env());
        Ok(config)
    }

    /// Fill every unset value from `other`
    pub fn merge_missing(&mut self, other: FrameworkConfig) {
        self.anthropic.fill_from(other.anthropic);
        self.openai.fill_from(other.openai);
        self.google.fill_from(other.google);
        self.lmstudio.fill_from(other.lmstudio);
        if self.default_model.is_none() {
            self.default_model = other.default_model;
        }
        if self.recursion_limit.is_none() {
            self.recursion_limit = other.recursion_limit;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_from_lookup_reads_provider_keys() {
        let config = FrameworkConfig::from_lookup(lookup(&[
            ("ANTHROPIC_API_KEY", "sk-ant"),
            ("OPENAI_BASE_URL", "http://proxy/v1"),
            ("LMSTUDIO_HOST", "http://localhost:1234/v1/"),
            ("GOOGLE_API_KEY", ""),
        ]));

        assert_eq!(config.anthropic.api_key.as_deref(), Some("sk-ant"));
        assert_eq!(config.openai.base_url.as_deref(), Some("http://proxy/v1"));
        assert_eq!(
            config.lmstudio.base_url.as_deref(),
            Some("http://localhost:1234/v1/")
        );
        assert!(config.google.api_key.is_none());
        assert_eq!(config.recursion_limit(), DEFAULT_RECURSION_LIMIT);
    }

    #[test]
    fn test_invalid_recursion_limit_falls_back() {
        let config =
            FrameworkConfig::from_lookup(lookup(&[("AGENTFLOW_RECURSION_LIMIT", "lots")]));
        assert_eq!(config.recursion_limit, None);
        assert_eq!(config.recursion_limit(), DEFAULT_RECURSION_LIMIT);

        let config = FrameworkConfig::from_lookup(lookup(&[("AGENTFLOW_RECURSION_LIMIT", "0")]));
        assert_eq!(config.recursion_limit, None);

        let config = FrameworkConfig::from_lookup(lookup(&[("AGENTFLOW_RECURSION_LIMIT", "7")]));
        assert_eq!(config.recursion_limit(), 7);
    }

    #[test]
    fn test_from_yaml_str() {
        let yaml = r#"
            anthropic:
              api_key: from-file
            default_model: claude-3-5-haiku-latest
            recursion_limit: 12
        "#;
        let config = FrameworkConfig::from_yaml_str(yaml).unwrap();

        assert_eq!(config.anthropic.api_key.as_deref(), Some("from-file"));
        assert_eq!(config.openai, ProviderSettings::default());
        assert_eq!(
            config.default_model.as_deref(),
            Some("claude-3-5-haiku-latest")
        );
        assert_eq!(config.recursion_limit(), 12);
    }

    #[test]
    fn test_zero_recursion_limit_rejected() {
        assert!(FrameworkConfig::from_yaml_str("recursion_limit: 0").is_err());
    }

    #[test]
    fn test_merge_missing_keeps_file_values() {
        let mut config =
            FrameworkConfig::from_yaml_str("anthropic:\n  api_key: from-file\n").unwrap();
        let env = FrameworkConfig::from_lookup(lookup(&[
            ("ANTHROPIC_API_KEY", "from-env"),
            ("OPENAI_API_KEY", "openai-env"),
        ]));

        config.merge_missing(env);
        assert_eq!(config.anthropic.api_key.as_deref(), Some("from-file"));
        assert_eq!(config.openai.api_key.as_deref(), Some("openai-env"));
    }

    #[test]
    fn test_env_recursion_limit_fills_yaml_gap() {
        let mut config = FrameworkConfig::from_yaml_str("default_model: gpt-4o\n").unwrap();
        assert_eq!(config.recursion_limit, None);

        config.merge_missing(FrameworkConfig::from_lookup(lookup(&[(
            "AGENTFLOW_RECURSION_LIMIT",
            "25",
        )])));
        assert_eq!(config.recursion_limit(), 25);

        let mut config = FrameworkConfig::from_yaml_str("recursion_limit: 8").unwrap();
        config.merge_missing(FrameworkConfig::from_lookup(lookup(&[(
            "AGENTFLOW_RECURSION_LIMIT",
            "25",
        )])));
        assert_eq!(config.recursion_limit(), 8);
    }
}
