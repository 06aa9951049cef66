// SPDX-License-Identifier: MIT

//! Typed error handling for agentflow-rs
//!
//! Every fallible operation in the crate returns [`FlowError`]. Provider
//! failures are carried unchanged inside [`ModelError`], graph construction
//! problems inside [`WorkflowError`].

use thiserror::Error;

/// Crate-wide result alias
pub type Result<T, E = FlowError> = std::result::Result<T, E>;

/// Top-level error type for agentflow-rs
#[derive(Debug, Error)]
pub enum FlowError {
    /// A state field failed its schema check
    #[error("Validation error: {0}")]
    Validation(String),

    /// A blocking guardrail pattern matched the model output
    #[error("Guardrail '{guardrail}' blocked output: {message}")]
    GuardrailViolation {
        guardrail: String,
        pattern: Option<String>,
        message: String,
    },

    /// A condition returned a key that has no destination
    #[error("Unknown branch '{key}' returned by condition on node '{node}'")]
    UnknownBranch { node: String, key: String },

    /// Errors from LLM providers, passed through unchanged
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Graph construction and execution errors
    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    /// Tool not registered on the node
    #[error("Tool '{name}' not found")]
    ToolNotFound { name: String },

    /// Tool execution failed
    #[error("Tool '{name}' failed: {message}")]
    Tool { name: String, message: String },

    /// Configuration errors (missing env vars, invalid config)
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// Generic error wrapper
    #[error("{0}")]
    Other(String),
}

/// Workflow-specific errors
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Workflow compiled without any node
    #[error("Workflow has no nodes")]
    Empty,

    /// Two nodes share the same name
    #[error("Node with name '{0}' already exists")]
    DuplicateNode(String),

    /// An edge or anchor refers to a node that is not part of the workflow
    #[error("Node with name '{0}' does not exist")]
    UnknownNode(String),

    /// Conditional edge specification is unusable
    #[error("Invalid conditional edge on node '{node}': {reason}")]
    InvalidEdge { node: String, reason: String },

    /// No path from the entry node reaches the end
    #[error("No path from entry node '{0}' reaches the end")]
    NoTerminal(String),

    /// Run exceeded its step budget (cycles without exit)
    #[error("Workflow exceeded recursion limit of {limit} steps")]
    RecursionLimit { limit: usize },
}

/// Model/LLM-specific errors
#[derive(Debug, Error)]
pub enum ModelError {
    /// API key not configured
    #[error("API key not configured for provider: {0}")]
    ApiKeyMissing(String),

    /// Provider could not be inferred or is not registered
    #[error("Cannot determine provider for model: {0}")]
    UnknownProvider(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded, retry after {retry_after_secs:?} seconds")]
    RateLimited { retry_after_secs: Option<u64> },

    /// Non-success response from the provider API
    #[error("{provider} API error ({status}): {message}")]
    Api {
        provider: String,
        status: u16,
        message: String,
    },

    /// Invalid response from model
    #[error("Invalid response from model: {0}")]
    InvalidResponse(String),

    /// Network failures
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl FlowError {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a tool not found error
    pub fn tool_not_found(name: impl Into<String>) -> Self {
        Self::ToolNotFound { name: name.into() }
    }

    /// Create a tool execution error
    pub fn tool(name: impl Into<String>, message: impl ToString) -> Self {
        Self::Tool {
            name: name.into(),
            message: message.to_string(),
        }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create from a generic error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

impl ModelError {
    /// Create an API error
    pub fn api(provider: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            provider: provider.into(),
            status,
            message: message.into(),
        }
    }

    /// Map a failed HTTP response to the matching error, consuming its body
    pub(crate) async fn from_response(provider: &str, resp: reqwest::Response) -> Self {
        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            return Self::RateLimited { retry_after_secs };
        }

        let text = resp.text().await.unwrap_or_default();
        Self::api(provider, status.as_u16(), text)
    }
}

impl From<&str> for FlowError {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}

impl From<String> for FlowError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guardrail_violation_display() {
        let err = FlowError::GuardrailViolation {
            guardrail: "content_filter".to_string(),
            pattern: Some("bad word".to_string()),
            message: "Inappropriate content detected".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Guardrail 'content_filter' blocked output: Inappropriate content detected"
        );
    }

    #[test]
    fn test_model_error_passes_through_unchanged() {
        let err: FlowError = ModelError::RateLimited {
            retry_after_secs: Some(30),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Rate limit exceeded, retry after Some(30) seconds"
        );
        assert!(matches!(
            err,
            FlowError::Model(ModelError::RateLimited { .. })
        ));
    }

    #[test]
    fn test_workflow_error_wraps() {
        let err: FlowError = WorkflowError::DuplicateNode("a".to_string()).into();
        assert_eq!(
            err.to_string(),
            "Workflow error: Node with name 'a' already exists"
        );
    }
}
