// SPDX-License-Identifier: MIT

//! Agent nodes - the units of work a workflow executes
//!
//! A node embeds a [`NodeCore`] (config, LLM, tools, guardrails) and
//! implements [`AgentNode::proc`]. The runtime never calls `proc` directly:
//! [`execute`] wraps it with validation, logging and context sharing.

mod config;
mod node_core;
mod multi_step;

pub use self::config::NodeConfig;
pub use self::node_core::{NodeCore, ToolResponse, DEFAULT_MAX_TOOL_TURNS};
pub use self::multi_step::{MultiStepNode, Step};

pub(crate) use self::config::node_id;

use crate::adk::error::Result;
use crate::flow::state::NodeState;
use async_trait::async_trait;
use serde_json::Value;

/// A single step of a workflow over state type `S`
#[async_trait]
pub trait AgentNode<S: NodeState>: Send + Sync {
    fn core(&self) -> &NodeCore;

    /// Transform the state
    async fn proc(&self, state: S) -> Result<S>;

    /// Input check run before `proc`
    fn validate(&self, _state: &S) -> Result<()> {
        Ok(())
    }

    /// Graph identifier of this node
    fn node_name(&self) -> String {
        self.core().node_name()
    }
}

/// Run one node the way the workflow runtime does
pub async fn execute<S: NodeState>(node: &dyn AgentNode<S>, state: S) -> Result<S> {
    let config = node.core().config();
    log::info!("Running node '{}'", config.name);

    node.validate(&state)?;

    let before = if config.share_context && config.shared_fields.is_none() {
        Some(state.to_json()?)
    } else {
        None
    };

    let mut state = node.proc(state).await?;

    if config.share_context {
        share_fields(&mut state, config.shared_fields.as_deref(), before.as_ref())?;
    }

    state.validate()?;

    match state.error() {
        Some(error) => log::warn!("Node '{}' completed with error: {}", config.name, error),
        None => log::info!("Node '{}' completed", config.name),
    }
    Ok(state)
}

/// Copy fields into `state.context`
///
/// With `fields` given, those fields are copied when present; otherwise every
/// top-level field that differs from `before` is.
fn share_fields<S: NodeState>(
    state: &mut S,
    fields: Option<&[String]>,
    before: Option<&Value>,
) -> Result<()> {
    let after = state.to_json()?;
    let Value::Object(after) = after else {
        return Ok(());
    };

    let selected: Vec<(String, Value)> = match fields {
        Some(fields) => fields
            .iter()
            .filter_map(|f| after.get(f).map(|v| (f.clone(), v.clone())))
            .collect(),
        None => after
            .into_iter()
            .filter(|(k, _)| k != "context" && k != "error")
            .filter(|(k, v)| before.and_then(|b| b.get(k)) != Some(v))
            .collect(),
    };

    for (key, value) in selected {
        log::debug!("Sharing '{}' into context", key);
        state.add_to_context(key, value);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::error::FlowError;
    use crate::adk::llm::Llm;
    use crate::adk::model::{Content, GenerationConfig, Model};
    use crate::adk::tool::Tool;
    use crate::adk::error::ModelError;
    use crate::flow::state::Context;
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use std::sync::Arc;

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    struct DocState {
        #[serde(default)]
        data: String,
        #[serde(default)]
        topics: String,
        #[serde(default)]
        context: Context,
        #[serde(default)]
        error: String,
    }

    crate::impl_node_state!(DocState, |s| {
        if s.topics.len() > 20 {
            Err(FlowError::validation("topics too long"))
        } else {
            Ok(())
        }
    });

    struct NoModel;

    #[async_trait]
    impl Model for NoModel {
        fn model_name(&self) -> &str {
            "none"
        }

        fn provider_name(&self) -> &str {
            "test"
        }

        async fn generate_content(
            &self,
            _history: &[Content],
            _config: Option<&GenerationConfig>,
            _tools: Option<&[Arc<dyn Tool>]>,
        ) -> std::result::Result<Content, ModelError> {
            Err(ModelError::InvalidResponse("unused".to_string()))
        }
    }

    struct SetTopics {
        core: NodeCore,
        topics: &'static str,
    }

    impl SetTopics {
        fn new(config: NodeConfig, topics: &'static str) -> Self {
            Self {
                core: NodeCore::new(config, Llm::new(Arc::new(NoModel))),
                topics,
            }
        }
    }

    #[async_trait]
    impl AgentNode<DocState> for SetTopics {
        fn core(&self) -> &NodeCore {
            &self.core
        }

        async fn proc(&self, mut state: DocState) -> Result<DocState> {
            state.topics = self.topics.to_string();
            Ok(state)
        }

        fn validate(&self, state: &DocState) -> Result<()> {
            if state.data.is_empty() {
                return Err(FlowError::validation("data is required"));
            }
            Ok(())
        }
    }

    fn doc() -> DocState {
        DocState {
            data: "doc".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_execute_shares_changed_fields() {
        let node = SetTopics::new(NodeConfig::new("extract", ""), "AI, ML");
        let state = execute(&node, doc()).await.unwrap();

        assert_eq!(state.get_from_context("topics"), Some(&json!("AI, ML")));
        assert_eq!(state.get_from_context("data"), None);
    }

    #[tokio::test]
    async fn test_execute_share_disabled() {
        let node = SetTopics::new(NodeConfig::new("extract", "").share_context(false), "AI");
        let state = execute(&node, doc()).await.unwrap();

        assert_eq!(state.topics, "AI");
        assert!(state.context().is_empty());
    }

    #[tokio::test]
    async fn test_execute_shares_declared_fields() {
        let node = SetTopics::new(
            NodeConfig::new("extract", "").shared_fields(["data"]),
            "AI",
        );
        let state = execute(&node, doc()).await.unwrap();

        assert_eq!(state.get_from_context("data"), Some(&json!("doc")));
        assert_eq!(state.get_from_context("topics"), None);
    }

    #[tokio::test]
    async fn test_execute_runs_node_validation_first() {
        let node = SetTopics::new(NodeConfig::new("extract", ""), "AI");
        let err = execute(&node, DocState::default()).await.unwrap_err();
        assert_eq!(err.to_string(), "Validation error: data is required");
    }

    #[tokio::test]
    async fn test_execute_revalidates_state() {
        let node = SetTopics::new(
            NodeConfig::new("extract", ""),
            "a very long list of topics indeed",
        );
        let err = execute(&node, doc()).await.unwrap_err();
        assert!(matches!(err, FlowError::Validation(_)));
    }
}
