// SPDX-License-Identifier: MIT

//! The LLM-facing half of a node: prompt building, model calls, tools and
//! guardrails.

use super::config::NodeConfig;
use crate::adk::error::{FlowError, Result};
use crate::adk::guardrail::{Guardrail, GuardrailRegistry};
use crate::adk::llm::Llm;
use crate::adk::model::{Content, Part};
use crate::adk::tool::{Tool, ToolCall, ToolRegistry};
use crate::flow::state::{Context, NodeState};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

pub const DEFAULT_MAX_TOOL_TURNS: usize = 10;

/// Model reply plus the tool invocations it requested
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub response: String,
    pub tool_calls: Vec<ToolCall>,
}

/// Shared machinery every [`AgentNode`](super::AgentNode) embeds
pub struct NodeCore {
    config: NodeConfig,
    llm: Llm,
    tools: ToolRegistry,
    guardrails: GuardrailRegistry,
    max_tool_turns: usize,
}

impl NodeCore {
    pub fn new(config: NodeConfig, llm: Llm) -> Self {
        Self {
            config,
            llm,
            tools: ToolRegistry::new(),
            guardrails: GuardrailRegistry::new(),
            max_tool_turns: DEFAULT_MAX_TOOL_TURNS,
        }
    }

    pub fn with_max_tool_turns(mut self, turns: usize) -> Self {
        self.max_tool_turns = turns.max(1);
        self
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register_tool(tool);
        self
    }

    pub fn with_guardrail(mut self, guardrail: Arc<dyn Guardrail>) -> Self {
        self.register_guardrail(guardrail);
        self
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn node_name(&self) -> String {
        self.config.node_name()
    }

    pub fn llm(&self) -> &Llm {
        &self.llm
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn guardrails(&self) -> &GuardrailRegistry {
        &self.guardrails
    }

    /// Register a tool; a tool with the same name is replaced
    pub fn register_tool(&mut self, tool: Arc<dyn Tool>) {
        log::debug!("Node '{}' registered tool '{}'", self.config.name, tool.name());
        self.tools.register(tool);
    }

    /// Register a guardrail; a guardrail with the same name is replaced
    pub fn register_guardrail(&mut self, guardrail: Arc<dyn Guardrail>) {
        log::debug!(
            "Node '{}' registered guardrail '{}'",
            self.config.name,
            guardrail.name()
        );
        self.guardrails.register(guardrail);
    }

    /// Build the prompt sent to the model
    ///
    /// Layout: instruction, optional `Context:` block, then `Input:` and the
    /// text. `extra` overrides `state.context` on key clashes; the state
    /// context is only read when `use_context` is set.
    pub fn build_prompt<S: NodeState>(
        &self,
        state: &S,
        input_text: &str,
        extra: Option<&Context>,
    ) -> String {
        let mut context = if self.config.use_context {
            state.context().clone()
        } else {
            Context::new()
        };
        if let Some(extra) = extra {
            context.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        let mut context_str = String::new();
        if !context.is_empty() {
            context_str.push_str("\nContext:\n");
            for (key, value) in &context {
                context_str.push_str(key);
                context_str.push_str(": ");
                match value {
                    Value::String(s) => context_str.push_str(s),
                    other => context_str.push_str(&other.to_string()),
                }
                context_str.push('\n');
            }
        }

        format!(
            "{}\n{}\nInput:\n{}\n",
            self.config.instruction.trim(),
            context_str,
            input_text
        )
    }

    /// Run the model on `input_text` and return the guarded answer
    pub async fn run_with_instruction<S: NodeState>(
        &self,
        state: &S,
        input_text: &str,
        extra: Option<&Context>,
    ) -> Result<String> {
        let prompt = self.build_prompt(state, input_text, extra);
        let response = self.llm.invoke(&prompt).await?;
        self.guardrails.apply_all(&response)
    }

    /// Run the model with the node's tools exposed
    ///
    /// Tool calls are returned, not executed.
    pub async fn run_with_tools<S: NodeState>(
        &self,
        state: &S,
        input_text: &str,
        extra: Option<&Context>,
    ) -> Result<ToolResponse> {
        let prompt = self.build_prompt(state, input_text, extra);
        let completion = self
            .llm
            .complete(&prompt, Some(self.tools.as_slice()))
            .await?;

        Ok(ToolResponse {
            response: self.guardrails.apply_all(&completion.text)?,
            tool_calls: completion.tool_calls,
        })
    }

    /// Ask for output matching `schema` and return it as JSON
    pub async fn run_with_schema<S: NodeState>(
        &self,
        state: &S,
        input_text: &str,
        extra: Option<&Context>,
        schema: &Value,
    ) -> Result<Value> {
        let prompt = self.build_prompt(state, input_text, extra);
        self.llm.invoke_structured(&prompt, schema).await
    }

    /// Execute the model's tool calls until it answers with text
    pub async fn run_agent_loop<S: NodeState>(
        &self,
        state: &S,
        input_text: &str,
        extra: Option<&Context>,
    ) -> Result<String> {
        let prompt = self.build_prompt(state, input_text, extra);
        let mut history = vec![Content::text("user", prompt)];
        let tools = self.tools.as_slice();

        for turn in 0..self.max_tool_turns {
            log::info!(
                "Node '{}' turn {}/{}",
                self.config.name,
                turn + 1,
                self.max_tool_turns
            );
            let response = self
                .llm
                .generate(&history, self.llm.config(), Some(tools))
                .await?;

            let calls: Vec<(Option<String>, String, Value)> = response
                .parts
                .iter()
                .filter_map(|part| match part {
                    Part::FunctionCall { id, name, args, .. } => {
                        Some((id.clone(), name.clone(), args.clone()))
                    }
                    _ => None,
                })
                .collect();

            if calls.is_empty() {
                return self.guardrails.apply_all(&response.joined_text());
            }

            let mut function_responses = Vec::with_capacity(calls.len());
            for (id, name, args) in calls {
                log::info!("Tool call: {} {}", name, args);
                let tool_response = match self.tools.call(&name, args).await {
                    Ok(res) => res,
                    Err(e) => {
                        log::error!("Tool {} failed: {}", name, e);
                        json!({ "error": e.to_string() })
                    }
                };
                function_responses.push(Part::FunctionResponse {
                    id,
                    name,
                    response: tool_response,
                });
            }

            history.push(response);
            history.push(Content {
                role: "user".to_string(),
                parts: function_responses,
            });
        }

        log::error!(
            "Node '{}' reached {} tool turns without a text answer",
            self.config.name,
            self.max_tool_turns
        );
        Err(FlowError::other(format!(
            "Node '{}' reached max tool turns ({})",
            self.config.name, self.max_tool_turns
        )))
    }

    /// Call a registered tool directly
    pub async fn call_tool(&self, name: &str, args: Value) -> Result<Value> {
        self.tools.call(name, args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::error::ModelError;
    use crate::adk::guardrail::{GuardAction, GuardPattern, RegexGuardrail};
    use crate::adk::model::openai::OpenAIModel;
    use crate::adk::model::{GenerationConfig, Model};
    use crate::adk::tool::FunctionTool;
    use crate::config::ProviderSettings;
    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};
    use std::sync::Mutex;

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    struct TestState {
        #[serde(default)]
        context: Context,
        #[serde(default)]
        error: String,
    }

    crate::impl_node_state!(TestState);

    /// Replays canned replies and records every history it receives
    struct ScriptedModel {
        replies: Mutex<Vec<Content>>,
        seen: Mutex<Vec<Vec<Content>>>,
    }

    impl ScriptedModel {
        fn new(mut replies: Vec<Content>) -> Arc<Self> {
            replies.reverse();
            Arc::new(Self {
                replies: Mutex::new(replies),
                seen: Mutex::new(vec![]),
            })
        }

        fn prompts(&self) -> Vec<String> {
            self.seen
                .lock()
                .unwrap()
                .iter()
                .map(|h| h[0].joined_text())
                .collect()
        }
    }

    #[async_trait]
    impl Model for ScriptedModel {
        fn model_name(&self) -> &str {
            "scripted"
        }

        fn provider_name(&self) -> &str {
            "test"
        }

        async fn generate_content(
            &self,
            history: &[Content],
            _config: Option<&GenerationConfig>,
            _tools: Option<&[Arc<dyn Tool>]>,
        ) -> std::result::Result<Content, ModelError> {
            self.seen.lock().unwrap().push(history.to_vec());
            self.replies
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| ModelError::InvalidResponse("no scripted reply".to_string()))
        }
    }

    fn text(reply: &str) -> Content {
        Content::text("model", reply)
    }

    fn call(name: &str, args: Value) -> Content {
        Content {
            role: "model".to_string(),
            parts: vec![Part::FunctionCall {
                id: None,
                name: name.to_string(),
                args,
                thought_signature: None,
            }],
        }
    }

    fn calls(calls: &[(&str, &str, Value)]) -> Content {
        Content {
            role: "model".to_string(),
            parts: calls
                .iter()
                .map(|(id, name, args)| Part::FunctionCall {
                    id: Some(id.to_string()),
                    name: name.to_string(),
                    args: args.clone(),
                    thought_signature: None,
                })
                .collect(),
        }
    }

    fn core(model: Arc<ScriptedModel>, config: NodeConfig) -> NodeCore {
        NodeCore::new(config, Llm::new(model))
    }

    #[test]
    fn test_build_prompt_layout() {
        let node = core(
            ScriptedModel::new(vec![]),
            NodeConfig::new("summarizer", "  Summarize the input.  "),
        );
        let mut state = TestState::default();

        assert_eq!(
            node.build_prompt(&state, "hello", None),
            "Summarize the input.\n\nInput:\nhello\n"
        );

        state.add_to_context("topics", "AI");
        state.add_to_context("count", 2);
        let mut extra = Context::new();
        extra.insert("topics".to_string(), json!("ML"));

        assert_eq!(
            node.build_prompt(&state, "hello", Some(&extra)),
            "Summarize the input.\n\nContext:\ncount: 2\ntopics: ML\n\nInput:\nhello\n"
        );
    }

    #[test]
    fn test_build_prompt_ignores_context_when_disabled() {
        let node = core(
            ScriptedModel::new(vec![]),
            NodeConfig::new("isolated", "Do it.").use_context(false),
        );
        let mut state = TestState::default();
        state.add_to_context("secret", "value");

        assert_eq!(
            node.build_prompt(&state, "x", None),
            "Do it.\n\nInput:\nx\n"
        );
    }

    #[tokio::test]
    async fn test_run_with_instruction_applies_redaction() {
        let model = ScriptedModel::new(vec![text("call 555-1234 now")]);
        let node = core(model.clone(), NodeConfig::new("n", "Answer.")).with_guardrail(Arc::new(
            RegexGuardrail::new(
                "phone",
                "",
                vec![GuardPattern::new(r"\d{3}-\d{4}", GuardAction::Redact, "phone")],
            )
            .unwrap(),
        ));

        let out = node
            .run_with_instruction(&TestState::default(), "q", None)
            .await
            .unwrap();
        assert_eq!(out, "call [REDACTED] now");
        assert_eq!(model.prompts(), vec!["Answer.\n\nInput:\nq\n".to_string()]);
    }

    #[tokio::test]
    async fn test_run_with_tools_returns_calls_unexecuted() {
        let model = ScriptedModel::new(vec![call("search", json!({"query": "rust"}))]);
        let node = core(model, NodeConfig::new("n", "Use tools.")).with_tool(Arc::new(
            FunctionTool::new("search", "Search", json!({"type": "object"}), |_| {
                panic!("must not execute")
            }),
        ));

        let result = node
            .run_with_tools(&TestState::default(), "find rust", None)
            .await
            .unwrap();
        assert_eq!(result.response, "");
        assert_eq!(result.tool_calls[0].name, "search");
        assert_eq!(result.tool_calls[0].arguments, json!({"query": "rust"}));
    }

    #[tokio::test]
    async fn test_run_agent_loop_executes_tools() {
        let model = ScriptedModel::new(vec![
            call("add", json!({"a": 2, "b": 3})),
            text("The sum is 5"),
        ]);
        let node = core(model.clone(), NodeConfig::new("n", "Compute.")).with_tool(Arc::new(
            FunctionTool::new("add", "Add numbers", json!({"type": "object"}), |args| {
                let a = args["a"].as_i64().unwrap_or(0);
                let b = args["b"].as_i64().unwrap_or(0);
                Ok(json!({"sum": a + b}))
            }),
        ));

        let out = node
            .run_agent_loop(&TestState::default(), "2+3", None)
            .await
            .unwrap();
        assert_eq!(out, "The sum is 5");

        let seen = model.seen.lock().unwrap();
        let last = seen.last().unwrap();
        assert_eq!(last.len(), 3);
        match &last[2].parts[0] {
            Part::FunctionResponse { name, response, .. } => {
                assert_eq!(name, "add");
                assert_eq!(response, &json!({"sum": 5}));
            }
            other => panic!("unexpected part: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_run_agent_loop_answers_every_parallel_call() {
        let model = ScriptedModel::new(vec![
            calls(&[
                ("call_a", "lookup", json!({"key": "a"})),
                ("call_b", "lookup", json!({"key": "b"})),
            ]),
            text("a and b"),
        ]);
        let node = core(model.clone(), NodeConfig::new("n", "Look up.")).with_tool(Arc::new(
            FunctionTool::new("lookup", "Look up a key", json!({"type": "object"}), |args| {
                Ok(json!({"value": args["key"]}))
            }),
        ));

        let out = node
            .run_agent_loop(&TestState::default(), "both", None)
            .await
            .unwrap();
        assert_eq!(out, "a and b");

        let seen = model.seen.lock().unwrap();
        let replies: Vec<(Option<String>, Value)> = seen.last().unwrap()[2]
            .parts
            .iter()
            .filter_map(|p| match p {
                Part::FunctionResponse { id, response, .. } => {
                    Some((id.clone(), response.clone()))
                }
                _ => None,
            })
            .collect();
        assert_eq!(
            replies,
            vec![
                (Some("call_a".to_string()), json!({"value": "a"})),
                (Some("call_b".to_string()), json!({"value": "b"})),
            ]
        );

        let openai = OpenAIModel::lmstudio("local".to_string(), &ProviderSettings::default());
        let body = openai.build_body(seen.last().unwrap(), None, None);
        let tool_ids: Vec<&str> = body["messages"]
            .as_array()
            .unwrap()
            .iter()
            .filter(|m| m["role"] == "tool")
            .filter_map(|m| m["tool_call_id"].as_str())
            .collect();
        assert_eq!(tool_ids, vec!["call_a", "call_b"]);
    }

    #[tokio::test]
    async fn test_run_agent_loop_turn_limit() {
        let model = ScriptedModel::new(vec![
            call("missing", json!({})),
            call("missing", json!({})),
        ]);
        let node = core(model, NodeConfig::new("n", "Loop.")).with_max_tool_turns(2);

        let err = node
            .run_agent_loop(&TestState::default(), "x", None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("max tool turns"));
    }

    #[tokio::test]
    async fn test_run_with_schema_parses_json() {
        let model = ScriptedModel::new(vec![text(r#"{"title": "Report"}"#)]);
        let node = core(model, NodeConfig::new("n", "Structure it."));

        let value = node
            .run_with_schema(
                &TestState::default(),
                "x",
                None,
                &json!({"type": "object"}),
            )
            .await
            .unwrap();
        assert_eq!(value["title"], "Report");
    }

    #[tokio::test]
    async fn test_call_tool_unknown() {
        let node = core(ScriptedModel::new(vec![]), NodeConfig::new("n", ""));
        let err = node.call_tool("nope", json!({})).await.unwrap_err();
        assert!(matches!(err, FlowError::ToolNotFound { .. }));
    }
}
