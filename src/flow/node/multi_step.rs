// SPDX-License-Identifier: MIT

use super::{AgentNode, NodeConfig, NodeCore};
use crate::adk::error::Result;
use crate::adk::llm::Llm;
use crate::flow::state::NodeState;
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type StepFuture<'a, S> = Pin<Box<dyn Future<Output = Result<S>> + Send + 'a>>;

type StepFn<S> = Arc<dyn for<'a> Fn(&'a NodeCore, S) -> StepFuture<'a, S> + Send + Sync>;

/// A named unit of work inside a [`MultiStepNode`]
pub struct Step<S> {
    name: String,
    run: StepFn<S>,
}

impl<S: NodeState> Step<S> {
    /// Async step with access to the node's LLM, tools and guardrails
    pub fn new<F>(name: impl Into<String>, f: F) -> Self
    where
        F: for<'a> Fn(&'a NodeCore, S) -> StepFuture<'a, S> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            run: Arc::new(f),
        }
    }

    /// Step that only transforms the state
    pub fn sync<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(S) -> Result<S> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Self::new(name, move |_core, state| {
            let f = f.clone();
            Box::pin(async move { f(state) })
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<S> Clone for Step<S> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            run: self.run.clone(),
        }
    }
}

/// Node that runs a list of steps in order
///
/// A failing step does not fail the run: the state as it was before that
/// step gets `"Error in step '<name>': <error>"` as its soft error and the
/// remaining steps are skipped.
pub struct MultiStepNode<S> {
    core: NodeCore,
    steps: Vec<Step<S>>,
}

impl<S: NodeState> MultiStepNode<S> {
    pub fn new(config: NodeConfig, llm: Llm, steps: Vec<Step<S>>) -> Self {
        Self {
            core: NodeCore::new(config, llm),
            steps,
        }
    }

    pub fn core_mut(&mut self) -> &mut NodeCore {
        &mut self.core
    }

    pub fn steps(&self) -> &[Step<S>] {
        &self.steps
    }
}

#[async_trait]
impl<S: NodeState> AgentNode<S> for MultiStepNode<S> {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    async fn proc(&self, state: S) -> Result<S> {
        let mut current = state;

        for step in &self.steps {
            log::info!(
                "Running step '{}' in node '{}'",
                step.name,
                self.core.name()
            );
            let snapshot = current.clone();
            match (step.run)(&self.core, current).await {
                Ok(next) => current = next,
                Err(e) => {
                    log::error!(
                        "Error in step '{}' of node '{}': {}",
                        step.name,
                        self.core.name(),
                        e
                    );
                    let message = format!("Error in step '{}': {}", step.name, e);
                    return Ok(snapshot.emit_error(message));
                }
            }
        }

        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::error::{FlowError, ModelError};
    use crate::adk::model::{Content, GenerationConfig, Model};
    use crate::adk::tool::Tool;
    use crate::flow::state::Context;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    struct Counter {
        #[serde(default)]
        count: i64,
        #[serde(default)]
        answer: String,
        #[serde(default)]
        context: Context,
        #[serde(default)]
        error: String,
    }

    crate::impl_node_state!(Counter);

    struct EchoModel;

    #[async_trait]
    impl Model for EchoModel {
        fn model_name(&self) -> &str {
            "echo"
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
            Ok(Content::text("model", format!("echo: {}", history[0].joined_text().len())))
        }
    }

    fn increment() -> Step<Counter> {
        Step::sync("increment", |mut s: Counter| {
            s.count += 1;
            Ok(s)
        })
    }

    fn node(steps: Vec<Step<Counter>>) -> MultiStepNode<Counter> {
        MultiStepNode::new(
            NodeConfig::new("counter", "Count."),
            Llm::new(Arc::new(EchoModel)),
            steps,
        )
    }

    #[tokio::test]
    async fn test_steps_run_in_order() {
        let double = Step::sync("double", |mut s: Counter| {
            s.count *= 2;
            Ok(s)
        });
        let node = node(vec![increment(), double, increment()]);

        let state = node.proc(Counter::default()).await.unwrap();
        assert_eq!(state.count, 3);
        assert!(state.error().is_none());
    }

    #[tokio::test]
    async fn test_failing_step_records_soft_error() {
        let fail = Step::sync("validate", |_s: Counter| {
            Err(FlowError::validation("count too low"))
        });
        let node = node(vec![increment(), fail, increment()]);

        let state = node.proc(Counter::default()).await.unwrap();
        assert_eq!(state.count, 1);
        assert_eq!(
            state.error(),
            Some("Error in step 'validate': Validation error: count too low")
        );
    }

    #[tokio::test]
    async fn test_async_step_uses_llm() {
        let ask = Step::new("ask", |core: &NodeCore, mut s: Counter| {
            Box::pin(async move {
                let answer = core.run_with_instruction(&s, "hi", None).await?;
                s.answer = answer;
                Ok(s)
            })
        });
        let node = node(vec![ask]);

        let state = node.proc(Counter::default()).await.unwrap();
        assert!(state.answer.starts_with("echo: "));
    }
}
