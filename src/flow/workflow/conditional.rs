// SPDX-License-Identifier: MIT

use super::executor::{CompiledNode, CompiledWorkflow};
use super::linear::AgentWorkflow;
use super::types::{ConditionalEdge, Target, Transition};
use crate::adk::error::{Result, WorkflowError};
use crate::flow::node::{node_id, AgentNode};
use crate::flow::state::NodeState;
use std::collections::HashMap;
use std::sync::Arc;

/// Workflow whose nodes may branch on the state
///
/// Nodes with a conditional edge follow it; the others fall through to the
/// next listed node unless the state carries an error, and the last node
/// goes to `end`.
pub struct ConditionalWorkflow<S> {
    workflow: AgentWorkflow<S>,
    edges: HashMap<String, ConditionalEdge<S>>,
}

impl<S: NodeState> ConditionalWorkflow<S> {
    /// `edges` are keyed by node name
    pub fn new(
        nodes: Vec<Arc<dyn AgentNode<S>>>,
        edges: HashMap<String, ConditionalEdge<S>>,
    ) -> Result<Self> {
        let mut workflow = Self {
            workflow: AgentWorkflow::new(nodes)?,
            edges: HashMap::new(),
        };
        for (source, edge) in edges {
            workflow.insert_edge(&source, edge)?;
        }
        Ok(workflow)
    }

    pub fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.workflow = self.workflow.with_recursion_limit(limit);
        self
    }

    pub fn nodes(&self) -> &[Arc<dyn AgentNode<S>>] {
        self.workflow.nodes()
    }

    /// Insert `node` after the node named `after`, or at the end
    pub fn add_node(&mut self, node: Arc<dyn AgentNode<S>>, after: Option<&str>) -> Result<()> {
        self.workflow.add_node(node, after)
    }

    /// Branch after `source`; replaces any edge already on it
    pub fn add_conditional_edge<F, I, K, T>(
        &mut self,
        source: &str,
        condition: F,
        destinations: I,
    ) -> Result<()>
    where
        F: Fn(&S) -> String + Send + Sync + 'static,
        I: IntoIterator<Item = (K, T)>,
        K: Into<String>,
        T: Into<Target>,
    {
        self.insert_edge(source, ConditionalEdge::new(condition, destinations))
    }

    fn insert_edge(&mut self, source: &str, edge: ConditionalEdge<S>) -> Result<()> {
        let id = node_id(source);
        if self.workflow.position(&id).is_none() {
            return Err(WorkflowError::UnknownNode(source.to_string()).into());
        }
        self.edges.insert(id, edge);
        Ok(())
    }

    /// Compile into a runnable workflow
    pub fn get_app(&self) -> Result<CompiledWorkflow<S>> {
        let nodes = self.workflow.nodes();
        let compiled = nodes
            .iter()
            .enumerate()
            .map(|(i, node)| {
                let id = node.node_name();
                let transition = match self.edges.get(&id) {
                    Some(edge) => Transition::Branch(edge.clone()),
                    None => match nodes.get(i + 1) {
                        Some(next) => Transition::Next(Target::Node(next.node_name())),
                        None => Transition::Next(Target::End),
                    },
                };
                CompiledNode::new(node.clone(), transition)
            })
            .collect();

        let app = CompiledWorkflow::compile(compiled)?;
        Ok(app.with_recursion_limit(self.workflow.recursion_limit()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::error::{FlowError, ModelError};
    use crate::adk::llm::Llm;
    use crate::adk::model::{Content, GenerationConfig, Model};
    use crate::adk::tool::Tool;
    use crate::flow::node::{NodeConfig, NodeCore};
    use crate::flow::state::DynamicState;
    use async_trait::async_trait;

    struct UnusedModel;

    #[async_trait]
    impl Model for UnusedModel {
        fn model_name(&self) -> &str {
            "unused"
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

    struct Append(NodeCore);

    #[async_trait]
    impl AgentNode<DynamicState> for Append {
        fn core(&self) -> &NodeCore {
            &self.0
        }

        async fn proc(&self, mut state: DynamicState) -> Result<DynamicState> {
            let trail = state.get_str("trail").unwrap_or_default().to_string();
            state.set("trail", format!("{}{}", trail, self.0.name()))?;
            Ok(state)
        }
    }

    fn append(name: &str) -> Arc<dyn AgentNode<DynamicState>> {
        Arc::new(Append(NodeCore::new(
            NodeConfig::new(name, "").share_context(false),
            Llm::new(Arc::new(UnusedModel)),
        )))
    }

    fn trail_of(state: &DynamicState) -> String {
        state.get_str("trail").unwrap_or_default().to_string()
    }

    #[tokio::test]
    async fn test_branch_skips_nodes() {
        let mut workflow =
            ConditionalWorkflow::new(vec![append("a"), append("b"), append("c")], HashMap::new())
                .unwrap();
        workflow
            .add_conditional_edge("a", |_: &DynamicState| "skip".to_string(), [("skip", "c")])
            .unwrap();

        let out = workflow
            .get_app()
            .unwrap()
            .invoke_state(DynamicState::empty())
            .await
            .unwrap();
        assert_eq!(trail_of(&out), "ac");
    }

    #[tokio::test]
    async fn test_end_destination_stops() {
        let mut edges = HashMap::new();
        edges.insert(
            "a".to_string(),
            ConditionalEdge::new(|_: &DynamicState| "error".to_string(), [("error", "end")]),
        );
        let workflow = ConditionalWorkflow::new(vec![append("a"), append("b")], edges).unwrap();

        let out = workflow
            .get_app()
            .unwrap()
            .invoke_state(DynamicState::empty())
            .await
            .unwrap();
        assert_eq!(trail_of(&out), "a");
    }

    #[tokio::test]
    async fn test_edges_accept_display_names() {
        let mut workflow = ConditionalWorkflow::new(
            vec![append("Topic Extractor"), append("Summary Writer")],
            HashMap::new(),
        )
        .unwrap();
        workflow
            .add_conditional_edge(
                "Topic Extractor",
                |_: &DynamicState| "next".to_string(),
                [("next", "Summary Writer")],
            )
            .unwrap();

        let out = workflow
            .get_app()
            .unwrap()
            .invoke_state(DynamicState::empty())
            .await
            .unwrap();
        assert_eq!(trail_of(&out), "Topic ExtractorSummary Writer");
    }

    #[test]
    fn test_unknown_source_rejected() {
        let mut workflow = ConditionalWorkflow::new(vec![append("a")], HashMap::new()).unwrap();
        let err = workflow
            .add_conditional_edge("ghost", |_: &DynamicState| "x".to_string(), [("x", "end")])
            .unwrap_err();
        assert!(matches!(
            err,
            FlowError::Workflow(WorkflowError::UnknownNode(_))
        ));
    }

    #[test]
    fn test_unknown_destination_rejected_at_compile() {
        let mut workflow = ConditionalWorkflow::new(vec![append("a")], HashMap::new()).unwrap();
        workflow
            .add_conditional_edge("a", |_: &DynamicState| "x".to_string(), [("x", "ghost")])
            .unwrap();
        assert!(workflow.get_app().is_err());
    }
}
