// SPDX-License-Identifier: MIT

use super::executor::{CompiledNode, CompiledWorkflow};
use super::types::{Target, Transition};
use crate::adk::error::{Result, WorkflowError};
use crate::config::DEFAULT_RECURSION_LIMIT;
use crate::flow::node::{node_id, AgentNode};
use crate::flow::state::NodeState;
use std::collections::HashSet;
use std::sync::Arc;

/// Ordered chain of nodes
///
/// Each node runs after the previous one; a node that leaves a soft error on
/// the state ends the run.
pub struct AgentWorkflow<S> {
    nodes: Vec<Arc<dyn AgentNode<S>>>,
    recursion_limit: usize,
}

impl<S: NodeState> AgentWorkflow<S> {
    pub fn new(nodes: Vec<Arc<dyn AgentNode<S>>>) -> Result<Self> {
        let mut seen = HashSet::new();
        for node in &nodes {
            let name = node.node_name();
            if !seen.insert(name.clone()) {
                return Err(WorkflowError::DuplicateNode(name).into());
            }
        }

        Ok(Self {
            nodes,
            recursion_limit: DEFAULT_RECURSION_LIMIT,
        })
    }

    pub fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = limit;
        self
    }

    pub fn recursion_limit(&self) -> usize {
        self.recursion_limit
    }

    pub fn nodes(&self) -> &[Arc<dyn AgentNode<S>>] {
        &self.nodes
    }

    /// Insert `node` after the node named `after`, or at the end
    pub fn add_node(&mut self, node: Arc<dyn AgentNode<S>>, after: Option<&str>) -> Result<()> {
        let name = node.node_name();
        if self.position(&name).is_some() {
            return Err(WorkflowError::DuplicateNode(name).into());
        }

        match after {
            Some(after) => {
                let index = self
                    .position(&node_id(after))
                    .ok_or_else(|| WorkflowError::UnknownNode(after.to_string()))?;
                self.nodes.insert(index + 1, node);
            }
            None => self.nodes.push(node),
        }
        Ok(())
    }

    pub(crate) fn position(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.node_name() == name)
    }

    /// Compile the chain into a runnable workflow
    pub fn get_app(&self) -> Result<CompiledWorkflow<S>> {
        let compiled = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, node)| {
                let target = match self.nodes.get(i + 1) {
                    Some(next) => Target::Node(next.node_name()),
                    None => Target::End,
                };
                CompiledNode::new(node.clone(), Transition::Next(target))
            })
            .collect();

        Ok(CompiledWorkflow::compile(compiled)?.with_recursion_limit(self.recursion_limit))
    }
}
