// SPDX-License-Identifier: MIT

//! Compiled workflow executor
//!
//! A workflow compiles to a transition table: every node id maps to the node
//! and its outgoing [`Transition`]. Execution is sequential, one node at a
//! time, starting from the entry node until a transition reaches [`Target::End`].

use super::types::{Target, Transition, WorkflowEvent};
use crate::adk::error::{FlowError, Result, WorkflowError};
use crate::config::DEFAULT_RECURSION_LIMIT;
use crate::flow::node::{execute, AgentNode};
use crate::flow::state::NodeState;
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Node ready for execution
pub struct CompiledNode<S> {
    pub id: String,
    pub node: Arc<dyn AgentNode<S>>,
    pub transition: Transition<S>,
}

impl<S: NodeState> CompiledNode<S> {
    pub fn new(node: Arc<dyn AgentNode<S>>, transition: Transition<S>) -> Self {
        Self {
            id: node.node_name(),
            node,
            transition,
        }
    }
}

/// Validated, immutable workflow graph
pub struct CompiledWorkflow<S> {
    entry: String,
    nodes: HashMap<String, CompiledNode<S>>,
    node_order: Vec<String>,
    recursion_limit: usize,
}

impl<S: NodeState> CompiledWorkflow<S> {
    /// Validate and build the graph; the first node is the entry point
    pub fn compile(nodes: Vec<CompiledNode<S>>) -> Result<Self> {
        let entry = nodes
            .first()
            .map(|n| n.id.clone())
            .ok_or(WorkflowError::Empty)?;

        let mut node_order = Vec::with_capacity(nodes.len());
        let mut map = HashMap::with_capacity(nodes.len());
        for node in nodes {
            if map.contains_key(&node.id) {
                return Err(WorkflowError::DuplicateNode(node.id).into());
            }
            node_order.push(node.id.clone());
            map.insert(node.id.clone(), node);
        }

        for id in &node_order {
            let node = &map[id];
            if let Transition::Branch(edge) = &node.transition {
                if edge.destinations.is_empty() {
                    return Err(WorkflowError::InvalidEdge {
                        node: id.clone(),
                        reason: "no destinations".to_string(),
                    }
                    .into());
                }
            }
            for target in node.transition.targets() {
                if let Target::Node(dest) = target {
                    if !map.contains_key(dest) {
                        return Err(WorkflowError::InvalidEdge {
                            node: id.clone(),
                            reason: format!("unknown destination '{}'", dest),
                        }
                        .into());
                    }
                }
            }
        }

        let workflow = Self {
            entry,
            nodes: map,
            node_order,
            recursion_limit: DEFAULT_RECURSION_LIMIT,
        };
        workflow.check_reachability()?;
        Ok(workflow)
    }

    /// `end` must be reachable from the entry; unreachable nodes are only logged
    fn check_reachability(&self) -> Result<()> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([self.entry.as_str()]);
        let mut reaches_end = false;

        while let Some(id) = queue.pop_front() {
            if !visited.insert(id) {
                continue;
            }
            for target in self.nodes[id].transition.targets() {
                match target {
                    Target::End => reaches_end = true,
                    Target::Node(next) => queue.push_back(next.as_str()),
                }
            }
        }

        for id in &self.node_order {
            if !visited.contains(id.as_str()) {
                log::warn!("Node '{}' is unreachable from '{}'", id, self.entry);
            }
        }

        if !reaches_end {
            return Err(WorkflowError::NoTerminal(self.entry.clone()).into());
        }
        Ok(())
    }

    /// Maximum number of node executions per run
    pub fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = limit.max(1);
        self
    }

    pub fn recursion_limit(&self) -> usize {
        self.recursion_limit
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    /// Node ids in declaration order
    pub fn node_ids(&self) -> &[String] {
        &self.node_order
    }

    /// Run from a JSON state and return the final state as JSON
    pub async fn invoke(&self, input: Value) -> Result<Value> {
        let state = S::from_json(input)?;
        self.invoke_state(state).await?.to_json()
    }

    pub async fn invoke_state(&self, state: S) -> Result<S> {
        self.run(state, None).await
    }

    /// Run while reporting progress on `tx`; a closed receiver does not stop the run
    pub async fn invoke_stream(&self, state: S, tx: mpsc::Sender<WorkflowEvent>) -> Result<S> {
        self.run(state, Some(&tx)).await
    }

    async fn run(&self, mut state: S, events: Option<&mpsc::Sender<WorkflowEvent>>) -> Result<S> {
        let run_id = Uuid::new_v4();
        log::info!("[{}] Starting workflow at '{}'", run_id, self.entry);

        let mut current = Target::Node(self.entry.clone());
        let mut steps = 0;

        while let Target::Node(id) = current {
            if steps >= self.recursion_limit {
                log::error!("[{}] Recursion limit {} hit", run_id, self.recursion_limit);
                return Err(WorkflowError::RecursionLimit {
                    limit: self.recursion_limit,
                }
                .into());
            }
            steps += 1;

            let compiled = self
                .nodes
                .get(&id)
                .ok_or_else(|| WorkflowError::UnknownNode(id.clone()))?;

            emit(events, WorkflowEvent::NodeStarted { node: id.clone() }).await;
            state = execute(compiled.node.as_ref(), state).await?;
            emit(
                events,
                WorkflowEvent::NodeCompleted {
                    node: id.clone(),
                    error: state.error().map(str::to_string),
                },
            )
            .await;

            current = match &compiled.transition {
                Transition::Next(target) => match state.error() {
                    Some(error) if *target != Target::End => {
                        log::error!("[{}] Workflow error: {}", run_id, error);
                        Target::End
                    }
                    _ => target.clone(),
                },
                Transition::Branch(edge) => {
                    let key = (edge.condition)(&state);
                    let target = edge.destinations.get(&key).cloned().ok_or_else(|| {
                        FlowError::UnknownBranch {
                            node: id.clone(),
                            key: key.clone(),
                        }
                    })?;
                    log::info!("[{}] Branch '{}' -> '{}' via '{}'", run_id, id, target, key);
                    emit(
                        events,
                        WorkflowEvent::Branch {
                            from: id.clone(),
                            key,
                            to: target.to_string(),
                        },
                    )
                    .await;
                    target
                }
            };
        }

        log::info!("[{}] Workflow finished after {} step(s)", run_id, steps);
        emit(events, WorkflowEvent::Finished { steps }).await;
        Ok(state)
    }
}

async fn emit(events: Option<&mpsc::Sender<WorkflowEvent>>, event: WorkflowEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event).await;
    }
}
