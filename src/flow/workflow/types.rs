// SPDX-License-Identifier: MIT

//! Graph type definitions

use crate::flow::node::node_id;
use crate::flow::state::NodeState;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Destination name that stops traversal
pub const END: &str = "end";

/// Where control goes after a node
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    Node(String),
    End,
}

impl From<&str> for Target {
    fn from(name: &str) -> Self {
        if name == END {
            Target::End
        } else {
            Target::Node(node_id(name))
        }
    }
}

impl From<String> for Target {
    fn from(name: String) -> Self {
        Target::from(name.as_str())
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Node(id) => f.write_str(id),
            Target::End => f.write_str(END),
        }
    }
}

/// Maps a state to a destination key
pub type Condition<S> = Arc<dyn Fn(&S) -> String + Send + Sync>;

/// Branch evaluated after its source node runs
pub struct ConditionalEdge<S> {
    pub condition: Condition<S>,
    pub destinations: HashMap<String, Target>,
}

impl<S: NodeState> ConditionalEdge<S> {
    pub fn new<F, I, K, T>(condition: F, destinations: I) -> Self
    where
        F: Fn(&S) -> String + Send + Sync + 'static,
        I: IntoIterator<Item = (K, T)>,
        K: Into<String>,
        T: Into<Target>,
    {
        Self {
            condition: Arc::new(condition),
            destinations: destinations
                .into_iter()
                .map(|(k, t)| (k.into(), t.into()))
                .collect(),
        }
    }

    /// `"error"` goes to end, `"continue"` goes to `next`
    pub fn on_error(next: impl Into<Target>) -> Self {
        Self::new(
            |state: &S| {
                if state.error().is_some() {
                    "error".to_string()
                } else {
                    "continue".to_string()
                }
            },
            [("error", Target::End), ("continue", next.into())],
        )
    }
}

impl<S> Clone for ConditionalEdge<S> {
    fn clone(&self) -> Self {
        Self {
            condition: self.condition.clone(),
            destinations: self.destinations.clone(),
        }
    }
}

impl<S> fmt::Debug for ConditionalEdge<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionalEdge")
            .field("destinations", &self.destinations)
            .finish_non_exhaustive()
    }
}

/// Outgoing edge of a compiled node
pub enum Transition<S> {
    /// Go to the target unless the state carries an error
    Next(Target),
    /// Evaluate the condition and follow its destination
    Branch(ConditionalEdge<S>),
}

impl<S> Transition<S> {
    pub fn targets(&self) -> Vec<&Target> {
        match self {
            Transition::Next(target) => vec![target],
            Transition::Branch(edge) => edge.destinations.values().collect(),
        }
    }
}

impl<S> Clone for Transition<S> {
    fn clone(&self) -> Self {
        match self {
            Transition::Next(target) => Transition::Next(target.clone()),
            Transition::Branch(edge) => Transition::Branch(edge.clone()),
        }
    }
}

/// Progress notification sent by `invoke_stream`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    NodeStarted {
        node: String,
    },
    NodeCompleted {
        node: String,
        error: Option<String>,
    },
    Branch {
        from: String,
        key: String,
        to: String,
    },
    Finished {
        steps: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::state::DynamicState;

    #[test]
    fn test_target_from_name() {
        assert_eq!(Target::from("end"), Target::End);
        assert_eq!(
            Target::from("Topic Extractor"),
            Target::Node("Topic_Extractor".to_string())
        );
        assert_eq!(Target::End.to_string(), "end");
    }

    #[test]
    fn test_on_error_edge() {
        let edge = ConditionalEdge::<DynamicState>::on_error("summarize");
        let ok = DynamicState::empty();
        let failed = DynamicState::empty().emit_error("boom");

        assert_eq!((edge.condition)(&ok), "continue");
        assert_eq!((edge.condition)(&failed), "error");
        assert_eq!(edge.destinations["error"], Target::End);
        assert_eq!(
            edge.destinations["continue"],
            Target::Node("summarize".to_string())
        );
    }

    #[test]
    fn test_event_serialization() {
        let event = WorkflowEvent::Branch {
            from: "check".to_string(),
            key: "error".to_string(),
            to: "end".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "branch");
        assert_eq!(json["to"], "end");
    }
}
