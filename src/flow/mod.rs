// SPDX-License-Identifier: MIT

//! Agent workflows: state, nodes and the graphs that connect them

pub mod node;
pub mod state;
pub mod workflow;

pub use node::{execute, AgentNode, MultiStepNode, NodeConfig, NodeCore, Step, ToolResponse};
pub use state::{Context, DynamicState, NodeState, StateSchema};
pub use workflow::{
    AgentWorkflow, CompiledWorkflow, ConditionalEdge, ConditionalWorkflow, Target, WorkflowEvent,
    END,
};
