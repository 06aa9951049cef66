// SPDX-License-Identifier: MIT

//! Workflow construction and execution
//!
//! - [`AgentWorkflow`] - linear chain of nodes
//! - [`ConditionalWorkflow`] - chain with per-node branching
//! - [`CompiledWorkflow`] - the validated transition table both compile to

mod conditional;
mod executor;
mod linear;
mod types;

pub use conditional::ConditionalWorkflow;
pub use executor::{CompiledNode, CompiledWorkflow};
pub use linear::AgentWorkflow;
pub use types::{Condition, ConditionalEdge, Target, Transition, WorkflowEvent, END};
