// SPDX-License-Identifier: MIT

//! agentflow-rs - LLM agent nodes wired into linear and conditional workflows
//!
//! - [`adk`] - models, tools, guardrails and errors
//! - [`flow`] - node state, agent nodes and workflow graphs
//! - [`config`] - provider credentials and runtime settings

pub mod adk;
pub mod config;
pub mod flow;

pub use adk::error::{FlowError, ModelError, Result, WorkflowError};
pub use config::FrameworkConfig;
