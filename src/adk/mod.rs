// SPDX-License-Identifier: MIT

//! Agent development kit: models, tools, guardrails and the error types
//! shared by the workflow layer.

pub mod error;
pub mod guardrail;
pub mod llm;
pub mod model;
pub mod tool;

pub use error::{FlowError, ModelError, Result, WorkflowError};
pub use guardrail::{
    GuardAction, GuardPattern, Guardrail, GuardrailIssue, GuardrailRegistry, RegexGuardrail,
    SchemaFixer, SchemaGuardrail,
};
pub use llm::{Completion, Llm};
pub use model::{Content, GenerationConfig, Model, Part};
pub use tool::{FunctionTool, Tool, ToolCall, ToolRegistry};
