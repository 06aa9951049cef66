// SPDX-License-Identifier: MIT

//! State management for workflows
//!
//! This module provides:
//! - `NodeState` - the trait every workflow state implements
//! - `StateSchema` - field types and defaults for schema-driven state
//! - `DynamicState` - a `NodeState` whose fields are checked against a schema

mod node_state;
mod schema;
mod store;

pub use node_state::{Context, NodeState};
pub use schema::{FieldType, StateFieldDef, StateSchema};
pub use store::DynamicState;
