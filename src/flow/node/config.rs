// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// Static description of a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Unique within a workflow
    pub name: String,
    /// System-style text placed at the top of every prompt
    #[serde(default)]
    pub instruction: String,
    /// Include `state.context` in prompts
    #[serde(default = "default_true")]
    pub use_context: bool,
    /// Copy fields into `state.context` after the node runs
    #[serde(default = "default_true")]
    pub share_context: bool,
    /// Fields to share; `None` shares every field the node changed
    #[serde(default)]
    pub shared_fields: Option<Vec<String>>,
}

impl NodeConfig {
    pub fn new(name: impl Into<String>, instruction: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instruction: instruction.into(),
            use_context: true,
            share_context: true,
            shared_fields: None,
        }
    }

    pub fn use_context(mut self, enabled: bool) -> Self {
        self.use_context = enabled;
        self
    }

    pub fn share_context(mut self, enabled: bool) -> Self {
        self.share_context = enabled;
        self
    }

    pub fn shared_fields<I, T>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.shared_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Graph identifier: the name with spaces replaced by `_`
    pub fn node_name(&self) -> String {
        node_id(&self.name)
    }
}

pub(crate) fn node_id(name: &str) -> String {
    name.replace(' ', "_")
}
