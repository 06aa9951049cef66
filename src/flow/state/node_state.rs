// SPDX-License-Identifier: MIT

use crate::adk::error::{FlowError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Key-value mapping shared between nodes
pub type Context = BTreeMap<String, Value>;

/// State threaded through every node of a workflow run.
///
/// Implementors carry their own fields plus a `context` map and an `error`
/// string (empty means no error). [`impl_node_state!`](crate::impl_node_state)
/// implements the accessors for structs with fields named `context` and
/// `error`.
pub trait NodeState: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    fn context(&self) -> &Context;

    fn context_mut(&mut self) -> &mut Context;

    /// The soft error recorded by a node, if any
    fn error(&self) -> Option<&str>;

    fn set_error(&mut self, error: String);

    /// Field-level validation, run on construction and after every node
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Record a soft error; linear workflows stop after the current node
    fn emit_error(mut self, error: impl Into<String>) -> Self {
        let error = error.into();
        log::error!("Node error: {}", error);
        self.set_error(error);
        self
    }

    fn add_to_context(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.context_mut().insert(key.into(), value.into());
    }

    fn get_from_context(&self, key: &str) -> Option<&Value> {
        self.context().get(key)
    }

    /// Build and validate a state from its JSON form
    fn from_json(value: Value) -> Result<Self> {
        let state: Self =
            serde_json::from_value(value).map_err(|e| FlowError::validation(e.to_string()))?;
        state.validate()?;
        Ok(state)
    }

    fn to_json(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Implement [`NodeState`] for a struct with `context: Context` and
/// `error: String` fields.
///
/// ```
/// use agentflow_rs::flow::state::Context;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Clone, Default, Serialize, Deserialize)]
/// struct DocumentState {
///     #[serde(default)]
///     content: String,
///     #[serde(default)]
///     context: Context,
///     #[serde(default)]
///     error: String,
/// }
///
/// agentflow_rs::impl_node_state!(DocumentState);
/// ```
#[macro_export]
macro_rules! impl_node_state {
    ($ty:ty) => {
        $crate::impl_node_state!($ty, |_state| Ok(()));
    };
    ($ty:ty, $validate:expr) => {
        impl $crate::flow::state::NodeState for $ty {
            fn context(&self) -> &$crate::flow::state::Context {
                &self.context
            }

            fn context_mut(&mut self) -> &mut $crate::flow::state::Context {
                &mut self.context
            }

            fn error(&self) -> Option<&str> {
                if self.error.is_empty() {
                    None
                } else {
                    Some(self.error.as_str())
                }
            }

            fn set_error(&mut self, error: String) {
                self.error = error;
            }

            fn validate(&self) -> $crate::adk::error::Result<()> {
                let check: fn(&$ty) -> $crate::adk::error::Result<()> = $validate;
                check(self)
            }
        }
    };
}
