//! Core types for the agent trees.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Path-style identifier of a node, e.g. `root_child_2_child_0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(String);

impl NodeId {
    pub const ROOT: &'static str = "root";

    /// Identifier of the tree root.
    pub fn root() -> Self {
        Self(Self::ROOT.to_string())
    }

    /// Identifier of this node's `index`-th child.
    pub fn child(&self, index: usize) -> Self {
        Self(format!("{}_child_{}", self.0, index))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// What happens to in-flight siblings when one subtree fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Drop the remaining sibling evaluations as soon as one fails
    #[default]
    Cancel,
    /// Let every sibling finish, then report the first failure in child order
    Drain,
}

impl std::str::FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cancel" => Ok(Self::Cancel),
            "drain" => Ok(Self::Drain),
            other => Err(format!("expected `cancel` or `drain`, got `{}`", other)),
        }
    }
}

/// Errors that can occur while building or evaluating agent trees.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AgentError {
    #[error(
        "Invalid tree shape: target size {target_size} is not a power of \
         branching factor {branching_factor}"
    )]
    InvalidTreeShape {
        branching_factor: usize,
        target_size: usize,
    },

    #[error("Node not found in tree: {0}")]
    NodeNotFound(NodeId),

    #[error("Model call failed for agent '{agent}': {message}")]
    ModelCall { agent: String, message: String },

    #[error("Model returned no text content for agent '{0}'")]
    EmptyResponse(String),

    #[error("Model call for agent '{agent}' timed out after {timeout:?}")]
    Timeout { agent: String, timeout: Duration },

    #[error("Network '{network}' missed its deadline of {deadline:?}")]
    DeadlineExceeded { network: String, deadline: Duration },

    #[error("Evaluation context closed before agent '{0}' could run")]
    ContextClosed(String),
}
