//! Agent tree structure and breadth-first construction.

use std::collections::{HashMap, VecDeque};

use super::network::NetworkProfile;
use super::{Agent, AgentError, NodeId};

/// A node in a [`NeuralTree`].
///
/// Leaf-ness is fixed when the tree is built; evaluation never re-derives it.
#[derive(Debug, Clone)]
pub enum NeuralNode {
    /// Answers the raw question directly
    Leaf { agent: Agent, depth: u32 },
    /// Merges the ordered outputs of its children
    Internal {
        agent: Agent,
        depth: u32,
        children: Vec<NodeId>,
    },
}

impl NeuralNode {
    pub fn agent(&self) -> &Agent {
        match self {
            Self::Leaf { agent, .. } | Self::Internal { agent, .. } => agent,
        }
    }

    pub fn depth(&self) -> u32 {
        match self {
            Self::Leaf { depth, .. } | Self::Internal { depth, .. } => *depth,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Leaf { .. })
    }

    /// Child identifiers in index order; empty for leaves.
    pub fn children(&self) -> &[NodeId] {
        match self {
            Self::Leaf { .. } => &[],
            Self::Internal { children, .. } => children,
        }
    }
}

/// A perfect `branching_factor`-ary tree of agents.
///
/// # Invariants
/// - `target_size == branching_factor ^ depth`
/// - Every internal node has exactly `branching_factor` children
/// - All leaves sit at `depth`
#[derive(Debug, Clone)]
pub struct NeuralTree {
    nodes: HashMap<NodeId, NeuralNode>,
    branching_factor: usize,
    target_size: usize,
    depth: u32,
}

impl NeuralTree {
    /// Build the tree breadth-first from `"root"`.
    ///
    /// # Errors
    /// Returns [`AgentError::InvalidTreeShape`] before creating any node when
    /// `target_size` is not an exact power of `branching_factor`, or either
    /// is zero.
    pub fn build(
        branching_factor: usize,
        target_size: usize,
        profile: &NetworkProfile,
    ) -> Result<Self, AgentError> {
        let depth =
            leaf_depth(branching_factor, target_size).ok_or(AgentError::InvalidTreeShape {
                branching_factor,
                target_size,
            })?;

        let mut nodes = HashMap::new();
        let mut queue = VecDeque::from([(NodeId::root(), 0u32)]);

        while let Some((id, node_depth)) = queue.pop_front() {
            let node = if node_depth == depth {
                NeuralNode::Leaf {
                    agent: Agent::new(id.as_str(), &profile.leaf_instructions),
                    depth: node_depth,
                }
            } else {
                let children: Vec<NodeId> = (0..branching_factor).map(|i| id.child(i)).collect();
                queue.extend(children.iter().cloned().map(|child| (child, node_depth + 1)));
                NeuralNode::Internal {
                    agent: Agent::new(id.as_str(), &profile.internal_instructions),
                    depth: node_depth,
                    children,
                }
            };
            nodes.insert(id, node);
        }

        tracing::debug!(
            network = %profile.name,
            nodes = nodes.len(),
            leaves = target_size,
            depth,
            "Built agent tree"
        );

        Ok(Self {
            nodes,
            branching_factor,
            target_size,
            depth,
        })
    }

    pub fn get(&self, id: &NodeId) -> Option<&NeuralNode> {
        self.nodes.get(id)
    }

    pub fn root(&self) -> Option<&NeuralNode> {
        self.get(&NodeId::root())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &NeuralNode)> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes.values().filter(|n| n.is_leaf()).count()
    }

    pub fn branching_factor(&self) -> usize {
        self.branching_factor
    }

    pub fn target_size(&self) -> usize {
        self.target_size
    }

    /// Depth of the leaves (root is depth 0).
    pub fn depth(&self) -> u32 {
        self.depth
    }

    #[cfg(test)]
    pub(crate) fn without(mut self, id: &NodeId) -> Self {
        self.nodes.remove(id);
        self
    }
}

/// The `k` for which `target_size == branching_factor ^ k`, if any.
///
/// A branching factor of 1 only admits a single-node tree.
pub fn leaf_depth(branching_factor: usize, target_size: usize) -> Option<u32> {
    if branching_factor == 0 || target_size == 0 {
        return None;
    }
    if target_size == 1 {
        return Some(0);
    }
    if branching_factor == 1 {
        return None;
    }

    let mut power = 1usize;
    let mut k = 0u32;
    while power < target_size {
        power = power.checked_mul(branching_factor)?;
        k += 1;
    }
    (power == target_size).then_some(k)
}
