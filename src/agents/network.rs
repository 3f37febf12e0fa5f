//! Tree networks - bottom-up evaluation of a [`NeuralTree`].
//!
//! Every leaf answers the original question on its own. Every internal node
//! waits for all of its children (evaluated concurrently), numbers their
//! answers in child order and asks its own agent to merge them. The root's
//! answer is the network's answer.

use std::time::Instant;

use async_recursion::async_recursion;
use futures::future::{join_all, try_join_all};
use serde::{Deserialize, Serialize};

use super::{AgentError, EvaluationContext, FailurePolicy, NeuralNode, NeuralTree, NodeId};
use crate::llm::ChatMessage;

/// Prompt texts that distinguish one network from another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkProfile {
    pub name: String,
    /// Used by leaves, which see the raw question
    pub leaf_instructions: String,
    /// Used by internal nodes, which see their children's answers
    pub internal_instructions: String,
    /// First line of the prompt an internal node sends ahead of the numbered child outputs
    pub internal_prompt: String,
}

impl NetworkProfile {
    pub fn new(
        name: impl Into<String>,
        leaf_instructions: impl Into<String>,
        internal_instructions: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            leaf_instructions: leaf_instructions.into(),
            internal_instructions: internal_instructions.into(),
            internal_prompt: "Process child outputs:".to_string(),
        }
    }

    pub fn with_internal_prompt(mut self, internal_prompt: impl Into<String>) -> Self {
        self.internal_prompt = internal_prompt.into();
        self
    }

    /// Prompt for an internal node given its children's outputs in order.
    pub fn internal_input(&self, outputs: &[String]) -> String {
        format!("{}\n{}", self.internal_prompt, child_context(outputs))
    }

    pub fn emotion() -> Self {
        Self::new(
            "emotion",
            "Think about the emotions you feel about the world around you. \
             Use the most PURE form of emotional thinking.",
            "Process the output of child neurons and tie them together \
             to develop an emotional response.",
        )
    }

    pub fn reasoning() -> Self {
        Self::new(
            "reasoning",
            "Analyze and synthesize information to form a coherent thought. \
             Use reasoning abilities, using the PUREST form of logical thinking.",
            "Integrate inputs from child neurons to develop a reasoning process.",
        )
        .with_internal_prompt("Integrate child outputs for reasoning:")
    }
}

/// Numbered list of child outputs, in child order.
///
/// `["A", "B"]` becomes `"1. A\n2. B"`.
pub fn child_context(outputs: &[String]) -> String {
    outputs
        .iter()
        .enumerate()
        .map(|(i, output)| format!("{}. {}", i + 1, output))
        .collect::<Vec<_>>()
        .join("\n")
}

/// One network: a profile plus the shape of the tree it builds.
#[derive(Debug, Clone)]
pub struct TreeNetwork {
    profile: NetworkProfile,
    branching_factor: usize,
    target_size: usize,
}

impl TreeNetwork {
    pub fn new(profile: NetworkProfile, branching_factor: usize, target_size: usize) -> Self {
        Self {
            profile,
            branching_factor,
            target_size,
        }
    }

    pub fn profile(&self) -> &NetworkProfile {
        &self.profile
    }

    pub fn name(&self) -> &str {
        &self.profile.name
    }

    /// Build a fresh tree for this network.
    pub fn build(&self) -> Result<NeuralTree, AgentError> {
        NeuralTree::build(self.branching_factor, self.target_size, &self.profile)
    }

    /// Build a fresh tree and evaluate it against `input`.
    ///
    /// The tree is dropped afterwards; nothing carries over between calls.
    ///
    /// # Errors
    /// - `InvalidTreeShape` before any model call if the shape is invalid
    /// - `DeadlineExceeded` if the context's tree deadline elapses
    /// - Any error from [`evaluate`](Self::evaluate)
    pub async fn execute(
        &self,
        input: &str,
        ctx: &EvaluationContext,
    ) -> Result<String, AgentError> {
        let started = Instant::now();
        tracing::info!(
            network = %self.profile.name,
            branching_factor = self.branching_factor,
            target_size = self.target_size,
            "Starting network"
        );

        let run = async {
            let tree = self.build()?;
            self.evaluate(&tree, input, ctx).await
        };

        let answer = match ctx.tree_deadline {
            Some(deadline) => tokio::time::timeout(deadline, run).await.map_err(|_| {
                AgentError::DeadlineExceeded {
                    network: self.profile.name.clone(),
                    deadline,
                }
            })??,
            None => run.await?,
        };

        tracing::info!(
            network = %self.profile.name,
            elapsed = ?started.elapsed(),
            "Network finished"
        );
        Ok(answer)
    }

    /// Evaluate `tree` bottom-up starting at the root.
    ///
    /// Every leaf receives `input` unchanged. Sibling subtrees run
    /// concurrently; their outputs are joined in child order regardless of
    /// which finishes first.
    pub async fn evaluate(
        &self,
        tree: &NeuralTree,
        input: &str,
        ctx: &EvaluationContext,
    ) -> Result<String, AgentError> {
        self.evaluate_node(tree, &NodeId::root(), input, ctx).await
    }

    #[async_recursion]
    async fn evaluate_node(
        &self,
        tree: &NeuralTree,
        id: &NodeId,
        input: &str,
        ctx: &EvaluationContext,
    ) -> Result<String, AgentError> {
        let node = tree
            .get(id)
            .ok_or_else(|| AgentError::NodeNotFound(id.clone()))?;

        match node {
            NeuralNode::Leaf { agent, .. } => {
                tracing::debug!(network = %self.profile.name, node = %id, "Leaf call");
                ctx.call(agent, &[ChatMessage::user(input)]).await
            }
            NeuralNode::Internal {
                agent, children, ..
            } => {
                let evaluations = children
                    .iter()
                    .map(|child| self.evaluate_node(tree, child, input, ctx));

                let outputs = match ctx.failure_policy {
                    FailurePolicy::Cancel => try_join_all(evaluations).await?,
                    FailurePolicy::Drain => join_all(evaluations)
                        .await
                        .into_iter()
                        .collect::<Result<Vec<_>, _>>()?,
                };

                tracing::debug!(
                    network = %self.profile.name,
                    node = %id,
                    children = outputs.len(),
                    "Internal call"
                );
                let prompt = self.profile.internal_input(&outputs);
                ctx.call(agent, &[ChatMessage::user(prompt)]).await
            }
        }
    }
}
