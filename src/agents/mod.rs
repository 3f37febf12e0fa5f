//! Agents module - emotion and reasoning trees.
//!
//! # Components
//! - **NeuralTree**: perfect `b`-ary tree of agents, built breadth-first
//! - **TreeNetwork**: evaluates a tree bottom-up, fanning out at every internal node
//! - **Synthesizer**: merges the emotion and reasoning answers
//! - **Brain**: runs both networks concurrently, then synthesizes
//!
//! # Model access
//! Every model call goes through an [`AgentRunner`] held by the
//! [`EvaluationContext`]; nothing reaches for a global client.

mod brain;
mod context;
mod network;
mod synthesizer;
mod tree;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use brain::{Brain, BrainResponse};
pub use context::{EvaluationContext, UsageMeter, UsageSnapshot};
pub use network::{child_context, NetworkProfile, TreeNetwork};
pub use synthesizer::Synthesizer;
pub use tree::{leaf_depth, NeuralNode, NeuralTree};
pub use types::{AgentError, FailurePolicy, NodeId};

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::llm::{ChatMessage, ChatOptions, LlmClient, TokenUsage};

/// A named agent and the instructions it runs with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub name: String,
    pub instructions: String,
}

impl Agent {
    pub fn new(name: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
        }
    }
}

/// Text produced by one model call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentReply {
    pub content: String,
    pub usage: Option<TokenUsage>,
}

impl AgentReply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            usage: None,
        }
    }
}

/// Capability to run an agent against a conversation.
///
/// # Postconditions
/// - `Ok` carries the content of the last message the model produced
#[async_trait]
pub trait AgentRunner: Send + Sync {
    async fn run(&self, agent: &Agent, messages: &[ChatMessage]) -> Result<AgentReply, AgentError>;
}

/// [`AgentRunner`] backed by a chat completion client.
///
/// The agent's instructions go out as the system message, followed by the
/// caller's messages.
pub struct LlmAgentRunner {
    llm: Arc<dyn LlmClient>,
    model: String,
    options: ChatOptions,
}

impl LlmAgentRunner {
    pub fn new(llm: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
            options: ChatOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ChatOptions) -> Self {
        self.options = options;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl AgentRunner for LlmAgentRunner {
    async fn run(&self, agent: &Agent, messages: &[ChatMessage]) -> Result<AgentReply, AgentError> {
        let mut conversation = Vec::with_capacity(messages.len() + 1);
        conversation.push(ChatMessage::system(&agent.instructions));
        conversation.extend_from_slice(messages);

        let response = self
            .llm
            .chat_completion_with_options(&self.model, &conversation, self.options)
            .await
            .map_err(|e| AgentError::ModelCall {
                agent: agent.name.clone(),
                message: format!("{:#}", e),
            })?;

        match response.content {
            Some(content) if !content.trim().is_empty() => Ok(AgentReply {
                content,
                usage: response.usage,
            }),
            _ => Err(AgentError::EmptyResponse(agent.name.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatResponse, Role};
    use std::sync::Mutex;

    /// Records the conversation it receives and answers with a fixed body.
    struct RecordingClient {
        content: Option<String>,
        seen: Mutex<Vec<(String, Vec<ChatMessage>)>>,
    }

    #[async_trait]
    impl LlmClient for RecordingClient {
        async fn chat_completion(
            &self,
            model: &str,
            messages: &[ChatMessage],
        ) -> anyhow::Result<ChatResponse> {
            self.seen
                .lock()
                .unwrap()
                .push((model.to_string(), messages.to_vec()));
            Ok(ChatResponse {
                content: self.content.clone(),
                finish_reason: Some("stop".to_string()),
                usage: Some(TokenUsage::new(7, 2)),
                model: Some(model.to_string()),
            })
        }
    }

    struct FailingClient;

    #[async_trait]
    impl LlmClient for FailingClient {
        async fn chat_completion(
            &self,
            _model: &str,
            _messages: &[ChatMessage],
        ) -> anyhow::Result<ChatResponse> {
            Err(crate::llm::LlmError::from_status(401, "bad key".to_string(), None).into())
        }
    }

    #[tokio::test]
    async fn test_instructions_become_system_message() {
        let client = Arc::new(RecordingClient {
            content: Some("feeling hopeful".to_string()),
            seen: Mutex::new(Vec::new()),
        });
        let runner = LlmAgentRunner::new(client.clone(), "test/model");
        let agent = Agent::new("root", "Feel things.");

        let reply = runner
            .run(&agent, &[ChatMessage::user("Q")])
            .await
            .unwrap();

        assert_eq!(reply.content, "feeling hopeful");
        assert_eq!(reply.usage, Some(TokenUsage::new(7, 2)));

        let seen = client.seen.lock().unwrap();
        let (model, messages) = &seen[0];
        assert_eq!(model, "test/model");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[0].content, "Feel things.");
        assert_eq!(messages[1], ChatMessage::user("Q"));
    }

    #[tokio::test]
    async fn test_blank_content_is_an_error() {
        let client = Arc::new(RecordingClient {
            content: Some("   ".to_string()),
            seen: Mutex::new(Vec::new()),
        });
        let runner = LlmAgentRunner::new(client, "m");

        let err = runner
            .run(&Agent::new("leaf", "x"), &[ChatMessage::user("Q")])
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::EmptyResponse(name) if name == "leaf"));
    }

    #[tokio::test]
    async fn test_client_errors_become_model_call_failures() {
        let runner = LlmAgentRunner::new(Arc::new(FailingClient), "m");

        let err = runner
            .run(&Agent::new("root", "x"), &[ChatMessage::user("Q")])
            .await
            .unwrap_err();
        match err {
            AgentError::ModelCall { agent, message } => {
                assert_eq!(agent, "root");
                assert!(message.contains("HTTP 401"), "{}", message);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
