//! Synthesizer - merges the emotion and reasoning answers.

use super::{Agent, AgentError, EvaluationContext};
use crate::llm::ChatMessage;

const SYNTHESIZER_INSTRUCTIONS: &str =
    "You are the part of the brain that ties together different ways of thinking. \
     You will receive an emotion response and a reasoning response. \
     Combine them to form a final response.";

/// Single agent that combines both network answers into one.
#[derive(Debug, Clone)]
pub struct Synthesizer {
    agent: Agent,
}

impl Synthesizer {
    pub fn new() -> Self {
        Self {
            agent: Agent::new("synthesizer", SYNTHESIZER_INSTRUCTIONS),
        }
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    /// The two labeled user messages sent to the model.
    pub fn messages(emotion: &str, reasoning: &str) -> [ChatMessage; 2] {
        [
            ChatMessage::user(format!("Emotional response: {}", emotion)),
            ChatMessage::user(format!("Logical reasoning response: {}", reasoning)),
        ]
    }

    /// One model call over both answers.
    pub async fn synthesize(
        &self,
        emotion: &str,
        reasoning: &str,
        ctx: &EvaluationContext,
    ) -> Result<String, AgentError> {
        tracing::debug!("Synthesizing emotion and reasoning responses");
        ctx.call(&self.agent, &Self::messages(emotion, reasoning))
            .await
    }
}

impl Default for Synthesizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::testing::{MockRunner, Script};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_synthesis_is_a_function_of_the_labeled_prompt() {
        let runner = Arc::new(MockRunner::echo());
        let ctx = EvaluationContext::new(runner.clone(), 1);

        let out = Synthesizer::new()
            .synthesize("I feel uneasy", "The risks are real", &ctx)
            .await
            .unwrap();

        let prompt =
            "Emotional response: I feel uneasy\nLogical reasoning response: The risks are real";
        assert_eq!(out, MockRunner::echo_of(SYNTHESIZER_INSTRUCTIONS, prompt));

        let calls = runner.started();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].agent, "synthesizer");
        assert_eq!(calls[0].input, prompt);
    }

    #[tokio::test]
    async fn test_synthesis_failure_propagates() {
        let runner = Arc::new(
            MockRunner::echo().with_script(Script::fail("synthesizer", "rate limited")),
        );
        let ctx = EvaluationContext::new(runner, 1);

        let err = Synthesizer::new().synthesize("e", "r", &ctx).await.unwrap_err();
        assert!(matches!(err, AgentError::ModelCall { .. }));
    }
}
