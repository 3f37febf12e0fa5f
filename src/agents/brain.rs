//! Brain - runs the emotion and reasoning networks and merges their answers.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AgentError, EvaluationContext, NetworkProfile, Synthesizer, TreeNetwork, UsageSnapshot};
use crate::config::Config;

/// Everything produced by one [`Brain::think`] run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrainResponse {
    pub run_id: Uuid,
    pub question: String,
    pub emotion: String,
    pub reasoning: String,
    pub synthesis: String,
    /// Usage recorded by the context when the run finished
    pub usage: UsageSnapshot,
    pub completed_at: DateTime<Utc>,
}

/// Top-level orchestrator.
///
/// # Execution Flow
/// 1. Emotion and reasoning networks run concurrently on the same question
/// 2. Either failing aborts the other
/// 3. The synthesizer merges both root answers
pub struct Brain {
    emotion: TreeNetwork,
    reasoning: TreeNetwork,
    synthesizer: Synthesizer,
}

impl Brain {
    pub fn new(branching_factor: usize, target_size: usize) -> Self {
        Self {
            emotion: TreeNetwork::new(NetworkProfile::emotion(), branching_factor, target_size),
            reasoning: TreeNetwork::new(NetworkProfile::reasoning(), branching_factor, target_size),
            synthesizer: Synthesizer::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.branching_factor, config.network_size)
    }

    pub fn emotion(&self) -> &TreeNetwork {
        &self.emotion
    }

    pub fn reasoning(&self) -> &TreeNetwork {
        &self.reasoning
    }

    pub async fn think(
        &self,
        question: &str,
        ctx: &EvaluationContext,
    ) -> Result<BrainResponse, AgentError> {
        let run_id = Uuid::new_v4();
        let started = Instant::now();
        tracing::info!(%run_id, "Starting network...");

        let (emotion, reasoning) = tokio::try_join!(
            self.emotion.execute(question, ctx),
            self.reasoning.execute(question, ctx),
        )?;

        let synthesis = self
            .synthesizer
            .synthesize(&emotion, &reasoning, ctx)
            .await?;

        let usage = ctx.usage.snapshot();
        tracing::info!(
            %run_id,
            calls = usage.calls,
            total_tokens = usage.tokens.total_tokens,
            elapsed = ?started.elapsed(),
            "Brain run complete"
        );

        Ok(BrainResponse {
            run_id,
            question: question.to_string(),
            emotion,
            reasoning,
            synthesis,
            usage,
            completed_at: Utc::now(),
        })
    }
}
