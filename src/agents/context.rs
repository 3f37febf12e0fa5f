//! Evaluation context - shared state across every call of a run.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use super::{Agent, AgentError, AgentRunner, FailurePolicy};
use crate::config::Config;
use crate::llm::{ChatMessage, TokenUsage};

/// Shared context passed to every network and the synthesizer.
///
/// # Concurrency
/// `limiter` gates in-flight model calls across both trees. A permit is held
/// only for the duration of one call, never while a parent waits on its
/// children, so the gate cannot starve the recursion.
pub struct EvaluationContext {
    /// Model-calling capability
    pub runner: Arc<dyn AgentRunner>,

    limiter: Arc<Semaphore>,

    max_concurrent_calls: usize,

    /// Per-call timeout
    pub call_timeout: Option<Duration>,

    /// Deadline for building and evaluating one whole tree
    pub tree_deadline: Option<Duration>,

    pub failure_policy: FailurePolicy,

    pub usage: UsageMeter,
}

impl EvaluationContext {
    /// Create a context with the given concurrency cap and no timeouts.
    ///
    /// A cap of zero is treated as one.
    pub fn new(runner: Arc<dyn AgentRunner>, max_concurrent_calls: usize) -> Self {
        let max_concurrent_calls = max_concurrent_calls.max(1);
        Self {
            runner,
            limiter: Arc::new(Semaphore::new(max_concurrent_calls)),
            max_concurrent_calls,
            call_timeout: None,
            tree_deadline: None,
            failure_policy: FailurePolicy::default(),
            usage: UsageMeter::default(),
        }
    }

    /// Create a context using the limits from `config`.
    pub fn from_config(runner: Arc<dyn AgentRunner>, config: &Config) -> Self {
        Self::new(runner, config.max_concurrent_calls)
            .with_call_timeout(config.call_timeout)
            .with_tree_deadline(config.tree_deadline)
            .with_failure_policy(config.failure_policy)
    }

    pub fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_tree_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.tree_deadline = deadline;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn max_concurrent_calls(&self) -> usize {
        self.max_concurrent_calls
    }

    /// Refuse every call that has not yet acquired a slot.
    ///
    /// Calls already in flight run to completion.
    pub fn close(&self) {
        self.limiter.close();
    }

    /// Run one model call under the concurrency gate and call timeout.
    ///
    /// # Errors
    /// - `Timeout` if `call_timeout` elapses first
    /// - Whatever the runner returns
    /// - `ContextClosed` if [`close`](Self::close) was called
    pub async fn call(
        &self,
        agent: &Agent,
        messages: &[ChatMessage],
    ) -> Result<String, AgentError> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|_| AgentError::ContextClosed(agent.name.clone()))?;

        let run = self.runner.run(agent, messages);
        let reply = match self.call_timeout {
            Some(timeout) => tokio::time::timeout(timeout, run)
                .await
                .map_err(|_| AgentError::Timeout {
                    agent: agent.name.clone(),
                    timeout,
                })??,
            None => run.await?,
        };

        self.usage.record(reply.usage);
        Ok(reply.content)
    }
}

/// Lock-free tally of model calls and tokens.
#[derive(Debug, Default)]
pub struct UsageMeter {
    calls: AtomicU64,
    prompt_tokens: AtomicU64,
    completion_tokens: AtomicU64,
}

impl UsageMeter {
    pub fn record(&self, usage: Option<TokenUsage>) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if let Some(usage) = usage {
            self.prompt_tokens
                .fetch_add(usage.prompt_tokens, Ordering::Relaxed);
            self.completion_tokens
                .fetch_add(usage.completion_tokens, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> UsageSnapshot {
        let tokens = TokenUsage::new(
            self.prompt_tokens.load(Ordering::Relaxed),
            self.completion_tokens.load(Ordering::Relaxed),
        );
        UsageSnapshot {
            calls: self.calls.load(Ordering::Relaxed),
            tokens,
        }
    }
}

/// Point-in-time copy of a [`UsageMeter`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub calls: u64,
    pub tokens: TokenUsage,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::testing::{MockRunner, Script};

    #[tokio::test]
    async fn test_call_records_usage() {
        let runner = Arc::new(MockRunner::echo().with_usage(TokenUsage::new(10, 5)));
        let ctx = EvaluationContext::new(runner, 4);
        let agent = Agent::new("leaf", "Think.");

        let out = ctx.call(&agent, &[ChatMessage::user("Q")]).await.unwrap();
        ctx.call(&agent, &[ChatMessage::user("Q")]).await.unwrap();

        assert_eq!(out, "[Think|Q]");
        let usage = ctx.usage.snapshot();
        assert_eq!(usage.calls, 2);
        assert_eq!(usage.tokens, TokenUsage::new(20, 10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_timeout() {
        let runner = Arc::new(
            MockRunner::echo().with_script(Script::delay("slow", Duration::from_secs(30))),
        );
        let ctx = EvaluationContext::new(runner, 1)
            .with_call_timeout(Some(Duration::from_secs(5)));

        let err = ctx
            .call(&Agent::new("slow", "x"), &[ChatMessage::user("Q")])
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Timeout { agent, .. } if agent == "slow"));
        assert_eq!(ctx.usage.snapshot().calls, 0);
    }

    #[tokio::test]
    async fn test_closed_context_rejects_calls() {
        let runner = Arc::new(MockRunner::echo());
        let ctx = EvaluationContext::new(runner.clone(), 2);
        ctx.close();

        let err = ctx
            .call(&Agent::new("leaf", "x"), &[ChatMessage::user("Q")])
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::ContextClosed(agent) if agent == "leaf"));
        assert!(runner.started().is_empty());
    }

    #[test]
    fn test_zero_cap_is_clamped() {
        let ctx = EvaluationContext::new(Arc::new(MockRunner::echo()), 0);
        assert_eq!(ctx.max_concurrent_calls(), 1);
    }
}
