//! Deterministic [`AgentRunner`] for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{Agent, AgentError, AgentReply, AgentRunner};
use crate::llm::{ChatMessage, TokenUsage};

/// One call as seen by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RecordedCall {
    pub agent: String,
    pub instructions: String,
    pub input: String,
}

#[derive(Debug, Clone, Default)]
struct Behavior {
    delay: Duration,
    reply: Option<String>,
    fail: Option<String>,
}

/// Per-agent override of the mock's default echo.
pub(crate) struct Script {
    agent: String,
    behavior: Behavior,
}

impl Script {
    pub fn reply(agent: &str, text: &str) -> Self {
        Self {
            agent: agent.to_string(),
            behavior: Behavior {
                reply: Some(text.to_string()),
                ..Behavior::default()
            },
        }
    }

    pub fn fail(agent: &str, message: &str) -> Self {
        Self {
            agent: agent.to_string(),
            behavior: Behavior {
                fail: Some(message.to_string()),
                ..Behavior::default()
            },
        }
    }

    pub fn delay(agent: &str, delay: Duration) -> Self {
        Self {
            agent: agent.to_string(),
            behavior: Behavior {
                delay,
                ..Behavior::default()
            },
        }
    }
}

/// Answers `[<first 5 chars of instructions>|<input>]` unless scripted otherwise.
///
/// The input is the user messages joined by newlines.
pub(crate) struct MockRunner {
    behaviors: HashMap<String, Behavior>,
    default_delay: Duration,
    usage: Option<TokenUsage>,
    started: Mutex<Vec<RecordedCall>>,
    finished: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl MockRunner {
    pub fn echo() -> Self {
        Self {
            behaviors: HashMap::new(),
            default_delay: Duration::ZERO,
            usage: None,
            started: Mutex::new(Vec::new()),
            finished: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Merge a script into the existing behaviour for its agent.
    pub fn with_script(mut self, script: Script) -> Self {
        let entry = self.behaviors.entry(script.agent).or_default();
        if !script.behavior.delay.is_zero() {
            entry.delay = script.behavior.delay;
        }
        if script.behavior.reply.is_some() {
            entry.reply = script.behavior.reply;
        }
        if script.behavior.fail.is_some() {
            entry.fail = script.behavior.fail;
        }
        self
    }

    pub fn with_default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn started(&self) -> Vec<RecordedCall> {
        self.started.lock().unwrap().clone()
    }

    /// Agent names whose calls ran to completion, in completion order.
    pub fn finished(&self) -> Vec<String> {
        self.finished.lock().unwrap().clone()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn echo_of(instructions: &str, input: &str) -> String {
        let head: String = instructions.chars().take(5).collect();
        format!("[{}|{}]", head, input)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl AgentRunner for MockRunner {
    async fn run(&self, agent: &Agent, messages: &[ChatMessage]) -> Result<AgentReply, AgentError> {
        let input = messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        self.started.lock().unwrap().push(RecordedCall {
            agent: agent.name.clone(),
            instructions: agent.instructions.clone(),
            input: input.clone(),
        });

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        let behavior = self.behaviors.get(&agent.name).cloned().unwrap_or_default();
        let delay = if behavior.delay.is_zero() {
            self.default_delay
        } else {
            behavior.delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.finished.lock().unwrap().push(agent.name.clone());

        if let Some(message) = behavior.fail {
            return Err(AgentError::ModelCall {
                agent: agent.name.clone(),
                message,
            });
        }

        let content = behavior
            .reply
            .unwrap_or_else(|| Self::echo_of(&agent.instructions, &input));
        Ok(AgentReply {
            content,
            usage: self.usage,
        })
    }
}
