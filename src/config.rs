//! Configuration management for neural_units.
//!
//! Configuration is read from environment variables:
//! - `OPENROUTER_API_KEY` - Required. Your OpenRouter API key.
//! - `OPENROUTER_API_URL` - Optional. Chat completions endpoint. Defaults to OpenRouter.
//! - `DEFAULT_MODEL` - Optional. Model used for every call. Defaults to `openai/gpt-4o-mini`.
//! - `BRANCHING_FACTOR` - Optional. Children per internal node. Defaults to `5`.
//! - `NETWORK_SIZE` - Optional. Leaves per network, a power of the branching factor.
//!   Defaults to `625`.
//! - `QUESTION` - Optional. Question asked when none is given on the command line.
//! - `MAX_CONCURRENT_CALLS` - Optional. In-flight model call cap. Defaults to `16`.
//! - `CALL_TIMEOUT_SECS` - Optional. Per-call timeout, `0` disables. Defaults to `120`.
//! - `TREE_DEADLINE_SECS` - Optional. Whole-network deadline, `0` disables. Defaults to `0`.
//! - `FAILURE_POLICY` - Optional. `cancel` or `drain`. Defaults to `cancel`.
//! - `TEMPERATURE` - Optional. Sampling temperature.

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::agents::{leaf_depth, FailurePolicy};
use crate::llm::OPENROUTER_API_URL;

pub const DEFAULT_QUESTION: &str =
    "Are there any bad actors at OpenAI? Who else threatens the future of AI?";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Run configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// OpenRouter API key
    pub api_key: String,

    /// Chat completions endpoint
    pub api_url: String,

    /// LLM model identifier (OpenRouter format)
    pub default_model: String,

    pub branching_factor: usize,

    /// Leaf count of each network
    pub network_size: usize,

    pub question: String,

    pub max_concurrent_calls: usize,

    pub call_timeout: Option<Duration>,

    pub tree_deadline: Option<Duration>,

    pub failure_policy: FailurePolicy,

    pub temperature: Option<f64>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `OPENROUTER_API_KEY` is not set,
    /// and `ConfigError::InvalidValue` for unparsable values or a tree shape
    /// that cannot be built.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("OPENROUTER_API_KEY")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("OPENROUTER_API_KEY".to_string()))?;

        let api_url =
            lookup("OPENROUTER_API_URL").unwrap_or_else(|| OPENROUTER_API_URL.to_string());

        let default_model =
            lookup("DEFAULT_MODEL").unwrap_or_else(|| "openai/gpt-4o-mini".to_string());

        let question = lookup("QUESTION").unwrap_or_else(|| DEFAULT_QUESTION.to_string());

        let temperature = lookup("TEMPERATURE")
            .map(|v| parse_value::<f64>("TEMPERATURE", &v))
            .transpose()?;

        let config = Self {
            api_key,
            api_url,
            default_model,
            branching_factor: parse_or(&lookup, "BRANCHING_FACTOR", 5)?,
            network_size: parse_or(&lookup, "NETWORK_SIZE", 625)?,
            question,
            max_concurrent_calls: parse_or(&lookup, "MAX_CONCURRENT_CALLS", 16)?,
            call_timeout: seconds(parse_or(&lookup, "CALL_TIMEOUT_SECS", 120)?),
            tree_deadline: seconds(parse_or(&lookup, "TREE_DEADLINE_SECS", 0)?),
            failure_policy: parse_or(&lookup, "FAILURE_POLICY", FailurePolicy::Cancel)?,
            temperature,
        };
        config.validate()?;
        Ok(config)
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(api_key: String, branching_factor: usize, network_size: usize) -> Self {
        Self {
            api_key,
            api_url: OPENROUTER_API_URL.to_string(),
            default_model: "openai/gpt-4o-mini".to_string(),
            branching_factor,
            network_size,
            question: DEFAULT_QUESTION.to_string(),
            max_concurrent_calls: 16,
            call_timeout: Some(Duration::from_secs(120)),
            tree_deadline: None,
            failure_policy: FailurePolicy::Cancel,
            temperature: None,
        }
    }

    /// Reject shapes that could never terminate and a zero concurrency cap.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if leaf_depth(self.branching_factor, self.network_size).is_none() {
            return Err(ConfigError::InvalidValue(
                "NETWORK_SIZE".to_string(),
                format!(
                    "{} is not a power of BRANCHING_FACTOR {}",
                    self.network_size, self.branching_factor
                ),
            ));
        }
        if self.max_concurrent_calls == 0 {
            return Err(ConfigError::InvalidValue(
                "MAX_CONCURRENT_CALLS".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| ConfigError::InvalidValue(key.to_string(), format!("{}", e)))
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn seconds(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}
