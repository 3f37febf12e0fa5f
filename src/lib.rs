//! # neural_units
//!
//! Answers a question with two trees of language-model agents and merges
//! what they say.
//!
//! ## Architecture
//!
//! ```text
//!                       question
//!              ┌───────────┴───────────┐
//!              ▼                       ▼
//!     ┌─────────────────┐     ┌─────────────────┐
//!     │ emotion network │     │reasoning network│
//!     │  (b-ary tree)   │     │  (b-ary tree)   │
//!     └────────┬────────┘     └────────┬────────┘
//!              └───────────┬───────────┘
//!                          ▼
//!                 ┌─────────────────┐
//!                 │   Synthesizer   │
//!                 └─────────────────┘
//! ```
//!
//! ## Evaluation Flow
//! 1. Each network builds a perfect tree with `NETWORK_SIZE` leaves
//! 2. Every leaf answers the question directly
//! 3. Every internal node merges its children's numbered answers
//! 4. The two root answers are synthesized into the final response
//!
//! ## Modules
//! - `agents`: trees, networks, synthesizer and the `Brain` orchestrator
//! - `llm`: chat completion client (OpenRouter)
//! - `config`: environment configuration

pub mod agents;
pub mod config;
pub mod llm;

pub use agents::{AgentError, Brain, BrainResponse, EvaluationContext};
pub use config::Config;
