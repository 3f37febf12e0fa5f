//! neural_units - command line entry point
//!
//! Asks one question of the emotion and reasoning networks and prints the
//! synthesized answer.

use std::sync::Arc;

use neural_units::agents::{Brain, EvaluationContext, LlmAgentRunner};
use neural_units::config::Config;
use neural_units::llm::{ChatOptions, OpenRouterClient};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout only carries the answer
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "neural_units=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = Config::from_env()?;
    let args: Vec<String> = std::env::args().skip(1).collect();
    if !args.is_empty() {
        config.question = args.join(" ");
    }
    info!(
        model = %config.default_model,
        branching_factor = config.branching_factor,
        network_size = config.network_size,
        max_concurrent_calls = config.max_concurrent_calls,
        "Loaded configuration"
    );

    let client = OpenRouterClient::new(config.api_key.clone()).with_api_url(config.api_url.clone());
    let runner = LlmAgentRunner::new(Arc::new(client), config.default_model.clone()).with_options(
        ChatOptions {
            temperature: config.temperature,
            ..ChatOptions::default()
        },
    );
    let ctx = EvaluationContext::from_config(Arc::new(runner), &config);
    let brain = Brain::from_config(&config);

    let response = tokio::select! {
        result = brain.think(&config.question, &ctx) => result?,
        _ = tokio::signal::ctrl_c() => anyhow::bail!("Interrupted before the networks finished"),
    };

    println!("Question: {}\n", response.question);
    println!("----- RESPONSE ---------------------------------------------");
    println!("{}", response.synthesis);

    Ok(())
}
