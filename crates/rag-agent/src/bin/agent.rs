//! RAG agent command line
//!
//! Run with: cargo run -p rag-agent -- --config agent.yaml

use clap::Parser;
use rag_agent::generation::OllamaClient;
use rag_agent::providers::LlmBackend;
use rag_agent::{report, AgentConfig, Pipeline};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "rag-agent")]
#[command(about = "Run a configuration-driven RAG agent over its test cases")]
struct Args {
    /// Path to agent configuration file
    #[arg(short, long, default_value = "agent.yaml")]
    config: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rag_agent=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    // Setup failures are reported on stdout and still exit 0
    if let Err(e) = run(&args.config).await {
        tracing::error!("{:#}", e);
        let _ = report::write_error(&mut std::io::stdout(), &e);
    }
}

async fn run(config_path: &str) -> anyhow::Result<()> {
    let config = AgentConfig::from_yaml_file(config_path)?;

    tracing::info!("Starting agent: {}", config.name);
    tracing::info!("Using model: {}/{}", config.model.provider, config.model.name);

    check_ollama(&config).await;

    let pipeline = Pipeline::new(config);
    let agent = pipeline.build_agent().await?;
    let config = pipeline.config();

    let results = agent.run_test_cases().await;
    report::write_report(&mut std::io::stdout().lock(), config, &results)?;
    Ok(())
}

/// Warn early when the configured Ollama server is unreachable
async fn check_ollama(config: &AgentConfig) {
    if config.model.provider.parse::<LlmBackend>().ok() != Some(LlmBackend::Ollama) {
        return;
    }

    let base_url = &config.model.base_url;
    tracing::info!("Checking Ollama at {}...", base_url);

    let reachable = match OllamaClient::new(base_url, 5, 0) {
        Ok(client) => client.health_check().await.unwrap_or(false),
        Err(_) => false,
    };

    if reachable {
        tracing::info!("Ollama is running");
    } else {
        tracing::warn!("Ollama not available at {}", base_url);
        tracing::warn!("Please start Ollama:");
        tracing::warn!("  1. Install: https://ollama.com/download");
        tracing::warn!("  2. Start: ollama serve");
        tracing::warn!("  3. Pull model: ollama pull {}", config.model.name);
    }
}
