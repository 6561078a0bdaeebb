#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result};
use chatrelay_ai::create_client;
use chatrelay_server::{AppState, HttpServer, ServerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,chatrelay_server=debug,chatrelay_ai=debug".into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .init();

    tracing::info!("Starting ChatRelay server");

    let config = ServerConfig::load().context("Failed to load configuration")?;
    let client = create_client(&config.llm).context("Failed to create LLM client")?;
    tracing::info!(
        provider = client.provider(),
        model = client.model(),
        "Generation backend ready"
    );

    let state = AppState::new(client, config.greeting.clone());
    HttpServer::new(config, state).run().await
}
