// [[EKO]]/apps/studio-server/src/main.rs
// Purpose: Entry point. Loads configuration and serves the studio kernel.
// Architecture: Application Boot
// Dependencies: Axum, Tokio, tracing-subscriber

use std::sync::Arc;

use anyhow::Context;
use eko_studio::agent::HttpAgentEngine;
use eko_studio::config::StudioConfig;
use eko_studio::runtime::StudioRuntime;
use eko_studio::server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("eko_studio=debug".parse()?)
                .add_directive("tower_http=trace".parse()?),
        )
        .init();

    tracing::info!("Initializing EKO Studio kernel...");

    let config = StudioConfig::from_env();
    tracing::info!(
        "Logs: {} (recording {}), agent engine: {}",
        config.log_dir.display(),
        if config.record_enabled { "on" } else { "off" },
        config.agent_url()
    );

    let engine = Arc::new(HttpAgentEngine::new(config.agent_url()));
    let port = config.port;
    let runtime = Arc::new(StudioRuntime::new(config, engine));

    let app = server::router(runtime);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!("EKO Studio listening on http://{}", addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
