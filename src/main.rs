use anyhow::Context;
use graph_studio::{HttpServer, StudioConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = StudioConfig::from_env().with_context(|| {
        format!(
            "failed to load configuration from ${}",
            graph_studio::config::CONFIG_ENV
        )
    })?;

    info!("Graph Studio v{}", graph_studio::version());
    info!(
        gremlin_timeout_ms = config.gremlin.timeout_ms,
        multi_value = ?config.gremlin.multi_value,
        "configuration loaded"
    );

    let server = HttpServer::new(config);
    server.start().await.context("HTTP server failed")?;
    Ok(())
}
