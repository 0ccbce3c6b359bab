use anyhow::Context;
use autodocgen::{
    api::{self, JobManager},
    client::AnthropicEndpoint,
    logging, Config,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_tracing("info,tower_http=debug")?;

    let config = Config::load()?;
    config.ensure_directories_exist().await?;

    let api_key = config
        .api_keys
        .resolve_key()
        .context("Set ANTHROPIC_API_KEY or api_keys.anthropic_api_key in the config file")?;
    let endpoint = AnthropicEndpoint::new(api_key.key, &config.api)?;
    info!("Using model {} at {}", config.api.model, config.api.base_url);

    let addr: SocketAddr = std::env::var("AUTODOCGEN_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:8000".to_string())
        .parse()
        .context("AUTODOCGEN_ADDR must be a socket address")?;

    if config.server.allowed_roots.is_empty() {
        info!("No allowed project roots configured, /api/process is disabled");
    }
    let cors = api::cors_layer(&config.server.cors_origins)?;

    let mut manager = JobManager::new(config, Arc::new(endpoint));
    if api_key.demo {
        warn!("Running with the demo key, demo restrictions apply");
        manager = manager.with_demo_mode();
    }
    let app = api::router(Arc::new(manager))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("autodocgen server listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;

    Ok(())
}
