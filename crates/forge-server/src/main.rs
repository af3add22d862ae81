use std::sync::Arc;

use forge_ai::OpenRouterBackend;
use forge_server::config::ServerConfig;
use forge_server::{AppState, app};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

type DynError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), DynError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;
    let pipeline = config.pipeline_config();
    let bind_addr = config.bind_addr;

    let backend = OpenRouterBackend::new(config.base_url, config.api_key);
    let state = Arc::new(AppState::new(
        backend,
        pipeline,
        config.spool_dir,
        config.static_dir,
    ));

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!(addr = %bind_addr, "listening");
    axum::serve(listener, app(state)).await?;
    Ok(())
}
