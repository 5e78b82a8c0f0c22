use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use docqa_core::DocQaConfig;
use docqa_service::{router, AppState};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let config = DocQaConfig::load()?;
    let state = Arc::new(AppState::from_config(&config)?);
    info!(index_root = %state.store.root().display(), top_k = state.top_k, "namespace store ready");
    let app = router(state);
    let addr: SocketAddr = config.service.bind_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening" = %addr);
    axum::serve(listener, app).await?;
    Ok(())
}
