// Sales Dashboard - Web Server

use anyhow::{Context, Result};
use sales_dashboard::{router, AppState, Config, SalesStore};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "sales_dashboard=info,sales_server=info,tower_http=info";

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    info!("shutdown requested");
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_logging();
    info!(version = sales_dashboard::VERSION, "Sales Dashboard - Web Server");

    let config = Config::load()?;

    std::fs::create_dir_all(&config.upload_dir)
        .with_context(|| format!("Failed to create upload directory {:?}", config.upload_dir))?;

    let store = SalesStore::open(&config.database)?;

    let state = AppState {
        store: store.clone(),
        upload_dir: config.upload_dir.clone(),
    };
    let app = router(state, &config);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    info!(%addr, "server running");
    info!("   API: http://{addr}/api/sales");
    info!("   UI:  http://{addr}/");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    store.close()?;

    Ok(())
}
