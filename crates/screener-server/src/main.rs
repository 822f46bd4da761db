//! screener-server: standalone HTTP server for batch adverse-media screening.
//!
//! Reads config from env vars:
//!   SCREENER_CONFIG      - optional JSON config file
//!   PORT                 - listen port (default: 2000)
//!   SCREENER_UPLOAD_DIR  - upload directory override
//!   SCREENER_OUTPUT_DIR  - output directory override
//!   SCREENER_WORKERS     - dispatcher pool size override
//!   RUST_LOG             - log filter

use std::process::ExitCode;
use std::sync::Arc;

use log::{error, info};
use tokio::net::TcpListener;

use screener::config::ScreenerConfig;
use screener::search::{DuckDuckGoProvider, SearchProvider};
use screener_server::logging::init_logging;
use screener_server::{build_router, AppState, ServerError};

fn main() -> ExitCode {
    init_logging();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("screener-server failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), ServerError> {
    let config = ScreenerConfig::from_env()?;
    info!(
        "Starting screener-server v{} ({} workers, {} default filters)",
        env!("CARGO_PKG_VERSION"),
        config.worker_count,
        config.filters.len()
    );

    // The provider's blocking HTTP client must be built and dropped outside
    // the async runtime, so this function keeps the last reference.
    let provider: Arc<dyn SearchProvider> = Arc::new(DuckDuckGoProvider::new(&config.search)?);

    let state = AppState::new(config, Arc::clone(&provider));
    state.ensure_directories()?;
    info!(
        "Uploads in {}, results in {}",
        state.config.upload_directory.display(),
        state.config.output_directory.display()
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let result = runtime.block_on(serve(Arc::new(state)));
    drop(runtime);
    drop(provider);
    result
}

async fn serve(state: Arc<AppState>) -> Result<(), ServerError> {
    let bind_addr = state.config.bind_addr.clone();
    let app = build_router(state);

    let listener = TcpListener::bind(&bind_addr).await?;
    info!("screener-server listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("screener-server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
