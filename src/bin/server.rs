//! Pricecast Server - forecasting worker
//!
//! Trains once at startup, then serves predictions over HTTP.
//!
//! # Usage
//! ```sh
//! TOKEN=ETH MODEL=SVR cargo run --bin server
//! ```
//!
//! # Environment Variables
//! - `TOKEN` - Token to forecast (default: ETH)
//! - `TIMEFRAME` - Resampling bucket, e.g. `10m`, `1h` (default: 1h)
//! - `MODEL` - LinearRegression, SVR, KernelRidge, BayesianRidge or kNN
//! - `DATA_PROVIDER` - binance or coingecko
//! - `SERVER_PORT` - Listening port (default: 8000)

use anyhow::{Context, Result};
use pricecast::config::Config;
use pricecast::infrastructure::ServiceFactory;
use pricecast::interfaces::http::{AppState, router};
use std::sync::Arc;
use tracing::{Level, error, info};
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(stdout_layer)
        .init();

    info!("Pricecast Server {} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    info!(
        "Configuration loaded: Token={}, Timeframe={}, Model={}, Provider={}",
        config.token, config.timeframe, config.model.kind, config.provider.provider
    );

    let worker = ServiceFactory::create_worker(&config);

    // A failed initial update leaves the server up; /update can retry
    info!("Running initial update...");
    match worker.update().await {
        Ok(report) => info!(
            "Initial update complete: {} model trained on {} rows",
            report.kind, report.training_rows
        ),
        Err(e) => error!("Initial update failed: {}", e),
    }

    let app = router(Arc::new(AppState { worker }));
    let address = config.server.socket_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;

    info!("Listening on {}", address);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutdown signal received. Exiting...");
        })
        .await?;

    Ok(())
}
