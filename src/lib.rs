//! Cryptoinfo - cryptocurrency and Bitcoin mining monitoring
//!
//! Configuration flows that create and reconfigure monitoring records (catalog
//! price trackers and single-source Bitcoin/mining statistics), plus the
//! storage and background refresh those records drive.

pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod flow;
pub mod host;
pub mod scheduler;
pub mod services;
pub mod sources;
pub mod state;

pub use error::{AppError, Result};
pub use flow::{ConfigFlow, FlowContext};
pub use services::FlowManager;
pub use state::AppState;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging.
///
/// Honours `RUST_LOG`; defaults to debug output for this crate. Calling it a
/// second time is a no-op.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cryptoinfo=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Build application state from the environment and resume refreshing stored
/// records. Must run inside a tokio runtime.
pub fn start(data_dir: std::path::PathBuf) -> Result<AppState> {
    init_tracing();

    tracing::info!("Starting Cryptoinfo...");

    let config = config::ClientConfig::from_env()?;
    let state = AppState::new(data_dir, &config)?;
    state.start_refresh()?;

    tracing::info!("Application state initialized");
    Ok(state)
}
