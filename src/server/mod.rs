//! HTTP/JSON transport
//!
//! Exposes dataset upload, training, model management and prediction over
//! an axum router. Core calls run on the blocking pool.

mod api;
mod error;
mod handlers;
mod state;

pub use api::create_router;
pub use error::ServerError;
pub use handlers::{ModelInfo, PredictRequest};
pub use state::AppState;

use crate::config::Settings;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

/// Start the server with the given settings
pub async fn run_server(settings: Settings) -> anyhow::Result<()> {
    let start_time = chrono::Utc::now();
    let state = Arc::new(AppState::from_settings(settings)?);

    if state.settings.dvc_enabled {
        let versioning = Arc::clone(&state.versioning);
        match tokio::task::spawn_blocking(move || versioning.setup()).await {
            Ok(Ok(())) => info!(remote = %state.settings.dvc_remote, "Remote versioning ready"),
            Ok(Err(e)) => warn!(error = %e, "Remote versioning setup failed, continuing without it"),
            Err(e) => warn!(error = %e, "Remote versioning setup task failed"),
        }
    }

    let settings = state.settings.clone();
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", settings.host, settings.port).parse()?;
    info!(
        env = %settings.env,
        address = %addr,
        max_upload_size_mb = settings.max_upload_size / 1024 / 1024,
        started_at = %start_time.to_rfc3339(),
        "Server starting"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, pid = std::process::id(), "Server listening and ready to accept connections");

    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        let uptime = chrono::Utc::now().signed_duration_since(start_time);
        info!(uptime_secs = uptime.num_seconds(), "Shutdown signal received, stopping server gracefully");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server shut down cleanly");
    Ok(())
}
