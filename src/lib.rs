//! netdesign -- network design analyzer.
//!
//! Turns a user-authored topology into a fixed-order feature vector, scores
//! it with an isolation forest trained on synthetic topologies, and returns a
//! risk-annotated topology with chart series and remediation suggestions.

pub mod analysis;
pub mod api;
pub mod config;
pub mod features;
pub mod scoring;
pub mod simulate;
pub mod suggest;
pub mod topology;
pub mod training;

use anyhow::Result;

use crate::config::AnalyzerConfig;

/// Start the HTTP service.
pub async fn serve(config: &AnalyzerConfig) -> Result<()> {
    let state = api::state::AppState::from_config(config);

    // Warm the cache so a missing artifact shows up at startup, not on the first request.
    if let Err(e) = state.analyzer.models().get() {
        tracing::warn!(error = %e, "model not loaded yet; /analyze will fail until it is available");
    }

    let addr: std::net::SocketAddr = config.server.bind.parse()?;
    let app = api::router(state, &config.server.cors_origins);

    tracing::info!(%addr, "netdesign listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
