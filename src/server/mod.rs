//! HTTP relay between the HUD session and the outside world.
//!
//! - POST /search  - price questions answered locally, other queries forwarded
//! - POST /gesture - forward a webcam frame to the gesture classifier
//! - POST /ftso    - latest USD price for BTC, ETH or FLR
//! - GET  /health  - health check

mod handlers;
mod routes;
mod state;

use anyhow::{Context, Result};

use crate::config::AppConfig;
use crate::relay::RelayResolver;

pub use routes::{create_router, MAX_BODY_BYTES};
pub use state::RelayState;

/// Bind the configured address and serve until Ctrl-C.
pub async fn serve(config: &AppConfig) -> Result<()> {
    let resolver = RelayResolver::from_config(&config.relay, &config.oracle);
    let app = create_router(RelayState::new(resolver));

    let addr = config.relay.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind relay to {addr}"))?;
    log::info!("relay: listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            log::info!("relay: shutting down");
        })
        .await
        .context("Relay server failed")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
