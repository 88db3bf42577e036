//! Probe endpoints.
//!
//! `/healthz` answers as long as the process serves HTTP. `/readyz` stays
//! 503 until the template store and the VM index hold a full list.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use tracing::{debug, info};

/// Readiness of the admission caches
#[derive(Debug, Default)]
pub struct HealthState {
    synced: AtomicBool,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_ready(&self, ready: bool) {
        debug!(ready, "Updating readiness");
        self.synced.store(ready, Ordering::Release);
    }

    pub fn is_ready(&self) -> bool {
        self.synced.load(Ordering::Acquire)
    }
}

async fn healthz() -> &'static str {
    "ok"
}

/// 200 once the caches have synced, 503 before and during shutdown.
pub async fn readyz(State(state): State<Arc<HealthState>>) -> (StatusCode, &'static str) {
    if state.is_ready() {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "caches not synced")
    }
}

pub fn create_router(state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .with_state(state)
}

/// Serve the probes on `addr` until the listener fails.
pub async fn run_health_server(
    state: Arc<HealthState>,
    addr: SocketAddr,
) -> Result<(), std::io::Error> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Health server listening");
    axum::serve(listener, create_router(state)).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_not_ready() {
        let state = HealthState::new();
        assert!(!state.is_ready());
        state.set_ready(true);
        assert!(state.is_ready());
        state.set_ready(false);
        assert!(!state.is_ready());
    }

    #[tokio::test]
    async fn test_readyz_follows_sync() {
        let state = Arc::new(HealthState::new());
        assert_eq!(
            readyz(State(state.clone())).await,
            (StatusCode::SERVICE_UNAVAILABLE, "caches not synced")
        );

        state.set_ready(true);
        assert_eq!(readyz(State(state)).await.0, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_healthz() {
        assert_eq!(healthz().await, "ok");
    }
}
