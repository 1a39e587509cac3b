use axum::{extract::State, http::StatusCode};
use tracing::{instrument, warn};

use crate::schemas::AppState;

/// Plain-text liveness check including a database ping.
#[instrument(skip_all)]
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, String) {
    let version = env!("CARGO_PKG_VERSION");
    match state.db.ping().await {
        Ok(()) => (
            StatusCode::OK,
            format!("status: healthy\nversion: {version}\ndatabase: connected\n"),
        ),
        Err(e) => {
            warn!("Health check database ping failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                format!("status: unhealthy\nversion: {version}\ndatabase: disconnected\n"),
            )
        }
    }
}
