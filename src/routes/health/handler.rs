use axum::{extract::State, http::StatusCode, response::IntoResponse};

use crate::AppState;
use crate::utils::success_to_api_response;

use super::model::HealthStatus;

/// 存储不可达时服务仍然可用，只是降级为不缓存、不限流
pub async fn check(State(state): State<AppState>) -> impl IntoResponse {
    let store = match state.store.ping().await {
        Ok(()) => "up",
        Err(e) => {
            tracing::warn!(op = "ping", error = %e, "Store health check failed");
            "down"
        }
    };

    (
        StatusCode::OK,
        success_to_api_response(HealthStatus {
            status: "ok".to_string(),
            store: store.to_string(),
            rate_limiting: state.gate.is_enabled(),
        }),
    )
}
