use axum::{
    Router,
    routing::{get, post},
};

use crate::AppState;
use crate::middleware::{log_errors, rate_limit};

pub mod admin;
pub mod health;

// 创建主路由，所有路由都先经过准入中间件
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(health::check))
        .route("/admin/cache/invalidate", post(admin::invalidate_cache));

    Router::new()
        .nest(&state.config.api_base_uri, api)
        .layer(axum::middleware::from_fn(log_errors))
        .layer(axum::middleware::from_fn_with_state(
            state.gate.clone(),
            rate_limit,
        ))
        .with_state(state)
}
