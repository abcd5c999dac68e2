use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::AppState;
use crate::cache::keys::Key;
use crate::error::AppError;
use crate::utils::success_to_api_response;

use super::model::{InvalidateRequest, InvalidateResponse};

/// 按前缀失效缓存；空前缀会清空整个命名空间，这里拒绝
pub async fn invalidate_cache(
    State(state): State<AppState>,
    Json(req): Json<InvalidateRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.prefix.trim().is_empty() {
        return Err(AppError::BadRequest("prefix must not be empty".to_string()));
    }

    let deleted = state
        .gate
        .cache()
        .invalidate(&Key::raw(req.prefix.clone()))
        .await;
    tracing::info!(prefix = %req.prefix, deleted, "Cache invalidated by admin request");

    Ok((
        StatusCode::OK,
        success_to_api_response(InvalidateResponse {
            prefix: req.prefix,
            deleted,
        }),
    ))
}
