use axum::{
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::cache::models::AdmissionDecision;
use crate::utils::{error_codes, error_to_api_response};

/// 存储层错误，限流与缓存都会吞掉它们并记录日志
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store operation `{op}` timed out")]
    Timeout { op: &'static str },

    #[error("store command failed: {0}")]
    Command(#[from] redis::RedisError),
}

/// 配置错误，只在启动阶段出现
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(String),

    #[error("invalid value {value:?} for {name}")]
    Invalid { name: String, value: String },

    #[error("{field} must be positive")]
    NonPositive { field: &'static str },
}

/// 经过 Gate 的调用可能出现的错误
#[derive(Debug, Error)]
pub enum GateError<E> {
    #[error("rate limit exceeded, window resets at {}", .0.reset_at)]
    RateLimited(AdmissionDecision),

    #[error("{0}")]
    Compute(E),
}

impl<E> GateError<E> {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, GateError::RateLimited(_))
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("rate limited")]
    RateLimited { retry_after: i64 },

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal server error")]
    InternalServerError,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::RateLimited { retry_after } => {
                let body = error_to_api_response::<()>(
                    error_codes::RATE_LIMIT,
                    format!("请求过于频繁，请在{}秒后重试", retry_after),
                );
                let mut response = (StatusCode::TOO_MANY_REQUESTS, body).into_response();
                response
                    .headers_mut()
                    .insert(RETRY_AFTER, HeaderValue::from(retry_after.max(0)));
                response
            }
            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                error_to_api_response::<()>(error_codes::VALIDATION_ERROR, msg),
            )
                .into_response(),
            AppError::InternalServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response::<()>(
                    error_codes::INTERNAL_ERROR,
                    "内部服务器错误".to_string(),
                ),
            )
                .into_response(),
        }
    }
}
