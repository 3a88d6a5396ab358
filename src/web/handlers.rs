//! Web 路由处理函数
//!
//! 实现触发端点和存活端点

use super::{ErrorResponse, HealthResponse, KeepAliveResponse, NoTargetsResponse, WebAppState};
use crate::auth::authorize;
use crate::error::{RunError, StoreError};
use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use std::any::Any;
use tracing::{error, info, warn};

/// 触发一次探测运行
///
/// 认证失败时不会访问注册表。
pub async fn keep_alive(State(state): State<WebAppState>, headers: HeaderMap) -> Response {
    let supplied = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    if !authorize(supplied, state.cron_secret.as_deref()) {
        warn!("拒绝未授权的触发请求");
        return run_error_response(RunError::Unauthorized);
    }

    match state.orchestrator.run_cycle().await {
        Ok(summary) if summary.is_empty() => {
            Json(NoTargetsResponse::new(summary.timestamp)).into_response()
        }
        Ok(summary) => {
            info!("运行 {} 完成", summary.run_id);
            Json(KeepAliveResponse::from(summary)).into_response()
        }
        Err(e) => run_error_response(e),
    }
}

/// 将运行级错误映射为 HTTP 响应
pub fn run_error_response(error: RunError) -> Response {
    let (status, body) = match error {
        RunError::Unauthorized => (StatusCode::UNAUTHORIZED, ErrorResponse::new("Unauthorized")),
        RunError::StoreUnavailable(StoreError::NotConfigured) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorResponse::new("Missing control database configuration"),
        ),
        RunError::StoreUnavailable(store_error) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorResponse::new("Failed to fetch projects").with_details(store_error.to_string()),
        ),
    };

    (status, Json(body)).into_response()
}

/// 处理函数内部 panic 时的响应
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let details = if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else {
        "Unknown error".to_string()
    };

    error!("Keep-alive error: {}", details);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new("Keep-alive failed").with_details(details)),
    )
        .into_response()
}

/// 进程存活端点
pub async fn health(State(state): State<WebAppState>) -> impl IntoResponse {
    let uptime = chrono::Utc::now()
        .signed_duration_since(state.start_time)
        .num_seconds()
        .max(0) as u64;

    Json(HealthResponse {
        status: "ok",
        version: crate::VERSION,
        uptime_seconds: uptime,
    })
}
