//! HTTP 中间件
//! 应用状态与请求追踪

use crate::{
    auth::JwtService,
    config::AppConfig,
    error::AppError,
    repository::{
        InMemoryCredentialStore, InMemoryRefreshTokenStore, RefreshTokenRepository,
        UserRepository,
    },
    services::AuthService,
};
use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

/// 应用状态
///
/// 服务以 Arc 共享，Clone 只拷贝指针。
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    /// 内存存储模式下没有数据库
    pub db: Option<PgPool>,
    pub auth_service: Arc<AuthService>,
    pub jwt_service: Arc<JwtService>,
}

impl AppState {
    /// 使用 PostgreSQL 存储构建状态
    pub fn with_postgres(config: AppConfig, db: PgPool) -> Result<Self, AppError> {
        let jwt_service = Arc::new(JwtService::from_config(&config.jwt)?);
        let auth_service = Arc::new(AuthService::new(
            Arc::new(UserRepository::new(db.clone())),
            Arc::new(RefreshTokenRepository::new(db.clone())),
            jwt_service.clone(),
            &config.jwt,
            config.security.clone(),
        ));

        Ok(Self {
            config,
            db: Some(db),
            auth_service,
            jwt_service,
        })
    }

    /// 使用进程内存储构建状态（开发与测试）
    pub fn in_memory(config: AppConfig) -> Result<Self, AppError> {
        let jwt_service = Arc::new(JwtService::from_config(&config.jwt)?);
        let auth_service = Arc::new(AuthService::new(
            Arc::new(InMemoryCredentialStore::new()),
            Arc::new(InMemoryRefreshTokenStore::new()),
            jwt_service.clone(),
            &config.jwt,
            config.security.clone(),
        ));

        Ok(Self {
            config,
            db: None,
            auth_service,
            jwt_service,
        })
    }
}

/// 请求追踪中间件
/// 为每个请求生成 trace_id 和 request_id，并记录指标
pub async fn request_tracking_middleware(req: Request, next: Next) -> Response {
    let trace_id = extract_or_generate_trace_id(req.headers());
    let request_id = Uuid::new_v4().to_string();

    let method = req.method().to_string();
    let uri = req.uri().path().to_string();

    let span = tracing::info_span!(
        "http_request",
        trace_id = %trace_id,
        request_id = %request_id,
        method = %method,
        uri = %uri,
    );

    async move {
        let start = Instant::now();

        let mut response = next.run(req).await;

        let elapsed = start.elapsed();
        let status = response.status().as_u16();

        let method_name = match method.as_str() {
            "GET" => "GET",
            "POST" => "POST",
            "PUT" => "PUT",
            "DELETE" => "DELETE",
            "PATCH" => "PATCH",
            _ => "UNKNOWN",
        };
        let status_code = match status {
            200 => "200",
            201 => "201",
            204 => "204",
            400 => "400",
            401 => "401",
            404 => "404",
            409 => "409",
            500 => "500",
            _ => "other",
        };

        metrics::counter!("http_requests_total", "method" => method_name, "status" => status_code)
            .increment(1);
        metrics::histogram!("http_request_duration_seconds").record(elapsed.as_secs_f64());

        tracing::info!(
            method = %method,
            uri = %uri,
            status = status,
            elapsed_ms = elapsed.as_millis(),
            "Request completed"
        );

        if let Ok(value) = HeaderValue::from_str(&trace_id) {
            response.headers_mut().insert("x-trace-id", value);
        }
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert("x-request-id", value);
        }

        response
    }
    .instrument(span)
    .await
}

/// 从请求头中提取或生成 trace_id
fn extract_or_generate_trace_id(headers: &HeaderMap) -> String {
    headers
        .get("x-trace-id")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}
