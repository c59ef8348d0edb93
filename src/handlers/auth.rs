//! 认证相关的 HTTP 处理器

use crate::{
    auth::middleware::{authorization_header, AuthContext},
    error::AppError,
    middleware::AppState,
    models::auth::*,
};
use axum::{extract::State, http::HeaderMap, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;

/// 注册
pub async fn signup(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.auth_service.signup(req).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Signup completed",
            "email": user.email,
            "username": user.username,
        })),
    ))
}

/// 登录
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let response = state.auth_service.login(req).await?;

    Ok(Json(response))
}

/// 换发令牌
pub async fn reissue(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TokenReissueRequest>,
) -> Result<impl IntoResponse, AppError> {
    let response = state.auth_service.reissue(req).await?;

    Ok(Json(response))
}

/// 登出；Authorization 头携带刷新令牌
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    state
        .auth_service
        .logout(authorization_header(&headers))
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// 重置密码；Authorization 头携带访问令牌
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .auth_service
        .reset_password(authorization_header(&headers), req)
        .await?;

    Ok(Json(json!({"message": "Password changed successfully"})))
}

/// 获取当前用户信息
pub async fn get_current_user(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
) -> Result<impl IntoResponse, AppError> {
    let user = state.auth_service.current_identity(&auth_context.email).await?;

    Ok(Json(json!({
        "email": user.email,
        "username": user.username,
        "role": auth_context.role,
    })))
}
