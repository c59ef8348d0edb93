//! JWT 认证中间件与 Bearer 头解析

use crate::{auth::jwt::JwtService, error::AppError};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

const BEARER_PREFIX: &str = "Bearer ";

/// 认证上下文（附加到请求扩展）
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub email: String,
    pub role: String,
}

// 实现 FromRequestParts 以便在 handler 中直接提取 AuthContext
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}

/// 从 Authorization 头的原始值中剥离 `Bearer ` 前缀
///
/// 前缀之后的内容原样返回，不做裁剪。缺失、前缀不符或令牌为空时返回
/// `missing_message` 作为 BadRequest。
pub fn bearer_token<'a>(header: Option<&'a str>, missing_message: &str) -> Result<&'a str, AppError> {
    header
        .and_then(|value| value.strip_prefix(BEARER_PREFIX))
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::bad_request(missing_message))
}

/// 读取 Authorization 头的原始值
pub fn authorization_header(headers: &HeaderMap) -> Option<&str> {
    headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok())
}

/// JWT 认证中间件 - 必须认证
pub async fn jwt_auth_middleware(
    State(jwt_service): State<Arc<JwtService>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(authorization_header(req.headers()), "Access token is required")
        .map_err(|_| AppError::Unauthorized)?;

    let claims = jwt_service.decode_claims(token)?;

    req.extensions_mut().insert(AuthContext {
        email: claims.sub,
        role: claims.role,
    });

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token_valid() {
        let token = bearer_token(Some("Bearer test_token_123"), "required").unwrap();
        assert_eq!(token, "test_token_123");
    }

    #[test]
    fn test_bearer_token_missing() {
        let err = bearer_token(None, "Refresh token is required").unwrap_err();
        assert!(matches!(err, AppError::BadRequest(ref msg) if msg == "Refresh token is required"));
    }

    #[test]
    fn test_bearer_token_invalid_format() {
        assert!(bearer_token(Some("InvalidFormat"), "required").is_err());
        assert!(bearer_token(Some("Basic dXNlcjpwYXNz"), "required").is_err());
        assert!(bearer_token(Some("Bearer "), "required").is_err());
    }

    #[test]
    fn test_bearer_token_keeps_surrounding_whitespace() {
        let token = bearer_token(Some("Bearer  tok "), "required").unwrap();
        assert_eq!(token, " tok ");
    }

    #[test]
    fn test_authorization_header_lookup() {
        let mut headers = HeaderMap::new();
        assert!(authorization_header(&headers).is_none());

        headers.insert(AUTHORIZATION, "Bearer abc".parse().unwrap());
        assert_eq!(authorization_header(&headers), Some("Bearer abc"));
    }
}
