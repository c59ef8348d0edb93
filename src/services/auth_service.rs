//! 认证服务：注册、登录、令牌轮换、登出、重置密码

use crate::{
    auth::{bearer_token, JwtService, PasswordHasher, RefreshTokenGenerator},
    config::{JwtConfig, SecurityConfig},
    error::AppError,
    models::{auth::*, user::*},
    repository::{CredentialStore, RefreshTokenStore},
};
use chrono::Utc;
use once_cell::sync::OnceCell;
use std::sync::Arc;
use validator::Validate;

const INVALID_CREDENTIALS: &str = "Invalid email or password";
const INVALID_REFRESH_TOKEN: &str = "Invalid refresh token";
/// 未知邮箱登录时用于校验的占位密码
const DUMMY_PASSWORD: &str = "airing-dummy-password";

pub struct AuthService {
    users: Arc<dyn CredentialStore>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    jwt_service: Arc<JwtService>,
    hasher: PasswordHasher,
    /// 与 `hasher` 参数一致的占位哈希，首次使用时计算
    dummy_hash: OnceCell<String>,
    security: SecurityConfig,
    refresh_token_exp_secs: u64,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn CredentialStore>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        jwt_service: Arc<JwtService>,
        jwt_config: &JwtConfig,
        security: SecurityConfig,
    ) -> Self {
        Self {
            users,
            refresh_tokens,
            jwt_service,
            hasher: PasswordHasher::new(),
            dummy_hash: OnceCell::new(),
            security,
            refresh_token_exp_secs: jwt_config.refresh_token_exp_secs,
        }
    }

    /// 替换密码哈希器（测试中使用低成本参数）
    pub fn with_password_hasher(mut self, hasher: PasswordHasher) -> Self {
        self.hasher = hasher;
        self.dummy_hash = OnceCell::new();
        self
    }

    /// 用户注册
    pub async fn signup(&self, req: SignupRequest) -> Result<UserResponse, AppError> {
        req.validate()?;
        PasswordHasher::validate_password_policy(&req.password, &self.security)?;

        if self.users.find_by_email(&req.email).await?.is_some() {
            return Err(AppError::conflict("Email is already registered"));
        }

        let username = req
            .username
            .clone()
            .unwrap_or_else(|| default_username(&req.email));

        let user = self
            .users
            .create(NewUser {
                email: req.email,
                username,
                password_hash: self.hasher.hash(&req.password)?,
                role: DEFAULT_ROLE.to_string(),
            })
            .await?;

        tracing::info!(email = %user.email, "User signed up");

        Ok(UserResponse::from(user))
    }

    /// 用户登录
    ///
    /// 用户不存在与密码错误返回同一条消息，并且同样执行一次 Argon2 校验，
    /// 响应时间不暴露邮箱是否已注册。
    pub async fn login(&self, req: LoginRequest) -> Result<LoginResponse, AppError> {
        let user = match self.users.find_by_email(&req.email).await? {
            Some(user) => user,
            None => {
                let dummy = self
                    .dummy_hash
                    .get_or_try_init(|| self.hasher.hash(DUMMY_PASSWORD))?;
                let _ = self.hasher.matches(&req.password, dummy);

                tracing::warn!(email = %req.email, reason = "unknown_email", "Login failed");
                metrics::counter!("auth_login_total", "outcome" => "failure").increment(1);
                return Err(AppError::authentication(INVALID_CREDENTIALS));
            }
        };

        if !self.hasher.matches(&req.password, &user.password_hash) {
            tracing::warn!(email = %req.email, reason = "bad_password", "Login failed");
            metrics::counter!("auth_login_total", "outcome" => "failure").increment(1);
            return Err(AppError::authentication(INVALID_CREDENTIALS));
        }

        // 覆盖该用户已有的刷新令牌：同一时间只保留一个会话
        let response = self.issue_session(&user).await?;

        tracing::info!(email = %user.email, "User logged in");
        metrics::counter!("auth_login_total", "outcome" => "success").increment(1);

        Ok(response)
    }

    /// 使用刷新令牌换发新的令牌对
    ///
    /// 刷新令牌只能使用一次：按令牌值删除旧记录成功后才写入新令牌，
    /// 并发请求中只有删除成功的一方能拿到新令牌。
    pub async fn reissue(&self, req: TokenReissueRequest) -> Result<LoginResponse, AppError> {
        let stored = match self.refresh_tokens.find_by_token(&req.refresh_token).await? {
            Some(record) => record,
            None => {
                tracing::warn!(reason = "unknown_token", "Token reissue rejected");
                metrics::counter!("auth_reissue_total", "outcome" => "failure").increment(1);
                return Err(AppError::authentication(INVALID_REFRESH_TOKEN));
            }
        };

        if stored.is_expired_at(self.refresh_token_exp_secs, Utc::now()) {
            self.refresh_tokens.delete_token(&req.refresh_token).await?;
            tracing::warn!(email = %stored.email, reason = "expired", "Token reissue rejected");
            metrics::counter!("auth_reissue_total", "outcome" => "failure").increment(1);
            return Err(AppError::authentication("Refresh token has expired"));
        }

        let user = match self.users.find_by_email(&stored.email).await? {
            Some(user) => user,
            None => {
                self.refresh_tokens.delete_token(&req.refresh_token).await?;
                tracing::warn!(email = %stored.email, reason = "unknown_user", "Token reissue rejected");
                metrics::counter!("auth_reissue_total", "outcome" => "failure").increment(1);
                return Err(AppError::authentication(INVALID_REFRESH_TOKEN));
            }
        };

        if !self.refresh_tokens.delete_token(&req.refresh_token).await? {
            tracing::warn!(email = %user.email, reason = "already_consumed", "Token reissue rejected");
            metrics::counter!("auth_reissue_total", "outcome" => "failure").increment(1);
            return Err(AppError::authentication(INVALID_REFRESH_TOKEN));
        }

        let response = self.issue_session(&user).await?;

        tracing::info!(email = %user.email, "Tokens reissued");
        metrics::counter!("auth_reissue_total", "outcome" => "success").increment(1);

        Ok(response)
    }

    /// 登出（删除刷新令牌）
    ///
    /// `authorization` 为 `Bearer <refresh_token>`；令牌未知时同样视为成功。
    pub async fn logout(&self, authorization: Option<&str>) -> Result<(), AppError> {
        let refresh_token = bearer_token(authorization, "Refresh token is required")?;

        if self.refresh_tokens.delete_token(refresh_token).await? {
            tracing::info!("User logged out");
        } else {
            tracing::debug!("Logout with unknown refresh token ignored");
        }

        Ok(())
    }

    /// 重置密码
    ///
    /// `authorization` 为 `Bearer <access_token>`。成功后撤销该用户的刷新令牌；
    /// 已签发的访问令牌在过期前仍然有效。
    pub async fn reset_password(
        &self,
        authorization: Option<&str>,
        req: ResetPasswordRequest,
    ) -> Result<(), AppError> {
        let access_token = bearer_token(authorization, "Access token is required")?;
        let email = self.jwt_service.subject_of(access_token)?;

        req.validate()?;

        let user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or_else(|| AppError::not_found("user"))?;

        if !self.hasher.matches(&req.current_password, &user.password_hash) {
            tracing::warn!(email = %email, "Password reset rejected: current password mismatch");
            return Err(AppError::authentication("Current password does not match"));
        }

        if self.hasher.matches(&req.new_password, &user.password_hash) {
            return Err(AppError::bad_request(
                "New password must differ from the current password",
            ));
        }

        PasswordHasher::validate_password_policy(&req.new_password, &self.security)?;

        let new_hash = self.hasher.hash(&req.new_password)?;
        if !self.users.update_password(user.id, &new_hash).await? {
            return Err(AppError::not_found("user"));
        }

        self.refresh_tokens.delete(&user.email).await?;

        tracing::info!(email = %email, "Password reset");

        Ok(())
    }

    /// 获取当前用户信息
    pub async fn current_identity(&self, email: &str) -> Result<UserResponse, AppError> {
        self.users
            .find_by_email(email)
            .await?
            .map(UserResponse::from)
            .ok_or_else(|| AppError::not_found("user"))
    }

    /// 清理过期的刷新令牌
    pub async fn purge_expired_refresh_tokens(&self) -> Result<u64, AppError> {
        let cutoff = Utc::now() - chrono::Duration::seconds(self.refresh_token_exp_secs as i64);
        let purged = self.refresh_tokens.purge_expired(cutoff).await?;

        if purged > 0 {
            tracing::info!(purged, "Expired refresh tokens purged");
        }

        Ok(purged)
    }

    /// 签发访问令牌并持久化新的刷新令牌
    async fn issue_session(&self, user: &User) -> Result<LoginResponse, AppError> {
        let access_token = self.jwt_service.create_access_token(&user.email, &user.role)?;
        let refresh_token = RefreshTokenGenerator::generate();

        self.refresh_tokens.save(&user.email, &refresh_token).await?;

        Ok(LoginResponse {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt_service.access_token_exp_secs(),
            username: user.username.clone(),
            email: user.email.clone(),
        })
    }
}

/// 邮箱 @ 之前的部分
fn default_username(email: &str) -> String {
    email.split('@').next().unwrap_or(email).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{
        config::JwtConfig,
        repository::{InMemoryCredentialStore, InMemoryRefreshTokenStore},
    };
    use secrecy::Secret;

    const TEST_KEY: &str =
        "YWlyaW5nLXRlc3Qtc2lnbmluZy1rZXktMDEyMzQ1Njc4OTAxMjM0NTY3ODkwMTIzNDU2Nzg5MDEyMzQ1Njc4OQ==";

    fn test_service() -> AuthService {
        let jwt_config = JwtConfig {
            secret_key: Secret::new(TEST_KEY.to_string()),
            access_token_exp_secs: 900,
            refresh_token_exp_secs: 3600,
        };
        let jwt_service = Arc::new(JwtService::from_config(&jwt_config).unwrap());

        AuthService::new(
            Arc::new(InMemoryCredentialStore::new()),
            Arc::new(InMemoryRefreshTokenStore::new()),
            jwt_service,
            &jwt_config,
            SecurityConfig {
                password_min_length: 1,
            },
        )
        .with_password_hasher(PasswordHasher::with_params(1024, 1, 1))
    }

    #[tokio::test]
    async fn test_unknown_email_login_still_verifies_a_hash() {
        let service = test_service();
        assert!(service.dummy_hash.get().is_none());

        let err = service
            .login(LoginRequest {
                email: "nobody@x.com".to_string(),
                password: "pw1".to_string(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Authentication(ref msg) if msg == INVALID_CREDENTIALS));
        let dummy = service.dummy_hash.get().unwrap();
        assert!(dummy.starts_with("$argon2id$"));
        assert!(service.hasher.matches(DUMMY_PASSWORD, dummy));
    }

    #[test]
    fn test_default_username() {
        assert_eq!(default_username("a@x.com"), "a");
        assert_eq!(default_username("first.last@example.org"), "first.last");
        assert_eq!(default_username("no-at-sign"), "no-at-sign");
    }
}
