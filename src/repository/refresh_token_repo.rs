//! Refresh token repository (刷新令牌数据访问)
//!
//! 每个用户最多持有一个刷新令牌。保存新令牌会原子地覆盖旧令牌，
//! 旧令牌随即无法再被解析。令牌只以 SHA-256 哈希形式落库。

use crate::{auth::RefreshTokenGenerator, error::AppError, models::auth::RefreshTokenRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

/// 刷新令牌存储
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// 保存令牌，覆盖该用户已有的记录
    async fn save(&self, email: &str, token: &str) -> Result<RefreshTokenRecord, AppError>;

    /// 按令牌值精确查找
    async fn find_by_token(&self, token: &str) -> Result<Option<RefreshTokenRecord>, AppError>;

    /// 删除用户的令牌记录
    async fn delete(&self, email: &str) -> Result<bool, AppError>;

    /// 按令牌值删除记录
    async fn delete_token(&self, token: &str) -> Result<bool, AppError>;

    /// 清理签发时间早于 `issued_before` 的记录
    async fn purge_expired(&self, issued_before: DateTime<Utc>) -> Result<u64, AppError>;
}

pub struct RefreshTokenRepository {
    db: PgPool,
}

impl RefreshTokenRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RefreshTokenStore for RefreshTokenRepository {
    async fn save(&self, email: &str, token: &str) -> Result<RefreshTokenRecord, AppError> {
        let record = sqlx::query_as::<_, RefreshTokenRecord>(
            r#"
            INSERT INTO refresh_tokens (email, token_hash, issued_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (email) DO UPDATE
            SET token_hash = EXCLUDED.token_hash, issued_at = EXCLUDED.issued_at
            RETURNING email, token_hash, issued_at
            "#,
        )
        .bind(email)
        .bind(RefreshTokenGenerator::hash(token))
        .fetch_one(&self.db)
        .await?;

        Ok(record)
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<RefreshTokenRecord>, AppError> {
        let record = sqlx::query_as::<_, RefreshTokenRecord>(
            "SELECT email, token_hash, issued_at FROM refresh_tokens WHERE token_hash = $1",
        )
        .bind(RefreshTokenGenerator::hash(token))
        .fetch_optional(&self.db)
        .await?;

        Ok(record)
    }

    async fn delete(&self, email: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE email = $1")
            .bind(email)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_token(&self, token: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE token_hash = $1")
            .bind(RefreshTokenGenerator::hash(token))
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn purge_expired(&self, issued_before: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE issued_at < $1")
            .bind(issued_before)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected())
    }
}
