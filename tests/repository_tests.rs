//! PostgreSQL 仓库层测试
//!
//! 需要可用的数据库：`TEST_DATABASE_URL=... cargo test -- --ignored`

use airing_server::{
    error::AppError,
    models::user::{NewUser, DEFAULT_ROLE},
    repository::{CredentialStore, RefreshTokenRepository, RefreshTokenStore, UserRepository},
};
use chrono::{Duration, Utc};
use serial_test::serial;
use uuid::Uuid;

mod common;
use common::{create_test_config, setup_test_db};

fn new_user(email: &str) -> NewUser {
    NewUser {
        email: email.to_string(),
        username: "a".to_string(),
        password_hash: "$argon2id$placeholder".to_string(),
        role: DEFAULT_ROLE.to_string(),
    }
}

#[tokio::test]
#[serial]
#[ignore = "requires PostgreSQL"]
async fn test_user_repository_create_and_find() {
    let pool = setup_test_db(&create_test_config()).await;
    let repo = UserRepository::new(pool);

    let created = repo.create(new_user("a@x.com")).await.unwrap();
    assert_eq!(created.role, DEFAULT_ROLE);

    let found = repo.find_by_email("a@x.com").await.unwrap().unwrap();
    assert_eq!(found.id, created.id);

    let by_id = repo.find_by_id(created.id).await.unwrap().unwrap();
    assert_eq!(by_id.email, "a@x.com");

    assert!(repo.find_by_email("b@x.com").await.unwrap().is_none());
}

#[tokio::test]
#[serial]
#[ignore = "requires PostgreSQL"]
async fn test_user_repository_duplicate_email_conflicts() {
    let pool = setup_test_db(&create_test_config()).await;
    let repo = UserRepository::new(pool);

    repo.create(new_user("a@x.com")).await.unwrap();
    let err = repo.create(new_user("a@x.com")).await.unwrap_err();

    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
#[serial]
#[ignore = "requires PostgreSQL"]
async fn test_user_repository_update_password() {
    let pool = setup_test_db(&create_test_config()).await;
    let repo = UserRepository::new(pool);

    let user = repo.create(new_user("a@x.com")).await.unwrap();

    assert!(repo.update_password(user.id, "new-hash").await.unwrap());
    assert!(!repo.update_password(Uuid::new_v4(), "x").await.unwrap());

    let found = repo.find_by_email("a@x.com").await.unwrap().unwrap();
    assert_eq!(found.password_hash, "new-hash");
    assert!(found.updated_at >= user.updated_at);
}

#[tokio::test]
#[serial]
#[ignore = "requires PostgreSQL"]
async fn test_refresh_token_save_replaces_previous() {
    let pool = setup_test_db(&create_test_config()).await;
    UserRepository::new(pool.clone())
        .create(new_user("a@x.com"))
        .await
        .unwrap();
    let repo = RefreshTokenRepository::new(pool);

    repo.save("a@x.com", "first").await.unwrap();
    let record = repo.save("a@x.com", "second").await.unwrap();

    assert_ne!(record.token_hash, "second");
    assert!(repo.find_by_token("first").await.unwrap().is_none());
    assert_eq!(
        repo.find_by_token("second").await.unwrap().unwrap().email,
        "a@x.com"
    );
}

#[tokio::test]
#[serial]
#[ignore = "requires PostgreSQL"]
async fn test_refresh_token_delete_paths() {
    let pool = setup_test_db(&create_test_config()).await;
    let users = UserRepository::new(pool.clone());
    users.create(new_user("a@x.com")).await.unwrap();
    users.create(new_user("b@x.com")).await.unwrap();
    let repo = RefreshTokenRepository::new(pool);

    repo.save("a@x.com", "t1").await.unwrap();
    repo.save("b@x.com", "t2").await.unwrap();

    assert!(repo.delete("a@x.com").await.unwrap());
    assert!(!repo.delete("a@x.com").await.unwrap());

    assert!(repo.delete_token("t2").await.unwrap());
    assert!(!repo.delete_token("t2").await.unwrap());
}

#[tokio::test]
#[serial]
#[ignore = "requires PostgreSQL"]
async fn test_refresh_token_purge_and_cascade() {
    let pool = setup_test_db(&create_test_config()).await;
    let users = UserRepository::new(pool.clone());
    let user = users.create(new_user("a@x.com")).await.unwrap();
    let repo = RefreshTokenRepository::new(pool);

    repo.save("a@x.com", "t1").await.unwrap();

    // 截止时间早于签发时间，不应清理
    assert_eq!(repo.purge_expired(Utc::now() - Duration::hours(1)).await.unwrap(), 0);
    assert_eq!(repo.purge_expired(Utc::now() + Duration::seconds(5)).await.unwrap(), 1);

    repo.save("a@x.com", "t2").await.unwrap();
    assert!(users.delete(user.id).await.unwrap());
    assert!(repo.find_by_token("t2").await.unwrap().is_none());
}
