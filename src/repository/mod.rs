//! Database repository layer
//!
//! Each store is a trait so the auth service can run against PostgreSQL or
//! the in-process implementations in [`memory`].

pub mod memory;
pub mod refresh_token_repo;
pub mod user_repo;

pub use memory::{InMemoryCredentialStore, InMemoryRefreshTokenStore};
pub use refresh_token_repo::{RefreshTokenRepository, RefreshTokenStore};
pub use user_repo::{CredentialStore, UserRepository};
