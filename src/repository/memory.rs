//! In-process store implementations
//!
//! Used by the test suites and by `--in-memory` development runs. State lives
//! only as long as the process.

use crate::{
    auth::RefreshTokenGenerator,
    error::AppError,
    models::{auth::RefreshTokenRecord, user::*},
    repository::{CredentialStore, RefreshTokenStore},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Users keyed by email
#[derive(Default)]
pub struct InMemoryCredentialStore {
    users: DashMap<String, User>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop an account, e.g. to model a deleted user
    pub fn remove(&self, email: &str) -> Option<User> {
        self.users.remove(email).map(|(_, user)| user)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self.users.get(email).map(|entry| entry.value().clone()))
    }

    async fn create(&self, user: NewUser) -> Result<User, AppError> {
        match self.users.entry(user.email.clone()) {
            Entry::Occupied(_) => Err(AppError::conflict("Email is already registered")),
            Entry::Vacant(slot) => {
                let user = user.into_user();
                slot.insert(user.clone());
                Ok(user)
            }
        }
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<bool, AppError> {
        match self.users.iter_mut().find(|entry| entry.id == id) {
            Some(mut entry) => {
                entry.password_hash = password_hash.to_string();
                entry.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[derive(Default)]
struct RefreshTokenTable {
    by_email: HashMap<String, RefreshTokenRecord>,
    /// token hash -> owner email
    by_hash: HashMap<String, String>,
}

impl RefreshTokenTable {
    fn remove_email(&mut self, email: &str) -> Option<RefreshTokenRecord> {
        let record = self.by_email.remove(email)?;
        self.by_hash.remove(&record.token_hash);
        Some(record)
    }
}

/// Refresh tokens with a secondary index on the token hash
///
/// Both maps sit behind one lock so a replace is never observed half-applied.
#[derive(Default)]
pub struct InMemoryRefreshTokenStore {
    table: RwLock<RefreshTokenTable>,
}

impl InMemoryRefreshTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live records
    pub async fn len(&self) -> usize {
        self.table.read().await.by_email.len()
    }

    /// Record currently held for `email`
    pub async fn find_by_email(&self, email: &str) -> Option<RefreshTokenRecord> {
        self.table.read().await.by_email.get(email).cloned()
    }

    /// Insert a record with an explicit issue time
    pub async fn save_issued_at(
        &self,
        email: &str,
        token: &str,
        issued_at: DateTime<Utc>,
    ) -> RefreshTokenRecord {
        let record = RefreshTokenRecord {
            email: email.to_string(),
            token_hash: RefreshTokenGenerator::hash(token),
            issued_at,
        };

        let mut table = self.table.write().await;
        table.remove_email(email);
        table
            .by_hash
            .insert(record.token_hash.clone(), email.to_string());
        table.by_email.insert(email.to_string(), record.clone());

        record
    }
}

#[async_trait]
impl RefreshTokenStore for InMemoryRefreshTokenStore {
    async fn save(&self, email: &str, token: &str) -> Result<RefreshTokenRecord, AppError> {
        Ok(self.save_issued_at(email, token, Utc::now()).await)
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<RefreshTokenRecord>, AppError> {
        let token_hash = RefreshTokenGenerator::hash(token);
        let table = self.table.read().await;

        Ok(table
            .by_hash
            .get(&token_hash)
            .and_then(|email| table.by_email.get(email))
            .cloned())
    }

    async fn delete(&self, email: &str) -> Result<bool, AppError> {
        Ok(self.table.write().await.remove_email(email).is_some())
    }

    async fn delete_token(&self, token: &str) -> Result<bool, AppError> {
        let token_hash = RefreshTokenGenerator::hash(token);
        let mut table = self.table.write().await;

        match table.by_hash.get(&token_hash).cloned() {
            Some(email) => Ok(table.remove_email(&email).is_some()),
            None => Ok(false),
        }
    }

    async fn purge_expired(&self, issued_before: DateTime<Utc>) -> Result<u64, AppError> {
        let mut table = self.table.write().await;

        let stale: Vec<String> = table
            .by_email
            .values()
            .filter(|record| record.issued_at < issued_before)
            .map(|record| record.email.clone())
            .collect();

        for email in &stale {
            table.remove_email(email);
        }

        Ok(stale.len() as u64)
    }
}
