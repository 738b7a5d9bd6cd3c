/// In-memory store implementations.
///
/// These back the integration tests (no Postgres needed) and are handy for
/// poking at the API locally. A `std::sync::Mutex` is enough: no lock is
/// held across an await point.
use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{AppError, AuthError, DatabaseError};
use crate::store::{LedgerEntry, RefreshTokenLedger, UserRecord, UserStore};

#[derive(Default)]
pub struct InMemoryUserStore {
    users: Mutex<HashMap<Uuid, UserRecord>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, AppError> {
        let users = self.users.lock().unwrap();
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, AppError> {
        let users = self.users.lock().unwrap();
        Ok(users.get(&id).cloned())
    }

    async fn insert(
        &self,
        email: &str,
        username: Option<&str>,
        password_hash: &str,
    ) -> Result<UserRecord, AppError> {
        let mut users = self.users.lock().unwrap();
        if users.values().any(|u| u.email == email) {
            return Err(AppError::Auth(AuthError::DuplicateEmail));
        }

        let now = Utc::now();
        let user = UserRecord {
            id: Uuid::new_v4(),
            email: email.to_string(),
            username: username.map(str::to_string),
            password_hash: password_hash.to_string(),
            reset_token_hash: None,
            reset_token_expires_at: None,
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_username(&self, id: Uuid, username: &str) -> Result<UserRecord, AppError> {
        let mut users = self.users.lock().unwrap();
        let user = users.get_mut(&id).ok_or_else(|| {
            AppError::Database(DatabaseError::UnexpectedError(
                "user vanished during profile update".to_string(),
            ))
        })?;
        user.username = Some(username.to_string());
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn set_reset_code(
        &self,
        id: Uuid,
        code_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let mut users = self.users.lock().unwrap();
        let user = users.get_mut(&id).ok_or_else(|| {
            AppError::Database(DatabaseError::UnexpectedError(
                "user vanished while storing reset code".to_string(),
            ))
        })?;
        user.reset_token_hash = Some(code_hash.to_string());
        user.reset_token_expires_at = Some(expires_at);
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn reset_password(&self, id: Uuid, password_hash: &str) -> Result<(), AppError> {
        let mut users = self.users.lock().unwrap();
        let user = users.get_mut(&id).ok_or_else(|| {
            AppError::Database(DatabaseError::UnexpectedError(
                "user vanished during password reset".to_string(),
            ))
        })?;
        user.password_hash = password_hash.to_string();
        user.reset_token_hash = None;
        user.reset_token_expires_at = None;
        user.updated_at = Utc::now();
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryRefreshTokenLedger {
    entries: Mutex<HashMap<Uuid, LedgerEntry>>,
}

impl InMemoryRefreshTokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries for a user. Test-facing.
    pub fn entries_for_user(&self, user_id: Uuid) -> usize {
        let entries = self.entries.lock().unwrap();
        entries.values().filter(|e| e.user_id == user_id).count()
    }
}

#[async_trait]
impl RefreshTokenLedger for InMemoryRefreshTokenLedger {
    async fn issue(
        &self,
        user_id: Uuid,
        jti: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let mut entries = self.entries.lock().unwrap();
        if entries.contains_key(&jti) {
            return Err(AppError::Database(DatabaseError::IntegrityViolation(
                format!("duplicate jti {}", jti),
            )));
        }
        entries.insert(
            jti,
            LedgerEntry {
                id: Uuid::new_v4(),
                user_id,
                token_jti: jti,
                expires_at,
                created_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn find(&self, jti: Uuid) -> Result<Option<LedgerEntry>, AppError> {
        let entries = self.entries.lock().unwrap();
        Ok(entries.get(&jti).cloned())
    }

    async fn consume(&self, jti: Uuid) -> Result<Option<LedgerEntry>, AppError> {
        let mut entries = self.entries.lock().unwrap();
        Ok(entries.remove(&jti))
    }

    async fn revoke_all(&self, user_id: Uuid) -> Result<u64, AppError> {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|_, e| e.user_id != user_id);
        Ok((before - entries.len()) as u64)
    }
}
