/// Persistence seams for the auth subsystem.
///
/// The session and reset flows only ever see these two narrow contracts,
/// never a connection pool or an object graph. `postgres` is the production
/// backing; `memory` backs the test suite and local experimentation.
mod memory;
mod postgres;

pub use memory::{InMemoryRefreshTokenLedger, InMemoryUserStore};
pub use postgres::{PgRefreshTokenLedger, PgUserStore};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppError;

/// A user row. The reset fields are either both set or both null.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    pub username: Option<String>,
    pub password_hash: String,
    pub reset_token_hash: Option<String>,
    pub reset_token_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A refresh-token ledger row. Present exactly while the corresponding
/// refresh token is issued and not yet consumed; deleted on rotation,
/// logout, or mass revocation; never updated in place.
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_jti: Uuid,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, AppError>;

    /// Inserts a new user. Fails with `DuplicateEmail` if the email is
    /// already registered.
    async fn insert(
        &self,
        email: &str,
        username: Option<&str>,
        password_hash: &str,
    ) -> Result<UserRecord, AppError>;

    async fn update_username(&self, id: Uuid, username: &str) -> Result<UserRecord, AppError>;

    /// Stores a pending reset code hash and its expiry, overwriting any
    /// previous pending code.
    async fn set_reset_code(
        &self,
        id: Uuid,
        code_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError>;

    /// Sets a new password hash and clears both reset fields in one update.
    async fn reset_password(&self, id: Uuid, password_hash: &str) -> Result<(), AppError>;
}

#[async_trait]
pub trait RefreshTokenLedger: Send + Sync {
    /// Records a freshly issued refresh token. `jti` is globally unique by
    /// construction; a collision is an integrity error, not a business one.
    async fn issue(
        &self,
        user_id: Uuid,
        jti: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError>;

    async fn find(&self, jti: Uuid) -> Result<Option<LedgerEntry>, AppError>;

    /// Atomically deletes the entry for `jti` and returns it. This is the
    /// serialization point for rotation: of any number of concurrent calls
    /// with the same `jti`, exactly one observes the entry.
    async fn consume(&self, jti: Uuid) -> Result<Option<LedgerEntry>, AppError>;

    /// Deletes every entry for the user; returns how many were removed.
    async fn revoke_all(&self, user_id: Uuid) -> Result<u64, AppError>;
}
