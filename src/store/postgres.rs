/// Postgres-backed implementations of the store contracts.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AuthError, DatabaseError};
use crate::store::{LedgerEntry, RefreshTokenLedger, UserRecord, UserStore};

type UserRow = (
    Uuid,
    String,
    Option<String>,
    String,
    Option<String>,
    Option<DateTime<Utc>>,
    DateTime<Utc>,
    DateTime<Utc>,
);

fn user_from_row(row: UserRow) -> UserRecord {
    UserRecord {
        id: row.0,
        email: row.1,
        username: row.2,
        password_hash: row.3,
        reset_token_hash: row.4,
        reset_token_expires_at: row.5,
        created_at: row.6,
        updated_at: row.7,
    }
}

const USER_COLUMNS: &str = "id, email, username, password_hash, \
     reset_token_hash, reset_token_expires_at, created_at, updated_at";

#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(user_from_row))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(user_from_row))
    }

    async fn insert(
        &self,
        email: &str,
        username: Option<&str>,
        password_hash: &str,
    ) -> Result<UserRecord, AppError> {
        let now = Utc::now();
        let id = Uuid::new_v4();

        let result = sqlx::query(
            r#"
            INSERT INTO users (id, email, username, password_hash, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(id)
        .bind(email)
        .bind(username)
        .bind(password_hash)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(UserRecord {
                id,
                email: email.to_string(),
                username: username.map(str::to_string),
                password_hash: password_hash.to_string(),
                reset_token_hash: None,
                reset_token_expires_at: None,
                created_at: now,
                updated_at: now,
            }),
            Err(e) => {
                let msg = e.to_string();
                if msg.contains("duplicate key") || msg.contains("unique constraint") {
                    Err(AppError::Auth(AuthError::DuplicateEmail))
                } else {
                    Err(e.into())
                }
            }
        }
    }

    async fn update_username(&self, id: Uuid, username: &str) -> Result<UserRecord, AppError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users
            SET username = $1, updated_at = $2
            WHERE id = $3
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(username)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| {
            AppError::Database(DatabaseError::UnexpectedError(
                "user vanished during profile update".to_string(),
            ))
        })?;

        Ok(user_from_row(row))
    }

    async fn set_reset_code(
        &self,
        id: Uuid,
        code_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET reset_token_hash = $1, reset_token_expires_at = $2, updated_at = $3
            WHERE id = $4
            "#,
        )
        .bind(code_hash)
        .bind(expires_at)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Database(DatabaseError::UnexpectedError(
                "user vanished while storing reset code".to_string(),
            )));
        }

        Ok(())
    }

    async fn reset_password(&self, id: Uuid, password_hash: &str) -> Result<(), AppError> {
        // Password swap and reset-field clear happen in one statement so a
        // consumed code can never be observed alongside the old password.
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $1,
                reset_token_hash = NULL,
                reset_token_expires_at = NULL,
                updated_at = $2
            WHERE id = $3
            "#,
        )
        .bind(password_hash)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Database(DatabaseError::UnexpectedError(
                "user vanished during password reset".to_string(),
            )));
        }

        Ok(())
    }
}

#[derive(Clone)]
pub struct PgRefreshTokenLedger {
    pool: PgPool,
}

impl PgRefreshTokenLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

type LedgerRow = (Uuid, Uuid, Uuid, DateTime<Utc>, DateTime<Utc>);

fn entry_from_row(row: LedgerRow) -> LedgerEntry {
    LedgerEntry {
        id: row.0,
        user_id: row.1,
        token_jti: row.2,
        expires_at: row.3,
        created_at: row.4,
    }
}

#[async_trait]
impl RefreshTokenLedger for PgRefreshTokenLedger {
    async fn issue(
        &self,
        user_id: Uuid,
        jti: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (id, user_id, token_jti, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(jti)
        .bind(expires_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find(&self, jti: Uuid) -> Result<Option<LedgerEntry>, AppError> {
        let row = sqlx::query_as::<_, LedgerRow>(
            r#"
            SELECT id, user_id, token_jti, expires_at, created_at
            FROM refresh_tokens
            WHERE token_jti = $1
            "#,
        )
        .bind(jti)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(entry_from_row))
    }

    async fn consume(&self, jti: Uuid) -> Result<Option<LedgerEntry>, AppError> {
        // A single DELETE .. RETURNING: two concurrent calls with the same
        // jti cannot both get the row back.
        let row = sqlx::query_as::<_, LedgerRow>(
            r#"
            DELETE FROM refresh_tokens
            WHERE token_jti = $1
            RETURNING id, user_id, token_jti, expires_at, created_at
            "#,
        )
        .bind(jti)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(entry_from_row))
    }

    async fn revoke_all(&self, user_id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        tracing::info!(user_id = %user_id, revoked = result.rows_affected(), "Revoked all refresh tokens");
        Ok(result.rows_affected())
    }
}
