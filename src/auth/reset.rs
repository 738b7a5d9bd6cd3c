/// Password-reset flow.
///
/// A pending reset is a `(sha256(code), expiry)` pair on the user row; the
/// plaintext code only ever travels through the email channel. Requesting
/// a new code overwrites the pending one; a successful confirmation clears
/// both fields, so each code is usable at most once.
use chrono::{Duration, Utc};
use rand::{thread_rng, Rng};
use sha2::{Digest, Sha256};

use crate::auth::hash_password;
use crate::email_client::EmailClient;
use crate::error::{AppError, AuthError};
use crate::store::UserStore;

pub const RESET_CODE_LENGTH: usize = 6;
pub const RESET_CODE_TTL_MINUTES: i64 = 15;

/// Generate a one-time numeric code, one CSPRNG draw per digit.
pub fn generate_reset_code() -> String {
    let mut rng = thread_rng();
    (0..RESET_CODE_LENGTH)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

/// One-way hash of a reset code. Only the hash is persisted.
pub fn hash_reset_code(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Start (or restart) a reset for the given email.
///
/// The outcome is identical whether or not the account exists, and whether
/// or not the email goes out: the code is committed before delivery is
/// attempted, and a delivery failure is logged and swallowed.
pub async fn request_password_reset(
    users: &dyn UserStore,
    email_client: &EmailClient,
    email: &str,
) -> Result<(), AppError> {
    let Some(user) = users.find_by_email(email).await? else {
        tracing::debug!("Password reset requested for unknown email");
        return Ok(());
    };

    let code = generate_reset_code();
    let expires_at = Utc::now() + Duration::minutes(RESET_CODE_TTL_MINUTES);
    users
        .set_reset_code(user.id, &hash_reset_code(&code), expires_at)
        .await?;

    if let Err(e) = email_client.send_reset_code(&user.email, &code).await {
        // The stored code stays valid; the user can retry the email.
        tracing::warn!(user_id = %user.id, error = %e, "Failed to deliver reset code");
    } else {
        tracing::info!(user_id = %user.id, "Reset code issued");
    }

    Ok(())
}

/// Complete a reset: check the pending code, swap the password, clear the
/// pending state. Failure reasons are deliberately collapsed.
pub async fn confirm_password_reset(
    users: &dyn UserStore,
    email: &str,
    code: &str,
    new_password: &str,
) -> Result<(), AppError> {
    let user = users
        .find_by_email(email)
        .await?
        .ok_or(AppError::Auth(AuthError::InvalidRequest))?;

    let (Some(stored_hash), Some(expires_at)) =
        (user.reset_token_hash.as_deref(), user.reset_token_expires_at)
    else {
        return Err(AppError::Auth(AuthError::InvalidOrExpired));
    };

    if Utc::now() > expires_at {
        return Err(AppError::Auth(AuthError::InvalidOrExpired));
    }

    if hash_reset_code(code) != stored_hash {
        return Err(AppError::Auth(AuthError::InvalidOrExpired));
    }

    let password_hash = hash_password(new_password)?;
    users.reset_password(user.id, &password_hash).await?;

    tracing::info!(user_id = %user.id, "Password reset completed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::verify_password;
    use crate::store::InMemoryUserStore;

    fn dead_email_client() -> EmailClient {
        // Nothing listens here; sends fail fast and must be swallowed.
        EmailClient::new(
            "http://127.0.0.1:9".to_string(),
            "no-reply@example.com".to_string(),
        )
    }

    async fn seeded_store(email: &str) -> InMemoryUserStore {
        let users = InMemoryUserStore::new();
        let hash = hash_password("OldPassw0rd").unwrap();
        users.insert(email, None, &hash).await.unwrap();
        users
    }

    #[test]
    fn reset_code_is_exactly_six_digits() {
        for _ in 0..100 {
            let code = generate_reset_code();
            assert_eq!(code.len(), RESET_CODE_LENGTH);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn code_hash_is_stable_and_not_the_code() {
        let code = generate_reset_code();
        let h1 = hash_reset_code(&code);
        let h2 = hash_reset_code(&code);
        assert_eq!(h1, h2);
        assert_ne!(h1, code);
        assert_eq!(h1.len(), 64); // sha256 hex
    }

    #[tokio::test]
    async fn unknown_email_succeeds_without_state_change() {
        let users = seeded_store("u@example.com").await;
        let client = dead_email_client();

        request_password_reset(&users, &client, "ghost@example.com")
            .await
            .unwrap();

        let user = users.find_by_email("u@example.com").await.unwrap().unwrap();
        assert!(user.reset_token_hash.is_none());
        assert!(user.reset_token_expires_at.is_none());
    }

    #[tokio::test]
    async fn request_sets_both_fields_despite_delivery_failure() {
        let users = seeded_store("u@example.com").await;
        let client = dead_email_client();

        request_password_reset(&users, &client, "u@example.com")
            .await
            .unwrap();

        let user = users.find_by_email("u@example.com").await.unwrap().unwrap();
        assert!(user.reset_token_hash.is_some());
        assert!(user.reset_token_expires_at.unwrap() > Utc::now());
    }

    #[tokio::test]
    async fn a_new_request_supersedes_the_pending_code() {
        let users = seeded_store("u@example.com").await;
        let user = users.find_by_email("u@example.com").await.unwrap().unwrap();

        users
            .set_reset_code(
                user.id,
                &hash_reset_code("111111"),
                Utc::now() + Duration::minutes(15),
            )
            .await
            .unwrap();
        users
            .set_reset_code(
                user.id,
                &hash_reset_code("222222"),
                Utc::now() + Duration::minutes(15),
            )
            .await
            .unwrap();

        let err = confirm_password_reset(&users, "u@example.com", "111111", "NewPassw0rd")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::InvalidOrExpired)));

        confirm_password_reset(&users, "u@example.com", "222222", "NewPassw0rd")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn confirm_is_single_use_and_changes_the_password() {
        let users = seeded_store("u@example.com").await;
        let user = users.find_by_email("u@example.com").await.unwrap().unwrap();
        users
            .set_reset_code(
                user.id,
                &hash_reset_code("123456"),
                Utc::now() + Duration::minutes(15),
            )
            .await
            .unwrap();

        confirm_password_reset(&users, "u@example.com", "123456", "NewPassw0rd")
            .await
            .unwrap();

        let user = users.find_by_email("u@example.com").await.unwrap().unwrap();
        assert!(verify_password("NewPassw0rd", &user.password_hash));
        assert!(!verify_password("OldPassw0rd", &user.password_hash));
        assert!(user.reset_token_hash.is_none());
        assert!(user.reset_token_expires_at.is_none());

        // Second use of the same code fails.
        let err = confirm_password_reset(&users, "u@example.com", "123456", "AnotherPassw0rd1")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::InvalidOrExpired)));
    }

    #[tokio::test]
    async fn expired_code_is_rejected_and_left_in_place() {
        let users = seeded_store("u@example.com").await;
        let user = users.find_by_email("u@example.com").await.unwrap().unwrap();
        users
            .set_reset_code(
                user.id,
                &hash_reset_code("123456"),
                Utc::now() - Duration::minutes(1),
            )
            .await
            .unwrap();

        let err = confirm_password_reset(&users, "u@example.com", "123456", "NewPassw0rd")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::InvalidOrExpired)));

        // A failed attempt leaves the pending state untouched.
        let user = users.find_by_email("u@example.com").await.unwrap().unwrap();
        assert!(user.reset_token_hash.is_some());
    }

    #[tokio::test]
    async fn wrong_code_and_unknown_user_fail_distinctly_but_coarsely() {
        let users = seeded_store("u@example.com").await;
        let user = users.find_by_email("u@example.com").await.unwrap().unwrap();
        users
            .set_reset_code(
                user.id,
                &hash_reset_code("123456"),
                Utc::now() + Duration::minutes(15),
            )
            .await
            .unwrap();

        let wrong = confirm_password_reset(&users, "u@example.com", "654321", "NewPassw0rd")
            .await
            .unwrap_err();
        assert!(matches!(wrong, AppError::Auth(AuthError::InvalidOrExpired)));

        let unknown = confirm_password_reset(&users, "ghost@example.com", "123456", "NewPassw0rd")
            .await
            .unwrap_err();
        assert!(matches!(unknown, AppError::Auth(AuthError::InvalidRequest)));
    }
}
