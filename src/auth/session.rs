/// Session orchestration: login, refresh-with-rotation, logout.
///
/// A refresh token lineage lives in exactly one of three states: issued
/// (its `jti` is in the ledger), consumed (rotated away, a successor entry
/// exists), or revoked (logout or mass revocation). Presenting a token
/// whose signature verifies but whose `jti` is gone is the single theft
/// signal: the whole ledger for that user is purged and the caller is
/// forced back through login.
use chrono::{Duration, Utc};

use crate::auth::claims::TokenKind;
use crate::auth::jwt::{generate_access_token, generate_refresh_token};
use crate::auth::{decode_token, verify_password};
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError};
use crate::store::{RefreshTokenLedger, UserRecord, UserStore};

/// A freshly minted access/refresh pair. The access token goes in the
/// response body; the refresh token goes in the http-only cookie.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

async fn mint_pair(
    ledger: &dyn RefreshTokenLedger,
    jwt: &JwtSettings,
    user_id: uuid::Uuid,
) -> Result<TokenPair, AppError> {
    let access_token = generate_access_token(user_id, jwt)?;
    let (refresh_token, jti) = generate_refresh_token(user_id, jwt)?;

    let expires_at = Utc::now() + Duration::seconds(jwt.refresh_token_expiry);
    ledger.issue(user_id, jti, expires_at).await?;

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

/// Verify credentials and open a new session.
///
/// Unknown email and wrong password produce the same error; there is no
/// enumeration signal, and no timing shortcut for the unknown-email case
/// beyond skipping the bcrypt check.
pub async fn login(
    users: &dyn UserStore,
    ledger: &dyn RefreshTokenLedger,
    jwt: &JwtSettings,
    email: &str,
    password: &str,
) -> Result<(UserRecord, TokenPair), AppError> {
    let user = users
        .find_by_email(email)
        .await?
        .ok_or(AppError::Auth(AuthError::InvalidCredentials))?;

    if !verify_password(password, &user.password_hash) {
        return Err(AppError::Auth(AuthError::InvalidCredentials));
    }

    let pair = mint_pair(ledger, jwt, user.id).await?;
    tracing::info!(user_id = %user.id, "User logged in");

    Ok((user, pair))
}

/// Rotate a refresh token: consume the presented lineage, issue a new one.
///
/// The ledger delete is the serialization point. When two requests race
/// with the same token, exactly one consumes the entry; the loser observes
/// "not found", which is indistinguishable from theft and revokes every
/// session for the user. That asymmetry is deliberate.
pub async fn refresh(
    ledger: &dyn RefreshTokenLedger,
    jwt: &JwtSettings,
    presented: &str,
) -> Result<TokenPair, AppError> {
    let claims = decode_token(presented, jwt)?;
    if claims.token_type != TokenKind::Refresh {
        return Err(AppError::Auth(AuthError::Unauthenticated));
    }
    let jti = claims.jti.ok_or(AppError::Auth(AuthError::Unauthenticated))?;
    let user_id = claims.user_id()?;

    match ledger.consume(jti).await? {
        Some(_) => {
            let pair = mint_pair(ledger, jwt, user_id).await?;
            tracing::info!(user_id = %user_id, "Refresh token rotated");
            Ok(pair)
        }
        None => {
            // Valid signature, no ledger entry: this jti was already
            // rotated away or revoked. Treat as theft and burn everything.
            let revoked = ledger.revoke_all(user_id).await?;
            tracing::warn!(
                user_id = %user_id,
                revoked = revoked,
                "Reused refresh token presented, all sessions revoked"
            );
            Err(AppError::Auth(AuthError::ReuseDetected))
        }
    }
}

/// Best-effort session teardown. A missing, garbled, or already-consumed
/// token never fails the caller; the cookie gets cleared regardless.
pub async fn logout(ledger: &dyn RefreshTokenLedger, jwt: &JwtSettings, presented: Option<&str>) {
    let Some(token) = presented else { return };

    let Ok(claims) = decode_token(token, jwt) else {
        tracing::debug!("Logout with undecodable refresh token");
        return;
    };

    if claims.token_type != TokenKind::Refresh {
        return;
    }

    if let Some(jti) = claims.jti {
        match ledger.consume(jti).await {
            Ok(Some(entry)) => {
                tracing::info!(user_id = %entry.user_id, "User logged out");
            }
            Ok(None) => {
                tracing::debug!("Logout for a refresh token with no ledger entry");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Ledger delete failed during logout");
            }
        }
    }
}
