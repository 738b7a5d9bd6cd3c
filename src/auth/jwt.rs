/// Token codec: creation and verification of signed, expiring tokens.
///
/// Signature, expiry, and issuer are checked here. Kind (`access` vs
/// `refresh`) and ledger membership are the caller's responsibility.
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::auth::claims::{Claims, TokenKind};
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError};

/// Mint a short-lived access token for a user.
pub fn generate_access_token(user_id: Uuid, config: &JwtSettings) -> Result<String, AppError> {
    let claims = Claims::new(
        user_id,
        TokenKind::Access,
        None,
        config.access_token_expiry,
        config.issuer.clone(),
    );
    sign(&claims, config)
}

/// Mint a long-lived refresh token with a fresh `jti`.
///
/// Returns the encoded token together with the raw `jti` so the caller can
/// persist the ledger entry without re-parsing the token.
pub fn generate_refresh_token(
    user_id: Uuid,
    config: &JwtSettings,
) -> Result<(String, Uuid), AppError> {
    let jti = Uuid::new_v4();
    let claims = Claims::new(
        user_id,
        TokenKind::Refresh,
        Some(jti),
        config.refresh_token_expiry,
        config.issuer.clone(),
    );
    Ok((sign(&claims, config)?, jti))
}

fn sign(claims: &Claims, config: &JwtSettings) -> Result<String, AppError> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
}

/// Verify signature, expiry, and issuer, and return the claims.
pub fn decode_token(token: &str, config: &JwtSettings) -> Result<Claims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[&config.issuer]);

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::debug!("Token validation failed: {}", e);
        AppError::Auth(AuthError::Unauthenticated)
    })
}
