/// Signed token payload (RFC 7519 claims plus a kind discriminator).
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AuthError};

/// Discriminates access tokens from refresh tokens. Every endpoint checks
/// the kind it expects; the codec itself does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user id as UUID string)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Issuer
    pub iss: String,
    /// Token kind
    #[serde(rename = "type")]
    pub token_type: TokenKind,
    /// Ledger key, present on refresh tokens only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jti: Option<Uuid>,
}

impl Claims {
    pub fn new(
        user_id: Uuid,
        token_type: TokenKind,
        jti: Option<Uuid>,
        expiry_seconds: i64,
        issuer: String,
    ) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: user_id.to_string(),
            exp: now + expiry_seconds,
            iat: now,
            iss: issuer,
            token_type,
            jti,
        }
    }

    /// Extract the user id from the subject claim.
    pub fn user_id(&self) -> Result<Uuid, AppError> {
        Uuid::parse_str(&self.sub).map_err(|_| AppError::Auth(AuthError::Unauthenticated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_claims_carry_no_jti() {
        let user_id = Uuid::new_v4();
        let claims = Claims::new(user_id, TokenKind::Access, None, 3600, "test".to_string());

        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.token_type, TokenKind::Access);
        assert!(claims.jti.is_none());
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn user_id_round_trips_through_sub() {
        let user_id = Uuid::new_v4();
        let claims = Claims::new(user_id, TokenKind::Refresh, Some(Uuid::new_v4()), 60, "test".to_string());

        assert_eq!(claims.user_id().unwrap(), user_id);
    }

    #[test]
    fn garbage_sub_is_unauthenticated() {
        let mut claims = Claims::new(Uuid::new_v4(), TokenKind::Access, None, 60, "test".to_string());
        claims.sub = "not-a-uuid".to_string();

        assert!(claims.user_id().is_err());
    }

    #[test]
    fn jti_serializes_as_a_uuid_and_is_omitted_when_absent() {
        let jti = Uuid::new_v4();
        let refresh = Claims::new(Uuid::new_v4(), TokenKind::Refresh, Some(jti), 60, "test".to_string());
        let json = serde_json::to_string(&refresh).unwrap();
        assert!(json.contains(&format!("\"jti\":\"{}\"", jti)));

        let parsed: Claims = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.jti, Some(jti));

        let access = Claims::new(Uuid::new_v4(), TokenKind::Access, None, 60, "test".to_string());
        assert!(!serde_json::to_string(&access).unwrap().contains("jti"));
    }

    #[test]
    fn token_kind_serializes_lowercase() {
        // Wire compatibility with clients expecting "access"/"refresh".
        assert_eq!(serde_json::to_string(&TokenKind::Access).unwrap(), "\"access\"");
        assert_eq!(serde_json::to_string(&TokenKind::Refresh).unwrap(), "\"refresh\"");
    }
}
