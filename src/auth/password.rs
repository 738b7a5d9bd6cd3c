/// Password hashing and verification (bcrypt).
use bcrypt::{hash, verify, DEFAULT_COST};

use crate::error::{AppError, ValidationError};

const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_PASSWORD_LENGTH: usize = 128;

/// Hash a password with bcrypt after checking strength rules.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    validate_password_strength(password)?;

    hash(password, DEFAULT_COST)
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// Verify a password against its stored hash.
///
/// Returns false on mismatch and on a malformed hash; a stored hash we
/// cannot parse must read as "wrong password", not as a server error.
pub fn verify_password(password: &str, hashed: &str) -> bool {
    verify(password, hashed).unwrap_or(false)
}

/// Strength rules: 8..=128 chars, at least one digit, one lowercase, and
/// one uppercase letter. Applied at registration and password reset.
fn validate_password_strength(password: &str) -> Result<(), AppError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(AppError::Validation(ValidationError::TooShort(
            "password",
            MIN_PASSWORD_LENGTH,
        )));
    }

    // Bcrypt truncates past 72 bytes anyway; cap well before that matters.
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(AppError::Validation(ValidationError::TooLong(
            "password",
            MAX_PASSWORD_LENGTH,
        )));
    }

    let has_digit = password.chars().any(|c| c.is_numeric());
    let has_lowercase = password.chars().any(|c| c.is_lowercase());
    let has_uppercase = password.chars().any(|c| c.is_uppercase());

    if !has_digit || !has_lowercase || !has_uppercase {
        return Err(AppError::Validation(ValidationError::InvalidFormat(
            "password must contain at least one digit, one lowercase letter, and one uppercase letter"
                .to_string(),
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_salted_bcrypt() {
        let password = "ValidPassword123";
        let hashed = hash_password(password).expect("Failed to hash password");

        assert_ne!(password, hashed);
        assert!(hashed.starts_with("$2"));

        // Salting: hashing twice yields different strings.
        let again = hash_password(password).expect("Failed to hash password");
        assert_ne!(hashed, again);
    }

    #[test]
    fn correct_password_verifies() {
        let password = "ValidPassword123";
        let hashed = hash_password(password).expect("Failed to hash password");

        assert!(verify_password(password, &hashed));
    }

    #[test]
    fn wrong_password_does_not_verify() {
        let hashed = hash_password("ValidPassword123").expect("Failed to hash password");

        assert!(!verify_password("WrongPassword123", &hashed));
    }

    #[test]
    fn malformed_hash_reads_as_mismatch() {
        assert!(!verify_password("anything", "not-a-bcrypt-hash"));
        assert!(!verify_password("anything", ""));
    }

    #[test]
    fn weak_passwords_are_rejected() {
        assert!(hash_password("Short1").is_err());
        assert!(hash_password("nouppercase1").is_err());
        assert!(hash_password("NOLOWERCASE1").is_err());
        assert!(hash_password("NoDigitsHere").is_err());

        let long_password = format!("A1{}", "a".repeat(MAX_PASSWORD_LENGTH));
        assert!(hash_password(&long_password).is_err());
    }
}
