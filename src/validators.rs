/// Input validation for account-facing fields.
///
/// Length limits guard against pathological inputs before they reach bcrypt
/// or the database; format checks use a simplified RFC 5322 email regex.
use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ValidationError;

const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321
const MIN_EMAIL_LENGTH: usize = 5;
const MAX_USERNAME_LENGTH: usize = 64;

lazy_static! {
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"
    ).unwrap();
}

/// Validates an email address and returns the trimmed form.
pub fn is_valid_email(email: &str) -> Result<String, ValidationError> {
    let trimmed = email.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("email"));
    }
    if trimmed.len() < MIN_EMAIL_LENGTH {
        return Err(ValidationError::TooShort("email", MIN_EMAIL_LENGTH));
    }
    if trimmed.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong("email", MAX_EMAIL_LENGTH));
    }

    if !EMAIL_REGEX.is_match(trimmed) || trimmed.matches('@').count() != 1 {
        return Err(ValidationError::InvalidFormat(
            "email has invalid format".to_string(),
        ));
    }

    // Local part over 64 chars is technically invalid and a phishing tell.
    if let Some(at_pos) = trimmed.find('@') {
        if trimmed[..at_pos].len() > 64 {
            return Err(ValidationError::InvalidFormat(
                "email has invalid format".to_string(),
            ));
        }
    }

    Ok(trimmed.to_string())
}

/// Validates a display name and returns the trimmed form.
pub fn is_valid_username(username: &str) -> Result<String, ValidationError> {
    let trimmed = username.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("username"));
    }
    if trimmed.len() > MAX_USERNAME_LENGTH {
        return Err(ValidationError::TooLong("username", MAX_USERNAME_LENGTH));
    }
    if trimmed.chars().any(|c| c.is_control()) {
        return Err(ValidationError::InvalidFormat(
            "username contains control characters".to_string(),
        ));
    }

    Ok(trimmed.to_string())
}
