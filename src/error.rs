/// Unified error handling for the application.
///
/// Domain-specific error enums are grouped under a single `AppError` which
/// implements actix-web's `ResponseError`, so handlers can bubble failures
/// up with `?` and still produce a consistent JSON body. Authentication
/// failures deliberately render coarse, static messages: the caller must
/// never be able to tell "unknown email" from "wrong password", or "code
/// expired" from "code wrong".
use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use std::error::Error as StdError;
use std::fmt;

/// Input validation errors (email format, username shape, password rules).
#[derive(Debug, Clone)]
pub enum ValidationError {
    EmptyField(&'static str),
    TooShort(&'static str, usize),
    TooLong(&'static str, usize),
    InvalidFormat(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyField(field) => write!(f, "{} is empty", field),
            ValidationError::TooShort(field, min) => {
                write!(f, "{} is too short (minimum {} characters)", field, min)
            }
            ValidationError::TooLong(field, max) => {
                write!(f, "{} is too long (maximum {} characters)", field, max)
            }
            ValidationError::InvalidFormat(msg) => write!(f, "{}", msg),
        }
    }
}

impl StdError for ValidationError {}

/// Authentication and session errors.
///
/// `ReuseDetected` carries no extra payload on purpose: by the time it is
/// raised the ledger for the affected user has already been purged, and the
/// HTTP surface must be indistinguishable from any other 401.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Unknown email or wrong password at login. Always generic.
    InvalidCredentials,
    /// Missing, malformed, expired, or wrong-kind token.
    Unauthenticated,
    /// A refresh token with a valid signature whose `jti` is no longer in
    /// the ledger: evidence of reuse after rotation or revocation.
    ReuseDetected,
    /// Registration against an already-registered email.
    DuplicateEmail,
    /// Password-reset confirmation for an unknown account.
    InvalidRequest,
    /// Password-reset code missing, expired, or mismatched.
    InvalidOrExpired,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::InvalidCredentials => write!(f, "Incorrect email or password"),
            AuthError::Unauthenticated => write!(f, "Invalid or expired token"),
            AuthError::ReuseDetected => write!(f, "Invalid or expired token"),
            AuthError::DuplicateEmail => write!(f, "Email already registered"),
            AuthError::InvalidRequest => write!(f, "Invalid request"),
            AuthError::InvalidOrExpired => write!(f, "Invalid or expired token"),
        }
    }
}

impl StdError for AuthError {}

/// Persistence-layer errors. Integrity violations in the refresh-token
/// ledger (duplicate `jti`) land here and surface as server errors, never
/// as business errors.
#[derive(Debug)]
pub enum DatabaseError {
    IntegrityViolation(String),
    QueryExecution(String),
    ConnectionPool(String),
    UnexpectedError(String),
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseError::IntegrityViolation(msg) => write!(f, "Integrity violation: {}", msg),
            DatabaseError::QueryExecution(msg) => write!(f, "Query error: {}", msg),
            DatabaseError::ConnectionPool(msg) => write!(f, "Database connection error: {}", msg),
            DatabaseError::UnexpectedError(msg) => write!(f, "Database error: {}", msg),
        }
    }
}

impl StdError for DatabaseError {}

/// Outbound email errors. The password-reset flow logs and discards these;
/// they only reach a response if some future caller chooses to surface them.
#[derive(Debug, Clone)]
pub enum EmailError {
    SendFailed(String),
    ServiceUnavailable(String),
}

impl fmt::Display for EmailError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmailError::SendFailed(msg) => write!(f, "Failed to send email: {}", msg),
            EmailError::ServiceUnavailable(msg) => {
                write!(f, "Email service unavailable: {}", msg)
            }
        }
    }
}

impl StdError for EmailError {}

/// Central error type all handlers return.
#[derive(Debug)]
pub enum AppError {
    Validation(ValidationError),
    Auth(AuthError),
    Database(DatabaseError),
    Email(EmailError),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(e) => write!(f, "{}", e),
            AppError::Auth(e) => write!(f, "{}", e),
            AppError::Database(e) => write!(f, "{}", e),
            AppError::Email(e) => write!(f, "{}", e),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl StdError for AppError {}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err)
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        AppError::Database(err)
    }
}

impl From<EmailError> for AppError {
    fn from(err: EmailError) -> Self {
        AppError::Email(err)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        let error_msg = err.to_string();

        if error_msg.contains("duplicate key") || error_msg.contains("unique constraint") {
            AppError::Database(DatabaseError::IntegrityViolation(error_msg))
        } else if error_msg.contains("pool") || error_msg.contains("connect") {
            AppError::Database(DatabaseError::ConnectionPool(error_msg))
        } else {
            AppError::Database(DatabaseError::UnexpectedError(error_msg))
        }
    }
}

/// JSON body rendered for every error response.
#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    /// Correlation id for log lookup.
    pub error_id: String,
    pub message: String,
    pub code: String,
    pub status: u16,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_id: String, message: String, code: String, status: u16) -> Self {
        Self {
            error_id,
            message,
            code,
            status,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

impl AppError {
    fn code_and_message(&self) -> (&'static str, String) {
        match self {
            AppError::Validation(e) => ("VALIDATION_ERROR", e.to_string()),
            AppError::Auth(e) => {
                let code = match e {
                    AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
                    // Reuse renders exactly like any other 401.
                    AuthError::Unauthenticated | AuthError::ReuseDetected => "UNAUTHENTICATED",
                    AuthError::DuplicateEmail => "DUPLICATE_EMAIL",
                    AuthError::InvalidRequest => "INVALID_REQUEST",
                    AuthError::InvalidOrExpired => "INVALID_RESET_CODE",
                };
                (code, e.to_string())
            }
            AppError::Database(DatabaseError::ConnectionPool(_)) => (
                "SERVICE_UNAVAILABLE",
                "Database service temporarily unavailable".to_string(),
            ),
            AppError::Database(_) => ("DATABASE_ERROR", "Database error occurred".to_string()),
            AppError::Email(_) => (
                "EMAIL_SERVICE_ERROR",
                "Email service temporarily unavailable".to_string(),
            ),
            AppError::Internal(_) => ("INTERNAL_ERROR", "Internal server error".to_string()),
        }
    }

    fn log(&self, error_id: &str) {
        match self {
            AppError::Validation(e) => {
                tracing::warn!(error_id = error_id, error = %e, "Validation error");
            }
            AppError::Auth(AuthError::ReuseDetected) => {
                tracing::warn!(
                    error_id = error_id,
                    "Refresh token reuse detected, sessions revoked"
                );
            }
            AppError::Auth(e) => {
                tracing::warn!(error_id = error_id, error = %e, "Authentication error");
            }
            AppError::Database(e) => {
                tracing::error!(error_id = error_id, error = %e, "Database error");
            }
            AppError::Email(e) => {
                tracing::error!(error_id = error_id, error = %e, "Email service error");
            }
            AppError::Internal(msg) => {
                tracing::error!(error_id = error_id, error = %msg, "Internal error");
            }
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Auth(e) => match e {
                AuthError::Unauthenticated | AuthError::ReuseDetected => StatusCode::UNAUTHORIZED,
                AuthError::InvalidCredentials
                | AuthError::DuplicateEmail
                | AuthError::InvalidRequest
                | AuthError::InvalidOrExpired => StatusCode::BAD_REQUEST,
            },
            AppError::Database(DatabaseError::ConnectionPool(_)) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Email(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let error_id = uuid::Uuid::new_v4().to_string();
        self.log(&error_id);

        let status = self.status_code();
        let (code, message) = self.code_and_message();
        let body = ErrorResponse::new(error_id, message, code.to_string(), status.as_u16());

        HttpResponse::build(status).json(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_credentials_is_a_400_with_generic_message() {
        let err = AppError::Auth(AuthError::InvalidCredentials);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Incorrect email or password");
    }

    #[test]
    fn reuse_renders_exactly_like_unauthenticated() {
        let reuse = AppError::Auth(AuthError::ReuseDetected);
        let unauth = AppError::Auth(AuthError::Unauthenticated);

        assert_eq!(reuse.status_code(), unauth.status_code());
        assert_eq!(reuse.code_and_message(), unauth.code_and_message());
    }

    #[test]
    fn reset_failures_share_one_message() {
        // The caller must not learn whether the code was wrong or expired.
        assert_eq!(
            AuthError::InvalidOrExpired.to_string(),
            "Invalid or expired token"
        );
    }

    #[test]
    fn ledger_integrity_violations_are_server_errors() {
        let err: AppError = sqlx::Error::Protocol("duplicate key value".into()).into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn validation_errors_convert_into_app_errors() {
        let err: AppError = ValidationError::EmptyField("email").into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
