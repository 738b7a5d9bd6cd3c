/// Authentication endpoints.
///
/// Access tokens travel in the response body and come back as bearer
/// headers; refresh tokens only ever live in the `refresh_token` http-only
/// cookie.
use actix_web::cookie::{time, Cookie, SameSite};
use actix_web::{web, HttpRequest, HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};

use crate::auth::{hash_password, reset, session, Claims};
use crate::error::{AppError, AuthError};
use crate::startup::AppState;
use crate::store::UserRecord;
use crate::validators::{is_valid_email, is_valid_username};

pub const REFRESH_COOKIE: &str = "refresh_token";

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub username: Option<String>,
    pub password: String,
}

/// OAuth2-style password login form: `username` carries the email.
#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub remember_me: bool,
}

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
}

#[derive(Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub token: String,
    pub new_password: String,
}

#[derive(Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

impl TokenResponse {
    fn bearer(access_token: String) -> Self {
        Self {
            access_token,
            token_type: "bearer".to_string(),
        }
    }
}

#[derive(Serialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub username: Option<String>,
}

impl From<UserRecord> for UserResponse {
    fn from(user: UserRecord) -> Self {
        Self {
            id: user.id.to_string(),
            email: user.email,
            username: user.username,
        }
    }
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub msg: String,
}

fn refresh_cookie(state: &AppState, token: &str, persistent: bool) -> Cookie<'static> {
    let mut builder = Cookie::build(REFRESH_COOKIE, token.to_owned())
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.cookie_secure);
    if persistent {
        builder = builder.max_age(time::Duration::seconds(state.jwt.refresh_token_expiry));
    }
    builder.finish()
}

fn removal_cookie(state: &AppState) -> Cookie<'static> {
    let mut cookie = Cookie::build(REFRESH_COOKIE, "")
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.cookie_secure)
        .finish();
    cookie.make_removal();
    cookie
}

/// POST /auth/register
pub async fn register(
    form: web::Json<RegisterRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let email = is_valid_email(&form.email)?;
    let username = match form.username.as_deref() {
        Some(u) => Some(is_valid_username(u)?),
        None => None,
    };
    let password_hash = hash_password(&form.password)?;

    let user = state
        .users
        .insert(&email, username.as_deref(), &password_hash)
        .await?;

    tracing::info!(user_id = %user.id, "User registered");

    Ok(HttpResponse::Created().json(UserResponse::from(user)))
}

/// POST /auth/login
///
/// `remember_me` controls cookie persistence only: a session cookie
/// otherwise, a 30-day cookie when set. The token inside carries its own
/// expiry either way.
pub async fn login(
    form: web::Form<LoginForm>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let email = is_valid_email(&form.username)
        .map_err(|_| AppError::Auth(AuthError::InvalidCredentials))?;

    let (_, pair) = session::login(
        state.users.as_ref(),
        state.ledger.as_ref(),
        &state.jwt,
        &email,
        &form.password,
    )
    .await?;

    Ok(HttpResponse::Ok()
        .cookie(refresh_cookie(&state, &pair.refresh_token, form.remember_me))
        .json(TokenResponse::bearer(pair.access_token)))
}

/// POST /auth/refresh
///
/// Rotates the refresh cookie. A reused token has already triggered mass
/// revocation by the time the error surfaces, so that branch also clears
/// the cookie to force a clean re-login.
pub async fn refresh(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let presented = req
        .cookie(REFRESH_COOKIE)
        .ok_or(AppError::Auth(AuthError::Unauthenticated))?;

    match session::refresh(state.ledger.as_ref(), &state.jwt, presented.value()).await {
        Ok(pair) => Ok(HttpResponse::Ok()
            .cookie(refresh_cookie(&state, &pair.refresh_token, true))
            .json(TokenResponse::bearer(pair.access_token))),
        Err(err @ AppError::Auth(AuthError::ReuseDetected)) => {
            let mut response = err.error_response();
            if let Err(cookie_err) = response.add_removal_cookie(&removal_cookie(&state)) {
                tracing::error!("Failed to attach removal cookie: {}", cookie_err);
            }
            Ok(response)
        }
        Err(err) => Err(err),
    }
}

/// POST /auth/logout
///
/// Best effort: the ledger entry is deleted when the cookie decodes, and
/// the cookie is cleared no matter what.
pub async fn logout(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    let presented = req.cookie(REFRESH_COOKIE);
    session::logout(
        state.ledger.as_ref(),
        &state.jwt,
        presented.as_ref().map(|c| c.value()),
    )
    .await;

    HttpResponse::Ok()
        .cookie(removal_cookie(&state))
        .json(MessageResponse {
            msg: "Logged out".to_string(),
        })
}

/// GET /auth/me
pub async fn get_current_user(
    claims: web::ReqData<Claims>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;

    let user = state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or(AppError::Auth(AuthError::Unauthenticated))?;

    Ok(HttpResponse::Ok().json(UserResponse::from(user)))
}

/// PUT /auth/profile
pub async fn update_profile(
    claims: web::ReqData<Claims>,
    form: web::Json<UpdateProfileRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;

    let user = match form.username.as_deref() {
        Some(username) => {
            let username = is_valid_username(username)?;
            state.users.update_username(user_id, &username).await?
        }
        None => state
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::Auth(AuthError::Unauthenticated))?,
    };

    Ok(HttpResponse::Ok().json(UserResponse::from(user)))
}

/// POST /auth/forgot-password
///
/// Enumeration-safe: identical status and body whether or not the account
/// exists, and whether or not the email goes out.
pub async fn forgot_password(
    form: web::Json<ForgotPasswordRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    reset::request_password_reset(state.users.as_ref(), &state.email_client, &form.email).await?;

    Ok(HttpResponse::Ok().json(MessageResponse {
        msg: "If the email exists, a reset code has been sent.".to_string(),
    }))
}

/// POST /auth/reset-password
pub async fn reset_password(
    form: web::Json<ResetPasswordRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    reset::confirm_password_reset(
        state.users.as_ref(),
        &form.email,
        &form.token,
        &form.new_password,
    )
    .await?;

    Ok(HttpResponse::Ok().json(MessageResponse {
        msg: "Password reset successfully".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state() -> AppState {
        use crate::configuration::JwtSettings;
        use crate::email_client::EmailClient;
        use crate::store::{InMemoryRefreshTokenLedger, InMemoryUserStore};
        use std::sync::Arc;

        AppState {
            users: Arc::new(InMemoryUserStore::new()),
            ledger: Arc::new(InMemoryRefreshTokenLedger::new()),
            jwt: JwtSettings {
                secret: "test-secret-key-at-least-32-characters-long".to_string(),
                access_token_expiry: 3600,
                refresh_token_expiry: 604800,
                issuer: "test".to_string(),
            },
            email_client: EmailClient::new(
                "http://127.0.0.1:9".to_string(),
                "no-reply@example.com".to_string(),
            ),
            cookie_secure: false,
        }
    }

    #[test]
    fn remember_me_controls_cookie_persistence() {
        let state = test_state();

        let session_cookie = refresh_cookie(&state, "tok", false);
        assert!(session_cookie.max_age().is_none());

        let persistent = refresh_cookie(&state, "tok", true);
        assert_eq!(
            persistent.max_age(),
            Some(time::Duration::seconds(604800))
        );
    }

    #[test]
    fn refresh_cookie_is_http_only_lax() {
        let state = test_state();
        let cookie = refresh_cookie(&state, "tok", true);

        assert_eq!(cookie.name(), REFRESH_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));
    }

    #[test]
    fn removal_cookie_expires_immediately() {
        let state = test_state();
        let cookie = removal_cookie(&state);

        assert_eq!(cookie.name(), REFRESH_COOKIE);
        assert_eq!(cookie.max_age(), Some(time::Duration::ZERO));
    }
}
