use actix_web::{middleware::Logger, web, App, HttpServer};
use actix_web::dev::Server;
use std::net::TcpListener;
use std::sync::Arc;

use crate::configuration::JwtSettings;
use crate::email_client::EmailClient;
use crate::middleware::JwtMiddleware;
use crate::routes::{
    forgot_password, get_current_user, health_check, login, logout, refresh, register,
    reset_password, update_profile,
};
use crate::store::{RefreshTokenLedger, UserStore};

/// Everything the handlers need, assembled once at startup. The store
/// fields are trait objects so tests can run the full HTTP surface against
/// the in-memory backings.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub ledger: Arc<dyn RefreshTokenLedger>,
    pub jwt: JwtSettings,
    pub email_client: EmailClient,
    pub cookie_secure: bool,
}

pub fn run(listener: TcpListener, state: AppState) -> Result<Server, std::io::Error> {
    let jwt_config = state.jwt.clone();
    let state = web::Data::new(state);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(state.clone())
            // Public routes
            .route("/health_check", web::get().to(health_check))
            .route("/auth/register", web::post().to(register))
            .route("/auth/login", web::post().to(login))
            .route("/auth/refresh", web::post().to(refresh))
            .route("/auth/logout", web::post().to(logout))
            .route("/auth/forgot-password", web::post().to(forgot_password))
            .route("/auth/reset-password", web::post().to(reset_password))
            // Bearer-protected routes
            .service(
                web::scope("/auth")
                    .wrap(JwtMiddleware::new(jwt_config.clone()))
                    .route("/me", web::get().to(get_current_user))
                    .route("/profile", web::put().to(update_profile)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
