use std::net::TcpListener;
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;

use expensex::configuration::get_configuration;
use expensex::email_client::EmailClient;
use expensex::startup::{run, AppState};
use expensex::store::{PgRefreshTokenLedger, PgUserStore};
use expensex::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry();

    tracing::info!("Starting application");

    let configuration = match get_configuration() {
        Ok(config) => {
            tracing::info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to read configuration: {}", e);
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Configuration error",
            ));
        }
    };

    let connection_string = configuration.database.connection_string();
    tracing::info!("Attempting to connect to database");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&connection_string)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create connection pool: {}", e);
            std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "Database connection error",
            )
        })?;

    tracing::info!("Database connection pool created successfully");

    let state = AppState {
        users: Arc::new(PgUserStore::new(pool.clone())),
        ledger: Arc::new(PgRefreshTokenLedger::new(pool)),
        jwt: configuration.jwt.clone(),
        email_client: EmailClient::new(
            configuration.email.base_url.clone(),
            configuration.email.sender.clone(),
        ),
        cookie_secure: configuration.application.cookie_secure,
    };

    let address = format!("127.0.0.1:{}", configuration.application.port);
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    let server = run(listener, state)?;
    server.await
}
