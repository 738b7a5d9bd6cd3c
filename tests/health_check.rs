use std::net::TcpListener;
use std::sync::Arc;

use expensex::configuration::JwtSettings;
use expensex::email_client::EmailClient;
use expensex::startup::{run, AppState};
use expensex::store::{InMemoryRefreshTokenLedger, InMemoryUserStore};

fn spawn_app() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let state = AppState {
        users: Arc::new(InMemoryUserStore::new()),
        ledger: Arc::new(InMemoryRefreshTokenLedger::new()),
        jwt: JwtSettings {
            secret: "test-secret-key-at-least-32-characters-long".to_string(),
            access_token_expiry: 3600,
            refresh_token_expiry: 604800,
            issuer: "expensex-test".to_string(),
        },
        email_client: EmailClient::new(
            "http://127.0.0.1:9".to_string(),
            "no-reply@example.com".to_string(),
        ),
        cookie_secure: false,
    };

    let server = run(listener, state).expect("Failed to bind address");
    let _ = tokio::spawn(server);

    format!("http://127.0.0.1:{}", port)
}

#[tokio::test]
async fn health_check_works() {
    let address = spawn_app();

    let response = reqwest::Client::new()
        .get(format!("{}/health_check", address))
        .send()
        .await
        .expect("Failed to execute request.");

    assert!(response.status().is_success());
    assert_eq!(Some(0), response.content_length());
}
