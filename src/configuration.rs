use config::ConfigError;

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub jwt: JwtSettings,
    pub email: EmailSettings,
}

#[derive(serde::Deserialize, Clone)]
pub struct ApplicationSettings {
    pub port: u16,
    /// Mark the refresh cookie `Secure`. Off for local development.
    pub cookie_secure: bool,
}

#[derive(serde::Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }

    pub fn connection_string_without_db(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}",
            self.username, self.password, self.host, self.port
        )
    }
}

/// Token signing settings, resolved once at startup and passed around
/// immutably. TTLs are in seconds.
#[derive(serde::Deserialize, Clone)]
pub struct JwtSettings {
    pub secret: String,
    pub access_token_expiry: i64,  // default 86400 (1 day)
    pub refresh_token_expiry: i64, // default 2592000 (30 days)
    pub issuer: String,
}

#[derive(serde::Deserialize, Clone)]
pub struct EmailSettings {
    pub base_url: String,
    pub sender: String,
}

pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .set_default("application.port", 8000)?
        .set_default("application.cookie_secure", false)?
        .set_default("jwt.access_token_expiry", 86400)?
        .set_default("jwt.refresh_token_expiry", 2_592_000)?
        .set_default("jwt.issuer", "expensex")?
        .build()?;
    settings.try_deserialize::<Settings>()
}
