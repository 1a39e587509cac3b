use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use sea_orm::{ConnectOptions, Database};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::auth::session::{SessionStore, derive_cookie_key};
use crate::schemas::AppState;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://outreach.db?mode=rwc";
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3000";
pub const DEFAULT_SESSION_SECRET: &str = "fallback-secret-key";

/// Runtime configuration assembled from defaults and environment variables.
///
/// Variable names map one to one onto field names (`SESSION_TTL_HOURS` ->
/// `session_ttl_hours`). A `.env` file is honoured through `dotenvy`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub db_host: Option<String>,
    pub db_port: Option<u16>,
    pub db_user: Option<String>,
    pub db_password: Option<String>,
    pub db_name: Option<String>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub session_secret: String,
    pub session_ttl_hours: u64,
    pub request_timeout_secs: u64,
    pub assets_dir: String,
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_source(None)
    }

    /// Load configuration from an explicit variable map, or the process
    /// environment when `vars` is `None`.
    pub fn from_source(vars: Option<HashMap<String, String>>) -> Result<Self> {
        let settings = config::Config::builder()
            .set_default("session_secret", DEFAULT_SESSION_SECRET)?
            .set_default("session_ttl_hours", 12)?
            .set_default("request_timeout_secs", 30)?
            .set_default("assets_dir", "assets")?
            .add_source(config::Environment::default().source(vars))
            .build()
            .context("Failed to assemble configuration")?;

        let config: AppConfig = settings
            .try_deserialize()
            .context("Failed to parse configuration")?;
        debug!(
            bind_address = ?config.bind_address,
            port = ?config.port,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Database URL: `DATABASE_URL` wins, then the `DB_*` parts composed into
    /// a postgres URL, then a local SQLite file.
    pub fn database_url(&self) -> String {
        if let Some(url) = &self.database_url {
            return url.clone();
        }
        match (&self.db_host, &self.db_name) {
            (Some(host), Some(name)) => {
                let port = self.db_port.unwrap_or(5432);
                let user = self.db_user.as_deref().unwrap_or("postgres");
                match &self.db_password {
                    Some(password) => {
                        format!("postgres://{user}:{password}@{host}:{port}/{name}")
                    }
                    None => format!("postgres://{user}@{host}:{port}/{name}"),
                }
            }
            _ => DEFAULT_DATABASE_URL.to_string(),
        }
    }

    pub fn bind_address(&self) -> String {
        match (&self.bind_address, self.port) {
            (Some(address), _) => address.clone(),
            (None, Some(port)) => format!("0.0.0.0:{port}"),
            (None, None) => DEFAULT_BIND_ADDRESS.to_string(),
        }
    }

    pub fn uses_default_secret(&self) -> bool {
        self.session_secret == DEFAULT_SESSION_SECRET
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.session_ttl_hours as i64)
    }
}

/// Connect to the database and build the shared application state.
pub async fn initialize_app_state(config: AppConfig) -> Result<AppState> {
    let database_url = config.database_url();
    info!("Connecting to database");
    debug!("Database URL: {}", database_url);

    let mut options = ConnectOptions::new(database_url.clone());
    options.sqlx_logging(false);
    let db = Database::connect(options)
        .await
        .with_context(|| format!("Failed to connect to database '{database_url}'"))?;

    if config.uses_default_secret() {
        warn!("SESSION_SECRET is not set; using the built-in fallback secret");
    }

    Ok(AppState {
        db,
        sessions: SessionStore::new(config.session_ttl()),
        cookie_key: derive_cookie_key(&config.session_secret),
        config: Arc::new(config),
    })
}
