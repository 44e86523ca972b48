use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use std::fmt;

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Deployment environment, `prod` or `dev`.
    pub env: String,
    pub host: String,
    pub port: u16,
    /// Comma separated list of CORS origins, `*` for any.
    pub allowed_origins: String,
    /// Comma separated list of tables reachable through the record endpoints.
    pub exposed_tables: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Full connection URL; takes precedence over the discrete fields.
    #[serde(skip_serializing, default)]
    pub url: Option<SecretString>,
    pub user: String,
    #[serde(skip_serializing, default)]
    pub password: Option<SecretString>,
    pub host: String,
    pub port: u16,
    pub database: String,
    /// Pool creation attempts before startup gives up.
    pub connect_retries: u32,
    /// Seconds to sleep between pool creation attempts.
    pub connect_retry_delay_secs: u64,
    /// Apply the bundled migrations at startup.
    pub run_migrations: bool,
}

/// Local development database used outside `prod`.
pub const DEV_DB_HOST: &str = "localhost";
pub const DEV_DB_PORT: u16 = 5431;

/// Plain environment variables honored on top of the prefixed ones.
const PLAIN_ENV_KEYS: &[(&str, &str)] = &[
    ("ENV", "server.env"),
    ("APP_HOST", "server.host"),
    ("APP_PORT", "server.port"),
    ("ALLOWED_ORIGINS", "server.allowed_origins"),
    ("EXPOSED_TABLES", "server.exposed_tables"),
    ("DATABASE_URL", "database.url"),
    ("DB_USER", "database.user"),
    ("DB_PASSWORD", "database.password"),
    ("DB_NAME", "database.database"),
    ("DB_HOST", "database.host"),
    ("DB_PORT", "database.port"),
];

impl Config {
    /// Load configuration from environment variables, with defaults.
    pub fn load() -> Result<Self, config::ConfigError> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&Self::default())?)
            // Override with environment variables using `CRUDBASE__` prefix and `__` separator
            // e.g., CRUDBASE__DATABASE__USER="my_user"
            .add_source(
                config::Environment::with_prefix("CRUDBASE")
                    .prefix_separator("__")
                    .separator("__"),
            );

        for (var, key) in PLAIN_ENV_KEYS {
            builder = builder.set_override_option(*key, std::env::var(var).ok())?;
        }

        builder.build()?.try_deserialize()
    }

    /// Connection URL for the configured environment.
    ///
    /// Outside `prod` the discrete settings point at the local development
    /// database ([`DEV_DB_HOST`]:[`DEV_DB_PORT`]) whatever `DB_HOST` and
    /// `DB_PORT` say. A full `DATABASE_URL` is used as is.
    pub fn database_url(&self) -> SecretString {
        if self.server.is_prod() {
            return self.database.connection_string();
        }

        DatabaseConfig {
            host: DEV_DB_HOST.to_string(),
            port: DEV_DB_PORT,
            ..self.database.clone()
        }
        .connection_string()
    }
}

impl ServerConfig {
    pub fn is_prod(&self) -> bool {
        self.env.eq_ignore_ascii_case("prod")
    }

    pub fn allowed_origins(&self) -> Vec<String> {
        split_list(&self.allowed_origins)
    }

    pub fn exposed_tables(&self) -> Vec<String> {
        split_list(&self.exposed_tables)
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl DatabaseConfig {
    /// Constructs the database connection string.
    pub fn connection_string(&self) -> SecretString {
        if let Some(url) = &self.url {
            return url.clone();
        }

        let password_part = match &self.password {
            Some(password) if !password.expose_secret().is_empty() => {
                format!(":{}", password.expose_secret())
            }
            _ => String::new(),
        };

        SecretString::from(format!(
            "postgres://{}{}@{}:{}/{}",
            self.user, password_part, self.host, self.port, self.database
        ))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            env: "prod".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8000,
            allowed_origins: "*".to_string(),
            exposed_tables: String::new(),
        }
    }
}

// Default values for the database configuration
impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            user: "postgres".to_string(),
            password: None,
            host: "localhost".to_string(),
            port: 5432,
            database: "postgres".to_string(),
            connect_retries: 5,
            connect_retry_delay_secs: 2,
            run_migrations: false,
        }
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Secrets are skipped by serde
        match serde_json::to_string_pretty(&self) {
            Ok(json) => write!(f, "{}", json),
            Err(_) => write!(f, "Error serializing config"),
        }
    }
}
