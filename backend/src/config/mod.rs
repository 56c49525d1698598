//! Central module for application-wide configuration settings.
//!
//! This module handles loading and managing configuration parameters such as
//! the server port, database connection settings, the token signing secret,
//! token lifetimes, password hashing cost, and notification delivery.
//!
//! Values are layered: built-in defaults, then an optional config file, then
//! environment variables using their bare names (`JWT_SECRET`, `DB_HOST`, ...).
//! The result is immutable and handed to each component at construction.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Shortest accepted HMAC signing secret, in bytes.
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// Longest accepted token lifetime: ten years.
pub const MAX_TOKEN_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Directory backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Memory,
    Postgres,
}

/// Notification delivery selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifierKind {
    Log,
    Http,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_app_port")]
    pub app_port: u16,

    #[serde(default = "default_storage")]
    pub storage: StorageKind,

    #[serde(default = "default_db_host")]
    pub db_host: String,
    #[serde(default = "default_db_port")]
    pub db_port: u16,
    #[serde(default = "default_db_user")]
    pub db_user: String,
    #[serde(default = "default_db_password")]
    pub db_password: String,
    #[serde(default = "default_db_name")]
    pub db_name: String,
    #[serde(default = "default_db_ssl_mode")]
    pub db_ssl_mode: String,
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// HMAC-SHA256 key for identity tokens. No default.
    #[serde(default)]
    pub jwt_secret: String,

    #[serde(default = "default_activate_base_url")]
    pub activate_base_url: String,
    #[serde(default = "default_token_ttl")]
    pub activation_token_ttl_secs: u64,
    #[serde(default = "default_token_ttl")]
    pub identity_token_ttl_secs: u64,

    #[serde(default = "default_hash_memory_kib")]
    pub hash_memory_kib: u32,
    #[serde(default = "default_hash_iterations")]
    pub hash_iterations: u32,
    #[serde(default = "default_hash_parallelism")]
    pub hash_parallelism: u32,
    #[serde(default = "default_hash_workers")]
    pub hash_workers: usize,
    #[serde(default = "default_hash_timeout")]
    pub hash_timeout_secs: u64,

    #[serde(default = "default_notifier")]
    pub notifier: NotifierKind,
    #[serde(default)]
    pub mail_api_url: String,
    #[serde(default)]
    pub mail_api_key: String,
    #[serde(default)]
    pub mail_from_email: String,
    #[serde(default)]
    pub mail_from_name: Option<String>,

    #[serde(default = "default_outbound_timeout")]
    pub outbound_timeout_secs: u64,

    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_json: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_port: default_app_port(),
            storage: default_storage(),
            db_host: default_db_host(),
            db_port: default_db_port(),
            db_user: default_db_user(),
            db_password: default_db_password(),
            db_name: default_db_name(),
            db_ssl_mode: default_db_ssl_mode(),
            db_max_connections: default_db_max_connections(),
            jwt_secret: String::new(),
            activate_base_url: default_activate_base_url(),
            activation_token_ttl_secs: default_token_ttl(),
            identity_token_ttl_secs: default_token_ttl(),
            hash_memory_kib: default_hash_memory_kib(),
            hash_iterations: default_hash_iterations(),
            hash_parallelism: default_hash_parallelism(),
            hash_workers: default_hash_workers(),
            hash_timeout_secs: default_hash_timeout(),
            notifier: default_notifier(),
            mail_api_url: String::new(),
            mail_api_key: String::new(),
            mail_from_email: String::new(),
            mail_from_name: None,
            outbound_timeout_secs: default_outbound_timeout(),
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("app_port", &self.app_port)
            .field("storage", &self.storage)
            .field("db_host", &self.db_host)
            .field("db_port", &self.db_port)
            .field("db_user", &self.db_user)
            .field("db_password", &"<redacted>")
            .field("db_name", &self.db_name)
            .field("db_ssl_mode", &self.db_ssl_mode)
            .field("db_max_connections", &self.db_max_connections)
            .field("jwt_secret", &"<redacted>")
            .field("activate_base_url", &self.activate_base_url)
            .field("activation_token_ttl_secs", &self.activation_token_ttl_secs)
            .field("identity_token_ttl_secs", &self.identity_token_ttl_secs)
            .field("hash_memory_kib", &self.hash_memory_kib)
            .field("hash_iterations", &self.hash_iterations)
            .field("hash_parallelism", &self.hash_parallelism)
            .field("hash_workers", &self.hash_workers)
            .field("hash_timeout_secs", &self.hash_timeout_secs)
            .field("notifier", &self.notifier)
            .field("mail_api_url", &self.mail_api_url)
            .field("mail_api_key", &"<redacted>")
            .field("mail_from_email", &self.mail_from_email)
            .field("outbound_timeout_secs", &self.outbound_timeout_secs)
            .field("log_level", &self.log_level)
            .field("log_json", &self.log_json)
            .finish()
    }
}

// Default value helpers
fn default_app_port() -> u16 {
    8080
}

fn default_storage() -> StorageKind {
    StorageKind::Memory
}

fn default_db_host() -> String {
    "localhost".to_string()
}

fn default_db_port() -> u16 {
    5432
}

fn default_db_user() -> String {
    "postgres".to_string()
}

fn default_db_password() -> String {
    "postgres".to_string()
}

fn default_db_name() -> String {
    "postgres".to_string()
}

fn default_db_ssl_mode() -> String {
    "disable".to_string()
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_activate_base_url() -> String {
    "http://localhost:8080/activate".to_string()
}

fn default_token_ttl() -> u64 {
    24 * 60 * 60
}

fn default_hash_memory_kib() -> u32 {
    19 * 1024
}

fn default_hash_iterations() -> u32 {
    2
}

fn default_hash_parallelism() -> u32 {
    1
}

fn default_hash_workers() -> usize {
    4
}

fn default_hash_timeout() -> u64 {
    10
}

fn default_notifier() -> NotifierKind {
    NotifierKind::Log
}

fn default_outbound_timeout() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from defaults, an optional file, and the environment.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&AppConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        // No `try_parsing`: secrets must reach their fields verbatim.
        builder = builder.add_source(config::Environment::default());

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the service must not start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::Invalid(format!(
                "JWT_SECRET must be at least {} bytes",
                MIN_JWT_SECRET_LEN
            )));
        }
        for (name, ttl) in [
            ("ACTIVATION_TOKEN_TTL_SECS", self.activation_token_ttl_secs),
            ("IDENTITY_TOKEN_TTL_SECS", self.identity_token_ttl_secs),
        ] {
            if !(1..=MAX_TOKEN_TTL_SECS).contains(&ttl) {
                return Err(ConfigError::Invalid(format!(
                    "{} must be between 1 and {}",
                    name, MAX_TOKEN_TTL_SECS
                )));
            }
        }
        if self.hash_workers == 0 {
            return Err(ConfigError::Invalid("HASH_WORKERS must be positive".to_string()));
        }
        if self.activate_base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("ACTIVATE_BASE_URL is required".to_string()));
        }
        Ok(())
    }

    /// PostgreSQL connection string built from the `DB_*` settings.
    pub fn database_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            self.db_user, self.db_password, self.db_host, self.db_port, self.db_name, self.db_ssl_mode
        )
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.app_port))
    }

    pub fn activation_token_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.activation_token_ttl_secs.min(MAX_TOKEN_TTL_SECS) as i64)
    }

    pub fn identity_token_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.identity_token_ttl_secs.min(MAX_TOKEN_TTL_SECS) as i64)
    }

    pub fn hash_timeout(&self) -> Duration {
        Duration::from_secs(self.hash_timeout_secs)
    }

    pub fn outbound_timeout(&self) -> Duration {
        Duration::from_secs(self.outbound_timeout_secs)
    }
}
