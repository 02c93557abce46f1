//! Server configuration from command-line flags and `UPTASK_*` variables.

use clap::Parser;
use std::net::SocketAddr;
use thiserror::Error;

pub const MIN_SECRET_BYTES: usize = 16;

/// Runtime configuration of the UpTask server.
#[derive(Parser, Debug, Clone)]
#[command(name = "uptask-server", version, about = "UpTask collaboration server")]
pub struct ServerConfig {
    /// Address the HTTP listener binds to.
    #[arg(long, env = "UPTASK_LISTEN", default_value = "0.0.0.0:4000")]
    pub listen: SocketAddr,

    /// SQLite database file, or `:memory:`.
    #[arg(long, env = "UPTASK_DATABASE", default_value = "uptask.sqlite3")]
    pub database: String,

    /// HMAC secret for session tokens.
    #[arg(long, env = "UPTASK_SESSION_SECRET", hide_env_values = true)]
    pub session_secret: String,

    #[arg(long, env = "UPTASK_SESSION_TTL_HOURS", default_value = "24")]
    pub session_ttl_hours: u64,

    /// Base URL used in confirmation and recovery links.
    #[arg(long, env = "UPTASK_FRONTEND_URL", default_value = "http://localhost:5173")]
    pub frontend_url: String,

    /// Extra browser origins allowed to call the API with credentials. The
    /// frontend's origin is always allowed.
    #[arg(long = "allowed-origin", env = "UPTASK_ALLOWED_ORIGINS", value_delimiter = ',')]
    pub allowed_origins: Vec<String>,

    /// Mark the session cookie `Secure`.
    #[arg(long, env = "UPTASK_SECURE_COOKIES")]
    pub secure_cookies: bool,

    /// Defaults to `debug` in debug builds and `info` otherwise.
    #[arg(long, env = "UPTASK_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Absolute directory for rotating log files; stderr when unset.
    #[arg(long, env = "UPTASK_LOG_DIR")]
    pub log_dir: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("session secret must be at least {MIN_SECRET_BYTES} bytes")]
    SecretTooShort,
    #[error("session ttl must be between 1 and 8760 hours")]
    InvalidTtl,
    #[error("database path must not be empty")]
    EmptyDatabase,
    #[error("frontend url must start with http:// or https://")]
    InvalidFrontendUrl,
    #[error("allowed origin `{0}` must start with http:// or https://")]
    InvalidOrigin(String),
}

impl ServerConfig {
    /// Rejects configurations the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session_secret.len() < MIN_SECRET_BYTES {
            return Err(ConfigError::SecretTooShort);
        }
        if !(1..=8760).contains(&self.session_ttl_hours) {
            return Err(ConfigError::InvalidTtl);
        }
        if self.database.trim().is_empty() {
            return Err(ConfigError::EmptyDatabase);
        }
        if !is_http_url(&self.frontend_url) {
            return Err(ConfigError::InvalidFrontendUrl);
        }
        if let Some(origin) = self.allowed_origins.iter().find(|origin| !is_http_url(origin)) {
            return Err(ConfigError::InvalidOrigin(origin.clone()));
        }
        Ok(())
    }

    /// Origins answered with credentialed CORS headers: the frontend's first,
    /// then the extra ones, without paths or duplicates.
    pub fn cors_origins(&self) -> Vec<String> {
        let mut origins: Vec<String> = Vec::new();
        for url in std::iter::once(&self.frontend_url).chain(&self.allowed_origins) {
            let origin = origin_of(url);
            if !origin.is_empty() && !origins.contains(&origin) {
                origins.push(origin);
            }
        }
        origins
    }

    pub fn is_in_memory(&self) -> bool {
        self.database.trim() == ":memory:"
    }

    pub fn log_level(&self) -> &str {
        self.log_level
            .as_deref()
            .unwrap_or(uptask_core::default_log_level())
    }
}

fn is_http_url(value: &str) -> bool {
    let value = value.trim();
    value.starts_with("http://") || value.starts_with("https://")
}

/// `scheme://host[:port]` part of `url`.
fn origin_of(url: &str) -> String {
    let url = url.trim();
    let authority_start = url.find("://").map_or(0, |index| index + 3);
    let end = url[authority_start..]
        .find('/')
        .map_or(url.len(), |index| authority_start + index);
    url[..end].to_ascii_lowercase()
}
