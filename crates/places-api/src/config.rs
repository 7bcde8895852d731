//! Server configuration from the environment.

use std::net::SocketAddr;

use places_db::{Error, PoolConfig, Result, DEFAULT_DATABASE_URL};

/// Default listen host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default listen port.
pub const DEFAULT_PORT: u16 = 8000;

/// Which origins CORS admits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedOrigins {
    Any,
    List(Vec<String>),
}

impl AllowedOrigins {
    /// Parse a comma-separated origin list. Empty or `*` admits any origin.
    pub fn parse(raw: &str) -> Self {
        let origins: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if origins.is_empty() || origins.iter().any(|o| o == "*") {
            AllowedOrigins::Any
        } else {
            AllowedOrigins::List(origins)
        }
    }
}

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    /// Required `X-API-Key` value. `None` disables the check.
    pub api_key: Option<String>,
    pub allowed_origins: AllowedOrigins,
    pub pool: PoolConfig,
}

impl ApiConfig {
    /// Read `DATABASE_URL`, `HOST`, `PORT`, `API_KEY`, `ALLOWED_ORIGINS`
    /// and the `DB_*` pool variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let port = match lookup("PORT") {
            None => DEFAULT_PORT,
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("PORT must be a port number, got '{raw}'")))?,
        };

        Ok(Self {
            database_url: lookup("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            host: lookup("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            api_key: lookup("API_KEY").filter(|k| !k.is_empty()),
            allowed_origins: AllowedOrigins::parse(&lookup("ALLOWED_ORIGINS").unwrap_or_default()),
            pool: PoolConfig::from_lookup(&lookup)?,
        })
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| Error::Config(format!("invalid listen address: {e}")))
    }
}
