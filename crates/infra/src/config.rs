//! Configuration loading and representation.
//!
//! Built once at process start from environment variables and passed by
//! reference to whatever needs it.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `DATABASE_URL` | unset (in-memory store) |
//! | `ANALYZER_URL` / `JAVA_SERVICE_URL` | `http://localhost:8080` |
//! | `ANALYZER_TIMEOUT_SECS` | `30` |
//! | `BIND_ADDR` | `0.0.0.0` |
//! | `PORT` | `5000` |
//! | `SERVICE_NAME` | `text-intake-gateway` |
//! | `DB_MAX_CONNECTIONS` | `10` |

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_ANALYZER_URL: &str = "http://localhost:8080";
pub const DEFAULT_ANALYZER_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_SERVICE_NAME: &str = "text-intake-gateway";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} has an invalid value {value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(var: &'static str, value: &str, reason: impl ToString) -> Self {
        Self::Invalid {
            var,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Gateway configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Postgres connection string. `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    /// Base URL of the analyzer; `/api/analyze` is appended.
    pub analyzer_url: String,
    pub analyzer_timeout: Duration,
    pub bind_addr: IpAddr,
    pub port: u16,
    /// Reported by `/health`.
    pub service_name: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            db_max_connections: 10,
            analyzer_url: DEFAULT_ANALYZER_URL.to_string(),
            analyzer_timeout: DEFAULT_ANALYZER_TIMEOUT,
            bind_addr: IpAddr::from([0, 0, 0, 0]),
            port: DEFAULT_PORT,
            service_name: DEFAULT_SERVICE_NAME.to_string(),
        }
    }
}

impl GatewayConfig {
    /// Read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup (tests pass a map instead of the real environment).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let analyzer_url = get("ANALYZER_URL")
            .or_else(|| get("JAVA_SERVICE_URL"))
            .unwrap_or(defaults.analyzer_url);
        if !(analyzer_url.starts_with("http://") || analyzer_url.starts_with("https://")) {
            return Err(ConfigError::invalid(
                "ANALYZER_URL",
                &analyzer_url,
                "must start with http:// or https://",
            ));
        }

        let analyzer_timeout = match get("ANALYZER_TIMEOUT_SECS") {
            Some(raw) => match parse::<u64>("ANALYZER_TIMEOUT_SECS", &raw)? {
                0 => return Err(ConfigError::invalid("ANALYZER_TIMEOUT_SECS", &raw, "must be positive")),
                secs => Duration::from_secs(secs),
            },
            None => defaults.analyzer_timeout,
        };

        let db_max_connections = match get("DB_MAX_CONNECTIONS") {
            Some(raw) => match parse::<u32>("DB_MAX_CONNECTIONS", &raw)? {
                0 => return Err(ConfigError::invalid("DB_MAX_CONNECTIONS", &raw, "must be positive")),
                n => n,
            },
            None => defaults.db_max_connections,
        };

        Ok(Self {
            database_url: get("DATABASE_URL"),
            db_max_connections,
            analyzer_url,
            analyzer_timeout,
            bind_addr: get("BIND_ADDR")
                .map(|raw| parse("BIND_ADDR", &raw))
                .transpose()?
                .unwrap_or(defaults.bind_addr),
            port: get("PORT")
                .map(|raw| parse("PORT", &raw))
                .transpose()?
                .unwrap_or(defaults.port),
            service_name: get("SERVICE_NAME").unwrap_or(defaults.service_name),
        })
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }
}

fn parse<T>(var: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e| ConfigError::invalid(var, raw, e))
}
