use std::time::Duration;

use axum::http::HeaderValue;

/// Error raised when an environment variable holds an unusable value.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got '{value}'")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development against a
/// compute backend on `localhost:50051`.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8080`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// Compute backend host (default: `localhost`).
    pub compute_host: String,
    /// Compute backend port (default: `50051`).
    pub compute_port: u16,
    /// Per-call deadline for backend RPCs. `None` waits indefinitely.
    pub compute_rpc_timeout_secs: Option<u64>,
    /// How long shutdown waits for in-flight backend calls (default: `5`).
    pub compute_shutdown_timeout_secs: u64,
    /// Frames buffered per WebSocket subscriber before events are dropped
    /// (default: `256`).
    pub subscriber_queue_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            cors_origins: vec!["http://localhost:5173".into()],
            compute_host: "localhost".into(),
            compute_port: 50051,
            compute_rpc_timeout_secs: None,
            compute_shutdown_timeout_secs: 5,
            subscriber_queue_capacity: mlhybrid_events::hub::DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                         | Default                 |
    /// |---------------------------------|-------------------------|
    /// | `HOST`                          | `0.0.0.0`               |
    /// | `PORT`                          | `8080`                  |
    /// | `CORS_ORIGINS`                  | `http://localhost:5173` |
    /// | `COMPUTE_HOST`                  | `localhost`             |
    /// | `COMPUTE_PORT`                  | `50051`                 |
    /// | `COMPUTE_RPC_TIMEOUT_SECS`      | unset (no deadline)     |
    /// | `COMPUTE_SHUTDOWN_TIMEOUT_SECS` | `5`                     |
    /// | `SUBSCRIBER_QUEUE_CAPACITY`     | `256`                   |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ServerConfig::from_env`] with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let host = lookup("HOST").unwrap_or(defaults.host);
        let port = parse_or("PORT", lookup("PORT"), "a valid u16", defaults.port)?;

        let cors_origins = match lookup("CORS_ORIGINS") {
            Some(raw) => raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            None => defaults.cors_origins,
        };
        // Misconfigured origins fail at startup rather than at first request.
        for origin in &cors_origins {
            if HeaderValue::from_str(origin).is_err() {
                return Err(ConfigError::Invalid {
                    var: "CORS_ORIGINS",
                    expected: "a comma-separated list of origins",
                    value: origin.clone(),
                });
            }
        }

        let compute_host = lookup("COMPUTE_HOST").unwrap_or(defaults.compute_host);
        let compute_port = parse_or(
            "COMPUTE_PORT",
            lookup("COMPUTE_PORT"),
            "a valid u16",
            defaults.compute_port,
        )?;

        let compute_rpc_timeout_secs = match lookup("COMPUTE_RPC_TIMEOUT_SECS") {
            Some(raw) if !raw.trim().is_empty() => Some(parse_or(
                "COMPUTE_RPC_TIMEOUT_SECS",
                Some(raw),
                "a valid u64",
                0,
            )?),
            _ => None,
        };

        let compute_shutdown_timeout_secs = parse_or(
            "COMPUTE_SHUTDOWN_TIMEOUT_SECS",
            lookup("COMPUTE_SHUTDOWN_TIMEOUT_SECS"),
            "a valid u64",
            defaults.compute_shutdown_timeout_secs,
        )?;

        let subscriber_queue_capacity: usize = parse_or(
            "SUBSCRIBER_QUEUE_CAPACITY",
            lookup("SUBSCRIBER_QUEUE_CAPACITY"),
            "a positive integer",
            defaults.subscriber_queue_capacity,
        )?;
        if subscriber_queue_capacity == 0 {
            return Err(ConfigError::Invalid {
                var: "SUBSCRIBER_QUEUE_CAPACITY",
                expected: "a positive integer",
                value: "0".into(),
            });
        }

        Ok(Self {
            host,
            port,
            cors_origins,
            compute_host,
            compute_port,
            compute_rpc_timeout_secs,
            compute_shutdown_timeout_secs,
            subscriber_queue_capacity,
        })
    }

    pub fn compute_rpc_timeout(&self) -> Option<Duration> {
        self.compute_rpc_timeout_secs.map(Duration::from_secs)
    }

    pub fn compute_shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.compute_shutdown_timeout_secs)
    }
}

fn parse_or<T: std::str::FromStr>(
    var: &'static str,
    raw: Option<String>,
    expected: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            var,
            expected,
            value,
        }),
    }
}
