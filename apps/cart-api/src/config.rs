//! Cart API configuration module.
//!
//! Configuration is loaded from environment variables with fallback to
//! defaults.

use std::env;

/// Cart API configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Socket address the HTTP server binds to.
    pub bind_addr: String,

    /// Path to the SQLite database file.
    pub database_path: String,

    /// Whether cart reservations may drive stock below zero.
    pub allow_backorder: bool,
}

impl ApiConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let config = ApiConfig {
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string()),

            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "./merx.db".to_string()),

            allow_backorder: env::var("ALLOW_BACKORDER")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("ALLOW_BACKORDER".to_string()))?,
        };

        Ok(config)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        // Only assert the defaults when the variables are not set in the
        // test environment.
        if env::var("BIND_ADDR").is_err() && env::var("ALLOW_BACKORDER").is_err() {
            let config = ApiConfig::load().unwrap();
            assert_eq!(config.bind_addr, "127.0.0.1:8080");
            assert!(config.allow_backorder);
        }
    }
}
