//! Server configuration from environment variables.
//!
//! Component settings (inference backends, storage, image policy) have their
//! own `from_env()` constructors; this module gathers the server-level ones.

use axum::http::HeaderValue;
use tracing::warn;

use craftgen_core::defaults::SERVER_PORT;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_DATABASE_URL: &str = "postgres://localhost/craftgen";
const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000";

/// Server-level settings.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Comma-separated list as given in `ALLOWED_ORIGINS`.
    pub allowed_origins: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: SERVER_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            allowed_origins: split_origins(DEFAULT_ALLOWED_ORIGINS),
        }
    }
}

impl AppConfig {
    /// Read `HOST`, `PORT`, `DATABASE_URL` and `ALLOWED_ORIGINS`.
    ///
    /// An unparseable port falls back to the default.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            database_url: std::env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            allowed_origins: std::env::var("ALLOWED_ORIGINS")
                .map(|v| split_origins(&v))
                .unwrap_or(defaults.allowed_origins),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Origins as header values for the CORS layer. Invalid entries are
    /// skipped with a warning.
    pub fn cors_origins(&self) -> Vec<HeaderValue> {
        self.allowed_origins
            .iter()
            .filter_map(|origin| match origin.parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin = %origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect()
    }
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.bind_address(), "0.0.0.0:3000");
        assert_eq!(config.allowed_origins, vec!["http://localhost:3000"]);
    }

    #[test]
    fn test_split_origins_trims_and_skips_empty() {
        assert_eq!(
            split_origins(" https://a.example.com, ,https://b.example.com "),
            vec!["https://a.example.com", "https://b.example.com"]
        );
    }

    #[test]
    fn test_cors_origins_skip_invalid() {
        let config = AppConfig {
            allowed_origins: vec!["https://ok.example.com".to_string(), "bad\norigin".to_string()],
            ..AppConfig::default()
        };
        assert_eq!(config.cors_origins().len(), 1);
    }
}
