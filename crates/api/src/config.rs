//! Application configuration loaded from environment variables.

use std::str::FromStr;

use fulfillment::EngineSettings;

/// Log output format of the binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default `"0.0.0.0"`)
/// - `PORT`: listen port (default `3000`)
/// - `RUST_LOG`: tracing filter directive (default `"info"`)
/// - `LOG_FORMAT`: `pretty` or `json` (default `pretty`)
/// - `DATABASE_URL`: PostgreSQL connection string; unset keeps everything in memory
/// - `CANCELLATION_WINDOW_MINUTES` (default `60`)
/// - `VERIFICATION_CODE_TTL_MINUTES` (default `10`)
/// - `VERIFICATION_CODE_LENGTH` (default `6`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub cancellation_window_minutes: i64,
    pub verification_code_ttl_minutes: i64,
    pub verification_code_length: usize,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_var(&lookup, "PORT").unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: match lookup("LOG_FORMAT").as_deref() {
                Some("json") => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            cancellation_window_minutes: parse_var(&lookup, "CANCELLATION_WINDOW_MINUTES")
                .unwrap_or(defaults.cancellation_window_minutes),
            verification_code_ttl_minutes: parse_var(&lookup, "VERIFICATION_CODE_TTL_MINUTES")
                .unwrap_or(defaults.verification_code_ttl_minutes),
            verification_code_length: parse_var(&lookup, "VERIFICATION_CODE_LENGTH")
                .unwrap_or(defaults.verification_code_length),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            cancellation_window_minutes: self.cancellation_window_minutes,
            verification_code_ttl_minutes: self.verification_code_ttl_minutes,
            verification_code_length: self.verification_code_length,
        }
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        let engine = EngineSettings::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            database_url: None,
            cancellation_window_minutes: engine.cancellation_window_minutes,
            verification_code_ttl_minutes: engine.verification_code_ttl_minutes,
            verification_code_length: engine.verification_code_length,
        }
    }
}
