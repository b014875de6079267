//! Worker configuration loaded from environment variables.

use std::time::Duration;

use projections::ProcessorConfig;

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }
}

/// Worker configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `pretty` or `json` (default: `pretty`)
/// - `DATABASE_URL`: PostgreSQL event store; unset means in-memory
/// - `PROJECTION_BATCH_SIZE`: events per query (default: `100`)
/// - `PROJECTION_POLL_INTERVAL_MS`: delay between catch-up passes (default: `500`)
/// - `PROJECTION_MAX_RETRIES`: retries of a failing event (default: `3`)
/// - `PROJECTION_RETRY_BACKOFF_MS`: first retry delay, doubled per retry (default: `100`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub batch_size: usize,
    pub poll_interval_ms: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from any key lookup. Unparseable values fall
    /// back to the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        fn parse_with<T: std::str::FromStr>(
            lookup: &impl Fn(&str) -> Option<String>,
            key: &str,
        ) -> Option<T> {
            lookup(key).and_then(|v| v.trim().parse().ok())
        }

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_with(&lookup, "PORT").unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: lookup("LOG_FORMAT")
                .map(|v| LogFormat::parse(&v))
                .unwrap_or(defaults.log_format),
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            batch_size: parse_with(&lookup, "PROJECTION_BATCH_SIZE")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.batch_size),
            poll_interval_ms: parse_with(&lookup, "PROJECTION_POLL_INTERVAL_MS")
                .filter(|ms: &u64| *ms > 0)
                .unwrap_or(defaults.poll_interval_ms),
            max_retries: parse_with(&lookup, "PROJECTION_MAX_RETRIES").unwrap_or(defaults.max_retries),
            retry_backoff_ms: parse_with(&lookup, "PROJECTION_RETRY_BACKOFF_MS")
                .unwrap_or(defaults.retry_backoff_ms),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn processor_config(&self) -> ProcessorConfig {
        ProcessorConfig {
            batch_size: self.batch_size,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            max_retries: self.max_retries,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            database_url: None,
            batch_size: 100,
            poll_interval_ms: 500,
            max_retries: 3,
            retry_backoff_ms: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = from_pairs(&[]);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.database_url.is_none());
        assert_eq!(config.batch_size, 100);
    }

    #[test]
    fn test_overrides() {
        let config = from_pairs(&[
            ("PORT", "8080"),
            ("LOG_FORMAT", "JSON"),
            ("DATABASE_URL", "postgres://localhost/catalog"),
            ("PROJECTION_BATCH_SIZE", "25"),
            ("PROJECTION_POLL_INTERVAL_MS", "50"),
            ("PROJECTION_MAX_RETRIES", "0"),
            ("PROJECTION_RETRY_BACKOFF_MS", "10"),
        ]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/catalog")
        );

        let processor = config.processor_config();
        assert_eq!(processor.batch_size, 25);
        assert_eq!(processor.poll_interval, Duration::from_millis(50));
        assert_eq!(processor.max_retries, 0);
        assert_eq!(processor.retry_backoff, Duration::from_millis(10));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = from_pairs(&[
            ("PORT", "not-a-port"),
            ("PROJECTION_BATCH_SIZE", "0"),
            ("PROJECTION_POLL_INTERVAL_MS", "0"),
            ("DATABASE_URL", "  "),
        ]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.poll_interval_ms, 500);
        assert!(config.processor_config().poll_interval > Duration::ZERO);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }
}
