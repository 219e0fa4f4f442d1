//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use chrono::TimeDelta;

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `DATABASE_URL`: PostgreSQL URL; in-memory stores when unset
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: `10`)
/// - `CART_TTL_DAYS`: cart entry lifetime (default: `30`)
/// - `CHECKOUT_DEADLINE_MS`: per-request checkout deadline (default: `10000`)
/// - `RECONCILIATION_WINDOW_SECS`: age of an unfinished checkout before it
///   counts as a gap (default: `300`)
/// - `RECONCILIATION_INTERVAL_SECS`: background repair period, `0` disables
///   it (default: `60`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub cart_ttl_days: i64,
    pub checkout_deadline_ms: u64,
    pub reconciliation_window_secs: i64,
    pub reconciliation_interval_secs: u64,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`. Unparseable values fall back
    /// to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_var(&lookup, "PORT").unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: lookup("LOG_FORMAT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.log_format),
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            database_max_connections: parse_var(&lookup, "DATABASE_MAX_CONNECTIONS")
                .unwrap_or(defaults.database_max_connections),
            cart_ttl_days: parse_var(&lookup, "CART_TTL_DAYS")
                .filter(|days: &i64| *days > 0)
                .unwrap_or(defaults.cart_ttl_days),
            checkout_deadline_ms: parse_var(&lookup, "CHECKOUT_DEADLINE_MS")
                .unwrap_or(defaults.checkout_deadline_ms),
            reconciliation_window_secs: parse_var(&lookup, "RECONCILIATION_WINDOW_SECS")
                .filter(|secs: &i64| *secs >= 0)
                .unwrap_or(defaults.reconciliation_window_secs),
            reconciliation_interval_secs: parse_var(&lookup, "RECONCILIATION_INTERVAL_SECS")
                .unwrap_or(defaults.reconciliation_interval_secs),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn cart_ttl(&self) -> TimeDelta {
        TimeDelta::days(self.cart_ttl_days)
    }

    pub fn checkout_deadline(&self) -> Duration {
        Duration::from_millis(self.checkout_deadline_ms)
    }

    pub fn reconciliation_window(&self) -> TimeDelta {
        TimeDelta::seconds(self.reconciliation_window_secs)
    }

    /// Returns the background repair period, or `None` when disabled.
    pub fn reconciliation_interval(&self) -> Option<Duration> {
        (self.reconciliation_interval_secs > 0)
            .then(|| Duration::from_secs(self.reconciliation_interval_secs))
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|value| value.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            database_max_connections: 10,
            cart_ttl_days: 30,
            checkout_deadline_ms: 10_000,
            reconciliation_window_secs: 300,
            reconciliation_interval_secs: 60,
        }
    }
}
