//! Configuration loading from TOML files and environment variables.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::error::ServerError;

/// Main configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub stream: StreamConfig,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address for the event server.
    pub listen_addr: String,

    /// Graceful shutdown timeout (seconds).
    pub shutdown_timeout_secs: u64,

    /// Body frames queued per stream before writes wait on the client.
    pub channel_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            shutdown_timeout_secs: 30,
            channel_capacity: 16,
        }
    }
}

impl ServerConfig {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Settings for the `/events` tick stream.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Delay between events (milliseconds).
    pub interval_ms: u64,

    /// Reconnection hint sent with each event (milliseconds, 0 = none).
    pub retry_ms: u64,

    /// Event type name.
    pub event_name: String,

    /// Stop after this many events (0 = never).
    pub max_events: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            retry_ms: 3000,
            event_name: "tick".to_string(),
            max_events: 0,
        }
    }
}

impl StreamConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn retry(&self) -> Duration {
        Duration::from_millis(self.retry_ms)
    }
}

/// Metrics/Prometheus configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Enable Prometheus metrics endpoint.
    pub enabled: bool,

    /// Listen address for metrics server.
    pub listen_addr: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "warn").
    pub level: String,

    /// Output format: "pretty" or "json".
    pub format: String,

    /// Log every outgoing event (at debug level, target `sseserver::events`).
    pub log_events: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            log_events: false,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ServerError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ServerError::Config(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        toml::from_str(&content)
            .map_err(|e| ServerError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Load configuration from file, then apply environment variable overrides.
    pub fn load<P: AsRef<Path>>(path: Option<P>) -> Result<Self, ServerError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };

        config.apply_env_overrides();

        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from a key lookup (the environment, in practice).
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        fn parsed<T: std::str::FromStr>(v: Option<String>) -> Option<T> {
            v.and_then(|v| v.parse().ok())
        }

        // Server overrides
        if let Some(v) = var("SSESERVER_LISTEN_ADDR") {
            self.server.listen_addr = v;
        }
        if let Some(n) = parsed(var("SSESERVER_SHUTDOWN_TIMEOUT")) {
            self.server.shutdown_timeout_secs = n;
        }
        if let Some(n) = parsed(var("SSESERVER_CHANNEL_CAPACITY")) {
            self.server.channel_capacity = n;
        }

        // Stream overrides
        if let Some(n) = parsed(var("SSESERVER_EVENT_INTERVAL_MS")) {
            self.stream.interval_ms = n;
        }
        if let Some(n) = parsed(var("SSESERVER_RETRY_MS")) {
            self.stream.retry_ms = n;
        }
        if let Some(n) = parsed(var("SSESERVER_MAX_EVENTS")) {
            self.stream.max_events = n;
        }

        // Metrics overrides
        if let Some(v) = var("SSESERVER_METRICS_ENABLED") {
            self.metrics.enabled = is_truthy(&v);
        }
        if let Some(v) = var("SSESERVER_METRICS_ADDR") {
            self.metrics.listen_addr = v;
        }

        // Logging overrides
        if let Some(v) = var("SSESERVER_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Some(v) = var("SSESERVER_LOG_FORMAT") {
            self.logging.format = v;
        }
        if let Some(v) = var("SSESERVER_LOG_EVENTS") {
            self.logging.log_events = is_truthy(&v);
        }
    }
}

fn is_truthy(v: &str) -> bool {
    v == "true" || v == "1"
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.listen_addr, "127.0.0.1:8080");
        assert_eq!(config.stream.event_name, "tick");
        assert_eq!(config.stream.retry(), Duration::from_secs(3));
        assert!(!config.logging.log_events);
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            [server]
            listen_addr = "0.0.0.0:9000"

            [stream]
            interval_ms = 250
            max_events = 5

            [logging]
            log_events = true
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.listen_addr, "0.0.0.0:9000");
        assert_eq!(config.server.channel_capacity, 16);
        assert_eq!(config.stream.interval(), Duration::from_millis(250));
        assert_eq!(config.stream.max_events, 5);
        assert_eq!(config.stream.event_name, "tick");
        assert!(config.logging.log_events);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[metrics]\nenabled = true\nlisten_addr = \"127.0.0.1:9999\"").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert!(config.metrics.enabled);
        assert_eq!(config.metrics.listen_addr, "127.0.0.1:9999");
    }

    #[test]
    fn test_from_file_errors() {
        let err = Config::from_file("/nonexistent/sseserver.toml").unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server\nbroken").unwrap();
        let err = Config::from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("SSESERVER_LISTEN_ADDR", "0.0.0.0:1"),
            ("SSESERVER_MAX_EVENTS", "10"),
            ("SSESERVER_RETRY_MS", "not a number"),
            ("SSESERVER_LOG_EVENTS", "1"),
            ("SSESERVER_METRICS_ENABLED", "yes"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.server.listen_addr, "0.0.0.0:1");
        assert_eq!(config.stream.max_events, 10);
        assert_eq!(config.stream.retry_ms, 3000);
        assert!(config.logging.log_events);
        assert!(!config.metrics.enabled);
    }
}
