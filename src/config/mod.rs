//! Configuration module for the gateway service
//!
//! This module handles loading and parsing configuration from TOML files.

use axum::http::HeaderName;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

fn default_enabled() -> bool {
    true
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to
    #[serde(default = "default_port")]
    pub port: u16,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_timeout() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timeout: default_timeout(),
        }
    }
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Whether metrics are enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Path to expose metrics
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_metrics_path(),
        }
    }
}

/// Health check configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Whether health check is enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Path for health check endpoint
    #[serde(default = "default_health_path")]
    pub path: String,
}

fn default_health_path() -> String {
    "/health".to_string()
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_health_path(),
        }
    }
}

/// Access token guard configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenConfig {
    /// Whether the access token guard is enabled
    #[serde(default)]
    pub enabled: bool,
    /// Header name to check for the access token
    #[serde(default = "default_access_token_header_name")]
    pub header_name: String,
    /// List of valid tokens (any one of these tokens will be accepted)
    #[serde(default)]
    pub tokens: Vec<String>,
    /// Position in the pre-filter chain
    #[serde(default = "default_access_token_order")]
    pub order: u32,
}

fn default_access_token_header_name() -> String {
    "Authorization".to_string()
}

fn default_access_token_order() -> u32 {
    10
}

impl Default for AccessTokenConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            header_name: default_access_token_header_name(),
            tokens: vec![],
            order: default_access_token_order(),
        }
    }
}

/// Request ID filter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestIdConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_request_id_header_name")]
    pub header_name: String,
    /// Position in the pre-filter chain
    #[serde(default)]
    pub order: u32,
}

fn default_request_id_header_name() -> String {
    "X-Request-Id".to_string()
}

impl Default for RequestIdConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            header_name: default_request_id_header_name(),
            order: 0,
        }
    }
}

/// Log line format
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human readable text
    #[default]
    Plain,
    /// One JSON object per line
    Json,
}

/// Where a log output writes
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum LogTarget {
    #[default]
    Stdout,
    Stderr,
    /// Append to the file given by `path`
    File,
}

/// Log severity, ordered from most to least verbose
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// One log output: a format, a destination and an inclusive level range.
///
/// For example, errors can go both to stderr as JSON and to a file by
/// declaring two outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogOutputConfig {
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default)]
    pub target: LogTarget,
    /// File path, required when `target = "file"`
    #[serde(default)]
    pub path: Option<String>,
    /// Lowest level written (inclusive)
    #[serde(default = "default_min_level")]
    pub min_level: LogLevel,
    /// Highest level written (inclusive)
    #[serde(default = "default_max_level")]
    pub max_level: LogLevel,
}

fn default_min_level() -> LogLevel {
    LogLevel::Info
}

fn default_max_level() -> LogLevel {
    LogLevel::Error
}

impl Default for LogOutputConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Plain,
            target: LogTarget::Stdout,
            path: None,
            min_level: default_min_level(),
            max_level: default_max_level(),
        }
    }
}

impl LogOutputConfig {
    /// Check the output on its own
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.min_level > self.max_level {
            anyhow::bail!(
                "Log output min_level {:?} is above max_level {:?}",
                self.min_level,
                self.max_level
            );
        }
        if self.target == LogTarget::File && self.path.as_deref().map_or(true, str::is_empty) {
            anyhow::bail!("Log output with target 'file' requires a path");
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Outputs; empty means a single plain stdout output
    #[serde(default)]
    pub outputs: Vec<LogOutputConfig>,
}

impl LoggingConfig {
    /// Configured outputs, or the default one when none are configured
    pub fn effective_outputs(&self) -> Vec<LogOutputConfig> {
        if self.outputs.is_empty() {
            vec![LogOutputConfig::default()]
        } else {
            self.outputs.clone()
        }
    }
}

/// Main gateway configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub access_token: AccessTokenConfig,
    #[serde(default)]
    pub request_id: RequestIdConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl GatewayConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Load configuration from a TOML string
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        let config: GatewayConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.access_token.enabled && self.access_token.tokens.is_empty() {
            anyhow::bail!("Access token guard is enabled but no tokens are configured");
        }

        for (section, header) in [
            ("access_token", &self.access_token.header_name),
            ("request_id", &self.request_id.header_name),
        ] {
            if header.parse::<HeaderName>().is_err() {
                anyhow::bail!("{}.header_name '{}' is not a valid header name", section, header);
            }
        }

        for (name, path) in [("health", &self.health.path), ("metrics", &self.metrics.path)] {
            if !path.starts_with('/') {
                anyhow::bail!("{} path '{}' must start with '/'", name, path);
            }
        }
        if self.health.enabled && self.metrics.enabled && self.health.path == self.metrics.path {
            anyhow::bail!(
                "Health and metrics endpoints share the path '{}'",
                self.health.path
            );
        }

        for output in &self.logging.outputs {
            output.validate()?;
        }

        Ok(())
    }

    /// Get server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
