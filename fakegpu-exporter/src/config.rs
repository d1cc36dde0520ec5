//! Configuration for the GPU exporter.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use fakegpu_common::LoggingConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::retry::RetryPolicy;

/// Above this many synthetic devices a warning is logged.
const MANY_DEVICES: u32 = 100;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete exporter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// HTTP endpoint settings.
    #[serde(default)]
    pub http: HttpConfig,

    /// Where samples come from and how often.
    #[serde(default)]
    pub collection: CollectionConfig,

    /// Simulated devices.
    #[serde(default)]
    pub devices: DevicesConfig,

    /// Unix domain socket proxy.
    #[serde(default)]
    pub uds: UdsConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Address to listen on (default: "0.0.0.0:9400").
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Path for metrics endpoint (default: "/metrics").
    #[serde(default = "default_path")]
    pub path: String,
}

fn default_listen() -> String {
    "0.0.0.0:9400".to_string()
}

fn default_path() -> String {
    "/metrics".to_string()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            path: default_path(),
        }
    }
}

/// Sample source.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Profile engine inside the exporter.
    #[default]
    Synthetic,
    /// `dcgmi dmon` against a (fake) host engine.
    Dcgmi,
}

/// Collection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfig {
    #[serde(default)]
    pub source: SourceKind,

    /// Seconds between cache refreshes (default: 5).
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,

    /// Path to the `dcgmi` binary.
    #[serde(default = "default_dcgmi_path")]
    pub dcgmi_path: String,

    /// Timeout for one `dcgmi` invocation (default: 5).
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
}

fn default_refresh_interval() -> u64 {
    5
}

fn default_dcgmi_path() -> String {
    "/usr/local/dcgm/share/dcgm_tests/apps/amd64/dcgmi".to_string()
}

fn default_command_timeout() -> u64 {
    5
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::default(),
            refresh_interval_secs: default_refresh_interval(),
            dcgmi_path: default_dcgmi_path(),
            command_timeout_secs: default_command_timeout(),
        }
    }
}

impl CollectionConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

/// Simulated device configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevicesConfig {
    /// Number of devices (default: 4).
    #[serde(default = "default_count")]
    pub count: u32,

    /// Id of the first device (default: 1).
    #[serde(default = "default_start_index")]
    pub start_index: u32,

    /// Profile for every device (default: "static").
    #[serde(default = "default_profile")]
    pub profile: String,

    /// Per-device profiles, assigned cyclically. Overrides `profile` when non-empty.
    #[serde(default)]
    pub profiles: Vec<String>,

    /// Value of the `Hostname` label, or "auto" for the system hostname.
    #[serde(default = "default_hostname")]
    pub hostname: String,

    /// RNG seed for reproducible runs.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_count() -> u32 {
    4
}

fn default_start_index() -> u32 {
    1
}

fn default_profile() -> String {
    "static".to_string()
}

fn default_hostname() -> String {
    "auto".to_string()
}

impl Default for DevicesConfig {
    fn default() -> Self {
        Self {
            count: default_count(),
            start_index: default_start_index(),
            profile: default_profile(),
            profiles: Vec::new(),
            hostname: default_hostname(),
            seed: None,
        }
    }
}

impl DevicesConfig {
    /// Configured device ids, in order.
    pub fn device_ids(&self) -> std::ops::Range<u32> {
        self.start_index..self.start_index.saturating_add(self.count)
    }

    /// Get the hostname, resolving "auto" to the actual hostname.
    pub fn get_hostname(&self) -> String {
        if self.hostname == "auto" {
            hostname::get()
                .map(|h| h.to_string_lossy().to_string())
                .unwrap_or_else(|_| "unknown".to_string())
        } else {
            self.hostname.clone()
        }
    }
}

/// Unix domain socket configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UdsConfig {
    /// Serve the socket at all (default: false).
    #[serde(default)]
    pub enabled: bool,

    /// Socket path (default: "/var/run/dcgm/metrics.sock").
    #[serde(default = "default_socket_path")]
    pub path: String,

    /// Socket file permissions (octal, e.g., 0o666 = 438).
    #[serde(default = "default_socket_mode")]
    pub socket_mode: u32,

    /// Metrics URL to proxy. Defaults to the local HTTP endpoint.
    #[serde(default)]
    pub upstream: Option<String>,

    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_socket_path() -> String {
    "/var/run/dcgm/metrics.sock".to_string()
}

fn default_socket_mode() -> u32 {
    0o666
}

impl Default for UdsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_socket_path(),
            socket_mode: default_socket_mode(),
            upstream: None,
            retry: RetryConfig::default(),
        }
    }
}

/// Upstream retry configuration for the socket proxy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Per-attempt request timeout.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

fn default_max_attempts() -> u32 {
    10
}

fn default_initial_delay() -> u64 {
    500
}

fn default_multiplier() -> f64 {
    1.5
}

fn default_max_delay() -> u64 {
    5000
}

fn default_request_timeout() -> u64 {
    5000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay(),
            multiplier: default_multiplier(),
            max_delay_ms: default_max_delay(),
            request_timeout_ms: default_request_timeout(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.initial_delay_ms),
            multiplier: self.multiplier,
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl ExporterConfig {
    /// Load configuration from a JSON5 file.
    ///
    /// Not validated here: command-line and environment overrides are layered
    /// on first, and the caller validates the merged result.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: ExporterConfig = json5::from_str(&content)?;
        debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Parse configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: ExporterConfig = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parsed listen address.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.http.listen.parse().map_err(|_| {
            ConfigError::Validation(format!("Invalid listen address: {}", self.http.listen))
        })
    }

    /// URL the socket proxy fetches.
    ///
    /// Unless configured, this is the local metrics route on `bound_port`,
    /// the port the HTTP listener actually bound.
    pub fn upstream_url(&self, bound_port: u16) -> String {
        match &self.uds.upstream {
            Some(url) => url.clone(),
            None => format!("http://127.0.0.1:{}{}", bound_port, self.http.path),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.listen_addr()?;

        if !self.http.path.starts_with('/') {
            return Err(ConfigError::Validation(
                "Metrics path must start with /".to_string(),
            ));
        }

        if self.http.path == "/health" {
            return Err(ConfigError::Validation(
                "Metrics path cannot be /health".to_string(),
            ));
        }

        if self.collection.refresh_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "refresh_interval_secs must be > 0".to_string(),
            ));
        }

        if self.collection.command_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "command_timeout_secs must be > 0".to_string(),
            ));
        }

        if self.devices.count == 0 {
            return Err(ConfigError::Validation(
                "devices.count must be > 0".to_string(),
            ));
        }

        // Id 0 is the baseline device and is never exported
        if self.devices.start_index == 0 {
            return Err(ConfigError::Validation(
                "devices.start_index must be >= 1".to_string(),
            ));
        }

        if self.devices.count > MANY_DEVICES {
            warn!(
                count = self.devices.count,
                "More than {} devices configured", MANY_DEVICES
            );
        }

        let retry = &self.uds.retry;
        if retry.max_attempts == 0 {
            return Err(ConfigError::Validation(
                "uds.retry.max_attempts must be > 0".to_string(),
            ));
        }

        if !(retry.multiplier >= 1.0 && retry.multiplier.is_finite()) {
            return Err(ConfigError::Validation(
                "uds.retry.multiplier must be >= 1".to_string(),
            ));
        }

        if retry.request_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "uds.retry.request_timeout_ms must be > 0".to_string(),
            ));
        }

        if let Some(upstream) = &self.uds.upstream {
            if !upstream.starts_with("http://") {
                return Err(ConfigError::Validation(format!(
                    "Invalid upstream URL: {}",
                    upstream
                )));
            }
        }

        Ok(())
    }
}
