//! fakegpu common library
//!
//! Shared types and utilities for the fakegpu simulator and exporter:
//!
//! - [`registry`] - Static catalog of telemetry fields (`Field`, `ValueDomain`)
//! - [`telemetry`] - Device descriptors and per-tick samples (`Device`, `Sample`)
//! - [`config`] - Logging settings shared by every binary
//! - [`error`] - Error types

pub mod config;
pub mod error;
pub mod registry;
pub mod telemetry;

// Re-export commonly used types at the crate root
pub use config::{LogFormat, LoggingConfig};
pub use error::{Error, Result};
pub use registry::{FB_TOTAL_MB, Field, ValueDomain, field_id_list};
pub use telemetry::{Device, SYNTHETIC_MODELS, Sample};

/// Initialize tracing with the given configuration.
///
/// `RUST_LOG` takes precedence over the configured level. Supports two
/// output formats:
/// - `LogFormat::Text` (default): Human-readable text format
/// - `LogFormat::Json`: Structured JSON format for log aggregation systems
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
    }

    Ok(())
}
