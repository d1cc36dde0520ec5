//! `dcgmi` command-line source.
//!
//! Runs `dcgmi dmon` once per tick and parses its report. The fake host
//! engine answers these calls with injected values, so this path exercises
//! the same pipeline a real DCGM deployment would.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use fakegpu_common::{Field, Sample, field_id_list};
use tokio::process::Command;
use tracing::{debug, trace};

use crate::collector::CollectError;

/// Runs `dcgmi dmon` and turns its report into samples.
#[derive(Debug, Clone)]
pub struct DcgmiSource {
    path: PathBuf,
    timeout: Duration,
}

impl DcgmiSource {
    pub fn new(path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            path: path.into(),
            timeout,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fail unless the binary exists.
    pub fn ensure_available(&self) -> Result<(), CollectError> {
        if self.path.is_file() {
            Ok(())
        } else {
            Err(CollectError::ToolMissing(self.path.clone()))
        }
    }

    /// Run one `dmon` pass and return its standard output.
    ///
    /// The child is killed if it outlives the timeout.
    pub async fn run_dmon(&self) -> Result<String, CollectError> {
        let fields = field_id_list();
        let mut command = Command::new(&self.path);
        command
            .args(["dmon", "-e", fields.as_str(), "-c", "1"])
            .stdin(Stdio::null())
            .kill_on_drop(true);

        debug!(path = %self.path.display(), fields = %fields, "Running dcgmi dmon");

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| CollectError::Timeout(self.timeout))??;

        if !output.status.success() {
            return Err(CollectError::CommandFailed {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8(output.stdout)?)
    }

    /// Run `dmon` and parse the report.
    pub async fn collect(&self) -> Result<Vec<Sample>, CollectError> {
        let report = self.run_dmon().await?;
        Ok(parse_dmon(&report))
    }
}

/// Parse a `dcgmi dmon` report.
///
/// Device rows look like `GPU <id> <v1> <v2> ...` with values in catalog
/// order. `N/A` marks an absent field; unparsable values are dropped
/// individually. Device 0 and rows without a numeric id are skipped.
/// Samples are returned in id order.
pub fn parse_dmon(report: &str) -> Vec<Sample> {
    let mut samples: BTreeMap<u32, Sample> = BTreeMap::new();

    for line in report.lines() {
        let line = line.trim();
        if !line.starts_with("GPU ") {
            continue;
        }

        let mut parts = line.split_whitespace().skip(1);
        let device_id = match parts.next().and_then(|s| s.parse::<u32>().ok()) {
            Some(id) => id,
            None => {
                trace!(line, "Skipping row without device id");
                continue;
            }
        };
        if device_id == 0 {
            continue;
        }

        let sample = samples
            .entry(device_id)
            .or_insert_with(|| Sample::new(device_id));

        for (field, raw) in Field::ALL.iter().zip(parts) {
            if raw == "N/A" {
                continue;
            }
            match raw.parse::<f64>() {
                Ok(value) if value.is_finite() => {
                    sample.values.insert(*field, value);
                }
                _ => trace!(device_id, field = %field, raw, "Dropping unparsable value"),
            }
        }
    }

    samples.into_values().collect()
}
