//! Metric collector: one sampling pass rendered to exposition text.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use fakegpu_common::{Device, Sample};
use fakegpu_profiles::ProfileEngine;
use thiserror::Error;
use tracing::{debug, trace};

use crate::dcgmi::DcgmiSource;
use crate::mapping::{DeviceLabels, render_document};

/// Marker document served when `dcgmi` timed out.
pub const MARKER_TIMEOUT: &str = "# Error: dcgmi timeout\n";

/// Marker document served when `dcgmi` exited non-zero.
pub const MARKER_COMMAND_FAILED: &str = "# Error: dcgmi command failed\n";

/// Marker document served for any other collection failure.
pub const MARKER_COLLECTION_FAILED: &str = "# Error: collection failed\n";

/// A sampling pass that could not produce a document.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("dcgmi timed out after {0:?}")]
    Timeout(Duration),

    #[error("dcgmi exited with status {code:?}: {stderr}")]
    CommandFailed { code: Option<i32>, stderr: String },

    #[error("dcgmi not found at {0}")]
    ToolMissing(PathBuf),

    #[error("failed to run dcgmi: {0}")]
    Io(#[from] std::io::Error),

    #[error("dcgmi output is not valid UTF-8: {0}")]
    InvalidOutput(#[from] std::string::FromUtf8Error),
}

impl CollectError {
    /// Single-line document that replaces the cache contents.
    pub fn marker(&self) -> &'static str {
        match self {
            CollectError::Timeout(_) => MARKER_TIMEOUT,
            CollectError::CommandFailed { .. } => MARKER_COMMAND_FAILED,
            _ => MARKER_COLLECTION_FAILED,
        }
    }
}

/// Where samples come from.
pub enum DeviceSource {
    /// In-process profile engine.
    Synthetic(ProfileEngine),
    /// `dcgmi dmon` against a host engine.
    Dcgmi(DcgmiSource),
}

impl DeviceSource {
    /// Take one sample per device.
    pub async fn collect(&mut self) -> Result<Vec<Sample>, CollectError> {
        match self {
            DeviceSource::Synthetic(engine) => Ok(engine.tick()),
            DeviceSource::Dcgmi(source) => source.collect().await,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DeviceSource::Synthetic(_) => "synthetic",
            DeviceSource::Dcgmi(_) => "dcgmi",
        }
    }
}

/// Device descriptors, built on first sight and reused afterwards.
#[derive(Debug, Clone)]
pub struct DeviceDirectory {
    start_index: u32,
    total: u32,
    devices: BTreeMap<u32, Device>,
}

impl DeviceDirectory {
    /// Empty directory for `total` devices numbered from `start_index`.
    pub fn new(start_index: u32, total: u32) -> Self {
        Self {
            start_index,
            total,
            devices: BTreeMap::new(),
        }
    }

    /// Descriptor for a device id.
    pub fn lookup(&mut self, id: u32) -> &Device {
        let position = id.saturating_sub(self.start_index);
        let total = self.total;
        self.devices.entry(id).or_insert_with(|| {
            trace!(device = id, position, "Caching device descriptor");
            Device::synthetic(id, position, total)
        })
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

/// Samples devices and renders exposition documents.
pub struct MetricCollector {
    source: DeviceSource,
    directory: DeviceDirectory,
    hostname: String,
    labels: BTreeMap<u32, DeviceLabels>,
}

impl MetricCollector {
    pub fn new(source: DeviceSource, directory: DeviceDirectory, hostname: String) -> Self {
        Self {
            source,
            directory,
            hostname,
            labels: BTreeMap::new(),
        }
    }

    pub fn source(&self) -> &DeviceSource {
        &self.source
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Run one sampling pass and render it.
    pub async fn render(&mut self) -> Result<String, CollectError> {
        let samples = self.source.collect().await?;

        for sample in &samples {
            if sample.device_id == 0 || self.labels.contains_key(&sample.device_id) {
                continue;
            }
            let device = self.directory.lookup(sample.device_id);
            self.labels.insert(
                sample.device_id,
                DeviceLabels::new(device, &self.hostname),
            );
        }

        let entries = samples
            .iter()
            .filter_map(|s| self.labels.get(&s.device_id).map(|l| (l, s)));
        let document = render_document(entries);

        debug!(
            source = self.source.name(),
            devices = samples.len(),
            bytes = document.len(),
            "Rendered metrics"
        );

        Ok(document)
    }
}
