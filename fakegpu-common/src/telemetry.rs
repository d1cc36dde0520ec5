use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::registry::Field;

/// GPU models cycled through when synthesizing device descriptors.
pub const SYNTHETIC_MODELS: [&str; 6] = [
    "Tesla V100-SXM2-16GB",
    "Tesla V100-SXM2-32GB",
    "A100-SXM4-40GB",
    "A100-SXM4-80GB",
    "H100-SXM5-80GB",
    "A100-PCIE-40GB",
];

/// Static identity of a device.
///
/// Id 0 is reserved for the baseline injected device and is never reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Device index (>= 1).
    pub id: u32,

    /// Marketing model name (e.g., "A100-SXM4-40GB").
    pub model: String,

    /// Vendor unique id (e.g., "GPU-00000001-fake-dcgm-...").
    pub unique_id: String,

    /// PCI bus address (e.g., "00000000:01:00.0").
    pub bus_address: String,
}

impl Device {
    /// Build the descriptor the fake manager injects for device `id`.
    ///
    /// Model, unique id and bus address follow the device's zero-based
    /// `position` among the `total` simulated devices, not its id.
    pub fn synthetic(id: u32, position: u32, total: u32) -> Self {
        let ordinal = position.saturating_add(1);
        Self {
            id,
            model: SYNTHETIC_MODELS[position as usize % SYNTHETIC_MODELS.len()].to_string(),
            unique_id: format!(
                "GPU-{:08x}-fake-dcgm-{:04x}-{:04x}{:08x}",
                ordinal, ordinal, total, ordinal
            ),
            bus_address: format!("00000000:{:02x}:00.0", ordinal),
        }
    }

    /// Short alias used in the `device` label (e.g., "nvidia1").
    pub fn alias(&self) -> String {
        format!("nvidia{}", self.id)
    }
}

/// Values produced for one device during one tick.
///
/// A sample is built once and never mutated after it leaves its producer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Sample {
    /// Device this sample belongs to.
    pub device_id: u32,

    /// Field values; absent fields were not reported this tick.
    pub values: BTreeMap<Field, f64>,
}

impl Sample {
    /// Create an empty sample for a device.
    pub fn new(device_id: u32) -> Self {
        Self {
            device_id,
            values: BTreeMap::new(),
        }
    }

    /// Builder-style insert.
    pub fn with_value(mut self, field: Field, value: f64) -> Self {
        self.values.insert(field, value);
        self
    }

    /// Value of a field, if reported.
    pub fn get(&self, field: Field) -> Option<f64> {
        self.values.get(&field).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_descriptor() {
        let device = Device::synthetic(1, 0, 4);
        assert_eq!(device.model, "Tesla V100-SXM2-16GB");
        assert_eq!(device.bus_address, "00000000:01:00.0");
        assert_eq!(device.unique_id, "GPU-00000001-fake-dcgm-0001-000400000001");
        assert_eq!(device.alias(), "nvidia1");
    }

    #[test]
    fn test_synthetic_models_cycle() {
        assert_eq!(Device::synthetic(6, 5, 8).model, "A100-PCIE-40GB");
        assert_eq!(Device::synthetic(7, 6, 8).model, "Tesla V100-SXM2-16GB");
        assert_eq!(Device::synthetic(17, 16, 20).bus_address, "00000000:11:00.0");
    }

    #[test]
    fn test_descriptor_follows_position_not_id() {
        let device = Device::synthetic(3, 0, 2);
        assert_eq!(device.id, 3);
        assert_eq!(device.alias(), "nvidia3");
        assert_eq!(device.model, "Tesla V100-SXM2-16GB");
        assert_eq!(device.bus_address, "00000000:01:00.0");
        assert_eq!(device.unique_id, "GPU-00000001-fake-dcgm-0001-000200000001");
    }

    #[test]
    fn test_sample_builder() {
        let sample = Sample::new(2)
            .with_value(Field::GpuTemp, 55.0)
            .with_value(Field::PowerUsage, 180.0);

        assert_eq!(sample.device_id, 2);
        assert_eq!(sample.len(), 2);
        assert_eq!(sample.get(Field::GpuTemp), Some(55.0));
        assert_eq!(sample.get(Field::SmClock), None);
    }
}
