//! Mapping from device samples to Prometheus exposition text.

use std::fmt::Write;

use fakegpu_common::{Device, Field, Sample};

/// Label set attached to every series of one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceLabels {
    /// Ordered `(name, value)` pairs.
    pub labels: Vec<(&'static str, String)>,
}

impl DeviceLabels {
    /// Build the DCGM-compatible label set for a device.
    pub fn new(device: &Device, hostname: &str) -> Self {
        Self {
            labels: vec![
                ("gpu", device.id.to_string()),
                ("UUID", device.unique_id.clone()),
                ("pci_bus_id", device.bus_address.clone()),
                ("device", device.alias()),
                ("modelName", device.model.clone()),
                ("Hostname", hostname.to_string()),
            ],
        }
    }

    /// Value of a label, if present.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Format labels for Prometheus exposition format.
    pub fn format(&self) -> String {
        if self.labels.is_empty() {
            return String::new();
        }

        let parts: Vec<String> = self
            .labels
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", k, escape_label_value(v)))
            .collect();

        format!("{{{}}}", parts.join(","))
    }
}

/// Render one complete exposition document.
///
/// The header block lists every registered field in catalog order, even
/// when no device reported it. Data lines follow, sorted lexicographically.
/// Samples for device 0 are skipped.
pub fn render_document<'a, I>(entries: I) -> String
where
    I: IntoIterator<Item = (&'a DeviceLabels, &'a Sample)>,
{
    let mut output = String::with_capacity(4096);

    for field in Field::ALL {
        writeln!(output, "# HELP {} {}", field.name(), field.help()).ok();
        writeln!(output, "# TYPE {} gauge", field.name()).ok();
    }

    let mut lines = Vec::new();
    for (labels, sample) in entries {
        if sample.device_id == 0 {
            continue;
        }

        let label_str = labels.format();
        for (field, value) in &sample.values {
            lines.push(format!(
                "{}{} {}",
                field.name(),
                label_str,
                format_value(*value)
            ));
        }
    }
    lines.sort();

    for line in lines {
        output.push_str(&line);
        output.push('\n');
    }

    output
}

/// Escape special characters in label values.
pub fn escape_label_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\n' => result.push_str("\\n"),
            _ => result.push(c),
        }
    }
    result
}

/// Format a sample value: integral values without a fraction.
pub fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value.is_sign_positive() {
            "+Inf".to_string()
        } else {
            "-Inf".to_string()
        }
    } else if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels_for(id: u32) -> DeviceLabels {
        DeviceLabels::new(&Device::synthetic(id, id.saturating_sub(1), 4), "node-a")
    }

    #[test]
    fn test_device_labels() {
        let labels = labels_for(2);

        assert_eq!(labels.get("gpu"), Some("2"));
        assert_eq!(labels.get("device"), Some("nvidia2"));
        assert_eq!(labels.get("Hostname"), Some("node-a"));
        assert_eq!(labels.get("modelName"), Some("Tesla V100-SXM2-32GB"));
        assert_eq!(labels.get("pci_bus_id"), Some("00000000:02:00.0"));
        assert_eq!(
            labels.get("UUID"),
            Some("GPU-00000002-fake-dcgm-0002-000400000002")
        );
    }

    #[test]
    fn test_format_labels() {
        let labels = labels_for(1).format();
        assert!(labels.starts_with("{gpu=\"1\",UUID=\"GPU-00000001"));
        assert!(labels.ends_with("Hostname=\"node-a\"}"));
    }

    #[test]
    fn test_header_for_every_field_without_devices() {
        let doc = render_document(std::iter::empty());

        for field in Field::ALL {
            let help = format!("# HELP {} ", field.name());
            let kind = format!("# TYPE {} gauge\n", field.name());
            assert_eq!(doc.matches(&help).count(), 1, "{}", field);
            assert_eq!(doc.matches(&kind).count(), 1, "{}", field);
        }
        assert!(doc.ends_with(" gauge\n"));
        assert!(!doc.ends_with("\n\n"));
    }

    #[test]
    fn test_data_lines_sorted_and_skip_device_zero() {
        let l0 = labels_for(0);
        let l1 = labels_for(1);
        let l2 = labels_for(2);
        let s0 = Sample::new(0).with_value(Field::GpuTemp, 40.0);
        let s1 = Sample::new(1)
            .with_value(Field::GpuTemp, 55.0)
            .with_value(Field::PowerUsage, 150.5);
        let s2 = Sample::new(2).with_value(Field::GpuTemp, 60.0);

        let doc = render_document([(&l2, &s2), (&l0, &s0), (&l1, &s1)]);
        let data: Vec<&str> = doc.lines().filter(|l| !l.starts_with('#')).collect();

        assert_eq!(data.len(), 3);
        let mut sorted = data.clone();
        sorted.sort();
        assert_eq!(data, sorted);

        assert!(!doc.contains("gpu=\"0\""));
        assert!(doc.contains("dcgm_power_usage{gpu=\"1\","));
        assert!(data.iter().any(|l| l.ends_with(" 150.5")));
        assert!(data.iter().any(|l| l.ends_with(" 60")));
        assert!(doc.ends_with("\n"));
        assert!(!doc.ends_with("\n\n"));
    }

    #[test]
    fn test_escape_label_value() {
        assert_eq!(escape_label_value("simple"), "simple");
        assert_eq!(escape_label_value("with\"quote"), "with\\\"quote");
        assert_eq!(escape_label_value("with\\backslash"), "with\\\\backslash");
        assert_eq!(escape_label_value("with\nnewline"), "with\\nnewline");
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(42.0), "42");
        assert_eq!(format_value(3.25), "3.25");
        assert_eq!(format_value(f64::NAN), "NaN");
        assert_eq!(format_value(f64::INFINITY), "+Inf");
        assert_eq!(format_value(f64::NEG_INFINITY), "-Inf");
    }
}
