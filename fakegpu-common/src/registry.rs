//! Static catalog of the telemetry fields exported by fakegpu.
//!
//! Field ids follow the DCGM numbering so that the exposition document and
//! the `dcgmi dmon` report line up column for column.

use std::fmt;

/// Inclusive value range a field is clamped to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueDomain {
    pub min: f64,
    pub max: f64,
}

impl ValueDomain {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Clamp a value into the domain.
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    /// Check whether a value lies inside the domain.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// A registered telemetry field.
///
/// The discriminant is the DCGM field id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
pub enum Field {
    GpuTemp = 150,
    PowerUsage = 155,
    GpuUtilization = 203,
    MemCopyUtilization = 204,
    SmClock = 210,
    MemClock = 211,
    FbTotal = 251,
    FbUsed = 252,
    FbFree = 253,
}

/// Total framebuffer size reported for every simulated device, in MB.
pub const FB_TOTAL_MB: f64 = 16384.0;

impl Field {
    /// All fields in catalog order.
    pub const ALL: [Field; 9] = [
        Field::GpuTemp,
        Field::PowerUsage,
        Field::GpuUtilization,
        Field::MemCopyUtilization,
        Field::SmClock,
        Field::MemClock,
        Field::FbTotal,
        Field::FbUsed,
        Field::FbFree,
    ];

    /// Numeric DCGM field id.
    pub fn id(self) -> u16 {
        self as u16
    }

    /// Look up a field by its DCGM id.
    pub fn from_id(id: u16) -> Option<Field> {
        Self::ALL.iter().copied().find(|f| f.id() == id)
    }

    /// Exposition metric name.
    pub fn name(self) -> &'static str {
        match self {
            Field::GpuTemp => "dcgm_gpu_temp",
            Field::PowerUsage => "dcgm_power_usage",
            Field::GpuUtilization => "dcgm_gpu_utilization",
            Field::MemCopyUtilization => "dcgm_mem_copy_utilization",
            Field::SmClock => "dcgm_sm_clock",
            Field::MemClock => "dcgm_mem_clock",
            Field::FbTotal => "dcgm_fb_total",
            Field::FbUsed => "dcgm_fb_used",
            Field::FbFree => "dcgm_fb_free",
        }
    }

    /// Help text for the `# HELP` line.
    pub fn help(self) -> &'static str {
        match self {
            Field::GpuTemp => "GPU temperature in Celsius",
            Field::PowerUsage => "Power usage in watts",
            Field::GpuUtilization => "GPU utilization percentage",
            Field::MemCopyUtilization => "Memory utilization percentage",
            Field::SmClock => "SM clock in MHz",
            Field::MemClock => "Memory clock in MHz",
            Field::FbTotal => "Total framebuffer in MB",
            Field::FbUsed => "Used framebuffer in MB",
            Field::FbFree => "Free framebuffer in MB",
        }
    }

    /// Declared value domain.
    pub fn domain(self) -> ValueDomain {
        match self {
            Field::GpuTemp => ValueDomain::new(45.0, 100.0),
            Field::PowerUsage => ValueDomain::new(50.0, 350.0),
            Field::GpuUtilization | Field::MemCopyUtilization => ValueDomain::new(0.0, 100.0),
            Field::SmClock => ValueDomain::new(600.0, 1800.0),
            Field::MemClock => ValueDomain::new(400.0, 1000.0),
            Field::FbTotal => ValueDomain::new(FB_TOTAL_MB, FB_TOTAL_MB),
            Field::FbUsed | Field::FbFree => ValueDomain::new(2048.0, 14336.0),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Comma-separated field ids in catalog order, as passed to `dcgmi dmon -e`.
pub fn field_id_list() -> String {
    Field::ALL
        .iter()
        .map(|f| f.id().to_string())
        .collect::<Vec<_>>()
        .join(",")
}
