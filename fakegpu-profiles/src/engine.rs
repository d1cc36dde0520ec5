//! Profile assignment and the per-tick engine.

use fakegpu_common::{Field, Sample};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info};

use crate::kind::ProfileKind;
use crate::state::ProfileState;

/// How profiles are distributed over devices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileAssignment {
    kinds: Vec<ProfileKind>,
}

impl ProfileAssignment {
    /// Use the same profile for every device.
    pub fn uniform(kind: ProfileKind) -> Self {
        Self { kinds: vec![kind] }
    }

    /// Assign `kinds` cyclically to device positions 1, 2, 3, ...
    pub fn per_device(kinds: Vec<ProfileKind>) -> Self {
        if kinds.is_empty() {
            return Self::uniform(ProfileKind::default());
        }
        Self { kinds }
    }

    /// Build from configured names.
    ///
    /// A non-empty `per_device` list wins over `profile`. Unknown names
    /// degrade to `static` with a warning.
    pub fn from_names(profile: &str, per_device: &[String]) -> Self {
        let names: Vec<&str> = per_device
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect();

        if names.is_empty() {
            let kind = ProfileKind::from_name_or_default(profile);
            info!(profile = %kind, "Using profile '{}' for all devices", kind);
            Self::uniform(kind)
        } else {
            let kinds: Vec<ProfileKind> = names
                .iter()
                .map(|n| ProfileKind::from_name_or_default(n))
                .collect();
            info!(profiles = ?names, "Using per-device profiles");
            Self::per_device(kinds)
        }
    }

    /// Profile for the device at 1-based `position`.
    pub fn kind_for(&self, position: usize) -> ProfileKind {
        let index = position.saturating_sub(1) % self.kinds.len();
        self.kinds[index]
    }

    pub fn kinds(&self) -> &[ProfileKind] {
        &self.kinds
    }
}

impl Default for ProfileAssignment {
    fn default() -> Self {
        Self::uniform(ProfileKind::default())
    }
}

/// A device and its owned profile state.
#[derive(Debug, Clone)]
pub struct DeviceProfile {
    pub device_id: u32,
    pub state: ProfileState,
}

/// Drives every device's profile once per tick.
pub struct ProfileEngine {
    devices: Vec<DeviceProfile>,
    rng: StdRng,
}

impl ProfileEngine {
    /// Create an engine for `device_ids`, in order.
    ///
    /// With a `seed` the whole run is reproducible; otherwise the generator
    /// is seeded from the OS.
    pub fn new(
        assignment: &ProfileAssignment,
        device_ids: impl IntoIterator<Item = u32>,
        seed: Option<u64>,
    ) -> Self {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let devices = device_ids
            .into_iter()
            .enumerate()
            .map(|(i, device_id)| DeviceProfile {
                device_id,
                state: ProfileState::new(assignment.kind_for(i + 1), &mut rng),
            })
            .collect();

        Self { devices, rng }
    }

    /// Advance every device by one tick.
    pub fn tick(&mut self) -> Vec<Sample> {
        let mut samples = Vec::with_capacity(self.devices.len());

        for device in &mut self.devices {
            let sample = device.state.apply(device.device_id, &mut self.rng);
            debug!(
                device = device.device_id,
                profile = %device.state.variant,
                tick = device.state.tick_count,
                temp = sample.get(Field::GpuTemp),
                power = sample.get(Field::PowerUsage),
                util = sample.get(Field::GpuUtilization),
                "Synthesized sample"
            );
            samples.push(sample);
        }

        samples
    }

    /// Device ids in engine order.
    pub fn device_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.devices.iter().map(|d| d.device_id)
    }

    pub fn devices(&self) -> &[DeviceProfile] {
        &self.devices
    }

    /// State of one device, if it is simulated.
    pub fn state(&self, device_id: u32) -> Option<&ProfileState> {
        self.devices
            .iter()
            .find(|d| d.device_id == device_id)
            .map(|d| &d.state)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
