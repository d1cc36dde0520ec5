//! Per-device profile state.

use std::f64::consts::TAU;

use fakegpu_common::Sample;
use rand::Rng;

use crate::kind::ProfileKind;
use crate::variants;

/// Probability per tick that a healthy faulty-profile device starts faulting.
pub const FAULT_ENTRY_PROBABILITY: f64 = 0.10;

/// Range of fault episode lengths, in ticks.
pub const FAULT_DURATION_TICKS: std::ops::RangeInclusive<u32> = 3..=10;

/// Mutable simulation state of one device.
///
/// Owned by exactly one device and advanced once per tick by [`apply`](Self::apply).
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileState {
    /// Which profile drives this device.
    pub variant: ProfileKind,

    /// Number of ticks evaluated so far.
    pub tick_count: u64,

    /// Whether the device is inside a fault episode (faulty profile only).
    pub fault_active: bool,

    /// Remaining fault ticks after the current one.
    pub fault_countdown: u32,

    /// Wave phase offset, drawn once at construction.
    pub phase_offset: f64,
}

impl ProfileState {
    /// Create the initial state for a variant.
    pub fn new<R: Rng + ?Sized>(variant: ProfileKind, rng: &mut R) -> Self {
        let phase_offset = match variant {
            ProfileKind::Wave => rng.random_range(0.0..TAU),
            _ => 0.0,
        };

        Self {
            variant,
            tick_count: 0,
            fault_active: false,
            fault_countdown: 0,
            phase_offset,
        }
    }

    /// Advance one tick and produce the device's sample.
    pub fn apply<R: Rng + ?Sized>(&mut self, device_id: u32, rng: &mut R) -> Sample {
        self.tick_count += 1;

        let (reading, bounds) = match self.variant {
            ProfileKind::Static => variants::static_reading(device_id, rng),
            ProfileKind::Stable => variants::stable_reading(device_id, rng),
            ProfileKind::Spike => variants::spike_reading(device_id, rng),
            ProfileKind::Wave => {
                variants::wave_reading(device_id, self.tick_count, self.phase_offset)
            }
            ProfileKind::Degrading => variants::degrading_reading(self.tick_count, rng),
            ProfileKind::Faulty => {
                self.advance_fault(rng);
                variants::faulty_reading(device_id, self.fault_active, rng)
            }
            ProfileKind::Chaos => variants::chaos_reading(rng),
        };

        reading.into_sample(device_id, bounds)
    }

    /// Current degradation factor (degrading profile).
    pub fn degradation(&self) -> f64 {
        variants::degradation(self.tick_count)
    }

    /// Step the Normal/Faulting machine.
    ///
    /// The entry draw only happens while healthy. Once entered with countdown
    /// `C`, the episode stays active for `C` more ticks.
    fn advance_fault<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        if !self.fault_active {
            if rng.random_bool(FAULT_ENTRY_PROBABILITY) {
                self.fault_active = true;
                self.fault_countdown = rng.random_range(FAULT_DURATION_TICKS);
            }
        } else if self.fault_countdown == 0 {
            self.fault_active = false;
        } else {
            self.fault_countdown -= 1;
        }
    }
}
