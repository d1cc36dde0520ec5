//! Per-variant value generators.
//!
//! Each generator produces a raw [`Reading`] from the device offset, the
//! profile state and fresh randomness. [`Reading::into_sample`] then applies
//! the variant's clamp bounds, rounds, and finally clamps to the registry
//! domain of every field.

use std::f64::consts::TAU;

use fakegpu_common::{FB_TOTAL_MB, Field, Sample};
use rand::Rng;

/// Raw, unclamped values for one tick.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Reading {
    pub temp: f64,
    pub power: f64,
    pub gpu_util: f64,
    pub mem_util: f64,
    pub sm_clock: f64,
    pub mem_clock: f64,
    pub fb_used: f64,
}

/// Variant-specific clamp bounds for temperature and power.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Bounds {
    pub temp: (f64, f64),
    pub power: (f64, f64),
}

const UTIL_BOUNDS: (f64, f64) = (0.0, 100.0);
const FB_USED_BOUNDS: (f64, f64) = (2048.0, 14336.0);

const STATIC_BOUNDS: Bounds = Bounds {
    temp: (45.0, 85.0),
    power: (100.0, 300.0),
};
const STABLE_BOUNDS: Bounds = Bounds {
    temp: (45.0, 90.0),
    power: (100.0, 350.0),
};
const SPIKE_BOUNDS: Bounds = Bounds {
    temp: (45.0, 95.0),
    power: (100.0, 350.0),
};
const WAVE_BOUNDS: Bounds = STABLE_BOUNDS;
const DEGRADING_BOUNDS: Bounds = SPIKE_BOUNDS;
const FAULTY_BOUNDS: Bounds = Bounds {
    temp: (45.0, 100.0),
    power: (50.0, 350.0),
};
const CHAOS_BOUNDS: Bounds = FAULTY_BOUNDS;

/// Power levels a faulting device jumps between.
const FAULT_POWER_LEVELS: [f64; 4] = [50.0, 100.0, 300.0, 350.0];

/// Ticks per wave period.
pub(crate) const WAVE_PERIOD_TICKS: f64 = 60.0;

fn clamp(value: f64, (lo, hi): (f64, f64)) -> f64 {
    value.clamp(lo, hi)
}

fn finish(field: Field, value: f64) -> f64 {
    field.domain().clamp(value.round())
}

impl Reading {
    pub fn into_sample(self, device_id: u32, bounds: Bounds) -> Sample {
        let fb_used = finish(Field::FbUsed, clamp(self.fb_used, FB_USED_BOUNDS));

        Sample::new(device_id)
            .with_value(Field::GpuTemp, finish(Field::GpuTemp, clamp(self.temp, bounds.temp)))
            .with_value(
                Field::PowerUsage,
                finish(Field::PowerUsage, clamp(self.power, bounds.power)),
            )
            .with_value(
                Field::GpuUtilization,
                finish(Field::GpuUtilization, clamp(self.gpu_util, UTIL_BOUNDS)),
            )
            .with_value(
                Field::MemCopyUtilization,
                finish(Field::MemCopyUtilization, clamp(self.mem_util, UTIL_BOUNDS)),
            )
            .with_value(Field::SmClock, finish(Field::SmClock, self.sm_clock))
            .with_value(Field::MemClock, finish(Field::MemClock, self.mem_clock))
            .with_value(Field::FbTotal, FB_TOTAL_MB)
            .with_value(Field::FbUsed, fb_used)
            .with_value(Field::FbFree, finish(Field::FbFree, FB_TOTAL_MB - fb_used))
    }
}

/// Uniform integer jitter in `[lo, hi]`.
fn jitter<R: Rng + ?Sized>(rng: &mut R, lo: i64, hi: i64) -> f64 {
    rng.random_range(lo..=hi) as f64
}

/// Zero-based device offset used for per-device baselines.
fn offset(device_id: u32) -> f64 {
    device_id.saturating_sub(1) as f64
}

pub(crate) fn static_reading<R: Rng + ?Sized>(device_id: u32, rng: &mut R) -> (Reading, Bounds) {
    let o = offset(device_id);
    let reading = Reading {
        temp: 50.0 + o * 5.0 + jitter(rng, 0, 5),
        power: 150.0 + o * 20.0 + jitter(rng, -10, 10),
        gpu_util: 30.0 + o * 10.0 + jitter(rng, -5, 5),
        mem_util: 40.0 + o * 5.0 + jitter(rng, -5, 5),
        sm_clock: 1400.0 + jitter(rng, -50, 100),
        mem_clock: 877.0 + jitter(rng, -20, 0),
        fb_used: 4096.0 + o * 1024.0 + jitter(rng, -512, 512),
    };
    (reading, STATIC_BOUNDS)
}

pub(crate) fn stable_reading<R: Rng + ?Sized>(device_id: u32, rng: &mut R) -> (Reading, Bounds) {
    let o = offset(device_id);
    let reading = Reading {
        temp: 55.0 + o * 3.0 + jitter(rng, -1, 1),
        power: 180.0 + o * 15.0 + jitter(rng, -3, 3),
        gpu_util: 50.0 + o * 5.0 + jitter(rng, -2, 2),
        mem_util: 45.0 + o * 3.0 + jitter(rng, -2, 2),
        sm_clock: 1400.0 + jitter(rng, -10, 10),
        mem_clock: 877.0 + jitter(rng, -5, 5),
        fb_used: 6144.0 + o * 512.0 + jitter(rng, -100, 100),
    };
    (reading, STABLE_BOUNDS)
}

pub(crate) fn spike_reading<R: Rng + ?Sized>(device_id: u32, rng: &mut R) -> (Reading, Bounds) {
    let o = offset(device_id);
    let spiking = rng.random_bool(0.20);

    let reading = if spiking {
        Reading {
            temp: 75.0 + jitter(rng, 0, 15),
            power: 280.0 + jitter(rng, 0, 50),
            gpu_util: 90.0 + jitter(rng, 0, 10),
            mem_util: 85.0 + jitter(rng, 0, 15),
            sm_clock: 1400.0 + jitter(rng, -100, 200),
            mem_clock: 877.0 + jitter(rng, -20, 20),
            fb_used: 12288.0 + jitter(rng, 0, 2048),
        }
    } else {
        Reading {
            temp: 50.0 + o * 4.0 + jitter(rng, -5, 5),
            power: 150.0 + o * 15.0 + jitter(rng, -10, 10),
            gpu_util: 25.0 + o * 8.0 + jitter(rng, -10, 10),
            mem_util: 30.0 + o * 5.0 + jitter(rng, -10, 10),
            sm_clock: 1400.0 + jitter(rng, -50, 50),
            mem_clock: 877.0 + jitter(rng, -20, 20),
            fb_used: 4096.0 + o * 1024.0 + jitter(rng, -1024, 1024),
        }
    };
    (reading, SPIKE_BOUNDS)
}

/// Phase of the wave profile at `tick` for `device_id`.
pub(crate) fn wave_phase(tick: u64, phase_offset: f64, device_id: u32) -> f64 {
    (tick as f64 / WAVE_PERIOD_TICKS) * TAU + phase_offset + 0.5 * device_id as f64
}

pub(crate) fn wave_reading(device_id: u32, tick: u64, phase_offset: f64) -> (Reading, Bounds) {
    let w = wave_phase(tick, phase_offset, device_id).sin();
    let reading = Reading {
        temp: 60.0 + w * 20.0,
        power: 200.0 + w * 80.0,
        gpu_util: 50.0 + w * 40.0,
        mem_util: 50.0 + w * 40.0 * 0.8,
        sm_clock: 1400.0 + w * 200.0,
        mem_clock: 877.0 + w * 100.0,
        fb_used: 8192.0 + w * 4096.0,
    };
    (reading, WAVE_BOUNDS)
}

/// Degradation factor after `tick` ticks, capped at 0.5.
pub(crate) fn degradation(tick: u64) -> f64 {
    (tick as f64 / 200.0).min(0.5)
}

pub(crate) fn degrading_reading<R: Rng + ?Sized>(tick: u64, rng: &mut R) -> (Reading, Bounds) {
    let d = degradation(tick);
    let reading = Reading {
        temp: 50.0 + d * 30.0 + jitter(rng, -3, 3),
        power: 150.0 + d * 100.0 + jitter(rng, -10, 10),
        gpu_util: 70.0 - d * 30.0 + jitter(rng, -5, 5),
        mem_util: 60.0 - d * 20.0 + jitter(rng, -5, 5),
        sm_clock: 1400.0 - d * 300.0 + jitter(rng, -50, 50),
        mem_clock: 877.0 - d * 100.0 + jitter(rng, -20, 20),
        fb_used: 6144.0 + jitter(rng, -1024, 1024),
    };
    (reading, DEGRADING_BOUNDS)
}

pub(crate) fn faulty_reading<R: Rng + ?Sized>(
    device_id: u32,
    faulting: bool,
    rng: &mut R,
) -> (Reading, Bounds) {
    let o = offset(device_id);
    let reading = if faulting {
        Reading {
            temp: 85.0 + jitter(rng, 0, 10),
            power: FAULT_POWER_LEVELS[rng.random_range(0..FAULT_POWER_LEVELS.len())],
            gpu_util: jitter(rng, 0, 20),
            mem_util: jitter(rng, 0, 25),
            sm_clock: 800.0 + jitter(rng, -200, 200),
            mem_clock: 500.0 + jitter(rng, -100, 100),
            fb_used: 2048.0 + jitter(rng, 0, 1024),
        }
    } else {
        Reading {
            temp: 55.0 + o * 4.0 + jitter(rng, -5, 5),
            power: 170.0 + o * 15.0 + jitter(rng, -10, 10),
            gpu_util: 60.0 + o * 5.0 + jitter(rng, -10, 10),
            mem_util: 55.0 + o * 3.0 + jitter(rng, -10, 10),
            sm_clock: 1400.0 + jitter(rng, -50, 50),
            mem_clock: 877.0 + jitter(rng, -20, 20),
            fb_used: 7168.0 + o * 512.0 + jitter(rng, -512, 512),
        }
    };
    (reading, FAULTY_BOUNDS)
}

/// Uniform noise over the full domain of every field.
pub(crate) fn chaos_reading<R: Rng + ?Sized>(rng: &mut R) -> (Reading, Bounds) {
    let mut draw = |field: Field| {
        let domain = field.domain();
        jitter(&mut *rng, domain.min as i64, domain.max as i64)
    };
    let reading = Reading {
        temp: draw(Field::GpuTemp),
        power: draw(Field::PowerUsage),
        gpu_util: draw(Field::GpuUtilization),
        mem_util: draw(Field::MemCopyUtilization),
        sm_clock: draw(Field::SmClock),
        mem_clock: draw(Field::MemClock),
        fb_used: draw(Field::FbUsed),
    };
    (reading, CHAOS_BOUNDS)
}
