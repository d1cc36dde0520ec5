//! Long-run behavioural properties of the synthetic profiles.

use std::f64::consts::TAU;

use fakegpu_common::Field;
use fakegpu_profiles::{ProfileAssignment, ProfileEngine, ProfileKind, ProfileState};
use rand::SeedableRng;
use rand::rngs::StdRng;

const DEVICES: std::ops::RangeInclusive<u32> = 1..=16;

#[test]
fn test_every_profile_stays_within_domains() {
    for kind in ProfileKind::ALL {
        let mut engine =
            ProfileEngine::new(&ProfileAssignment::uniform(kind), DEVICES, Some(kind as u64));

        for tick in 0..10_000 {
            for sample in engine.tick() {
                for (field, value) in &sample.values {
                    assert!(
                        field.domain().contains(*value),
                        "{} device {} tick {}: {} = {} outside {:?}",
                        kind,
                        sample.device_id,
                        tick,
                        field,
                        value,
                        field.domain()
                    );
                }
                let used = sample.get(Field::FbUsed).unwrap();
                let free = sample.get(Field::FbFree).unwrap();
                assert_eq!(used + free, sample.get(Field::FbTotal).unwrap());
            }
        }
    }
}

#[test]
fn test_fault_episode_lasts_exactly_countdown_ticks() {
    let mut rng = StdRng::seed_from_u64(2024);
    let mut state = ProfileState::new(ProfileKind::Faulty, &mut rng);
    let mut episodes = 0;

    for _ in 0..20_000 {
        let was_active = state.fault_active;
        state.apply(1, &mut rng);

        if !was_active && state.fault_active {
            episodes += 1;
            let countdown = state.fault_countdown;
            assert!((3..=10).contains(&countdown));

            for further in 1..=countdown {
                state.apply(1, &mut rng);
                assert!(
                    state.fault_active,
                    "fault ended after {} of {} ticks",
                    further, countdown
                );
            }

            state.apply(1, &mut rng);
            assert!(!state.fault_active, "fault outlived countdown {}", countdown);
        }
    }

    assert!(episodes > 100, "only {} fault episodes", episodes);
}

#[test]
fn test_faulting_values_are_disjoint_from_normal() {
    let mut rng = StdRng::seed_from_u64(77);
    let mut state = ProfileState::new(ProfileKind::Faulty, &mut rng);

    for _ in 0..5_000 {
        let sample = state.apply(1, &mut rng);
        let util = sample.get(Field::GpuUtilization).unwrap();
        let sm_clock = sample.get(Field::SmClock).unwrap();

        if state.fault_active {
            assert!(util <= 20.0);
            assert!(sm_clock <= 1000.0);
        } else {
            assert!(util >= 50.0);
            assert!(sm_clock >= 1350.0);
        }
    }
}

#[test]
fn test_fault_entry_rate_is_near_nominal_while_healthy() {
    let mut rng = StdRng::seed_from_u64(5);
    let mut state = ProfileState::new(ProfileKind::Faulty, &mut rng);
    let mut healthy_ticks = 0u32;
    let mut entries = 0u32;

    for _ in 0..50_000 {
        let was_active = state.fault_active;
        state.apply(1, &mut rng);
        if !was_active {
            healthy_ticks += 1;
            if state.fault_active {
                entries += 1;
            }
        }
    }

    let rate = entries as f64 / healthy_ticks as f64;
    assert!((0.08..0.12).contains(&rate), "entry rate {}", rate);
}

#[test]
fn test_wave_temperature_tracks_sinusoid() {
    let mut rng = StdRng::seed_from_u64(60);
    let mut state = ProfileState::new(ProfileKind::Wave, &mut rng);
    let device_id = 1;

    let mut observed = Vec::new();
    let mut reference = Vec::new();
    for _ in 0..60 {
        let sample = state.apply(device_id, &mut rng);
        let phase = (state.tick_count as f64 / 60.0) * TAU
            + state.phase_offset
            + 0.5 * device_id as f64;
        observed.push(sample.get(Field::GpuTemp).unwrap());
        reference.push(phase.sin());
    }

    let r = correlation(&observed, &reference);
    assert!(r > 0.95, "correlation {}", r);
}

#[test]
fn test_spike_rate_is_near_twenty_percent() {
    let mut rng = StdRng::seed_from_u64(20);
    let mut state = ProfileState::new(ProfileKind::Spike, &mut rng);

    let spikes = (0..20_000)
        .filter(|_| state.apply(1, &mut rng).get(Field::GpuUtilization).unwrap() >= 90.0)
        .count();

    // Device 1 baseline utilization tops out at 35, so >= 90 only occurs when spiking.
    let rate = spikes as f64 / 20_000.0;
    assert!((0.17..0.23).contains(&rate), "spike rate {}", rate);
}

#[test]
fn test_degrading_trend() {
    let mut rng = StdRng::seed_from_u64(9);
    let mut state = ProfileState::new(ProfileKind::Degrading, &mut rng);

    let early: Vec<_> = (0..20).map(|_| state.apply(1, &mut rng)).collect();
    for _ in 0..200 {
        state.apply(1, &mut rng);
    }
    let late: Vec<_> = (0..20).map(|_| state.apply(1, &mut rng)).collect();

    let mean = |samples: &[fakegpu_common::Sample], field: Field| {
        samples.iter().map(|s| s.get(field).unwrap()).sum::<f64>() / samples.len() as f64
    };

    assert!(mean(&late, Field::GpuTemp) > mean(&early, Field::GpuTemp) + 10.0);
    assert!(mean(&late, Field::PowerUsage) > mean(&early, Field::PowerUsage) + 30.0);
    assert!(mean(&late, Field::GpuUtilization) < mean(&early, Field::GpuUtilization) - 8.0);
    assert!(mean(&late, Field::SmClock) < mean(&early, Field::SmClock) - 100.0);
}

fn correlation(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len() as f64;
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b) {
        cov += (x - mean_a) * (y - mean_b);
        var_a += (x - mean_a).powi(2);
        var_b += (y - mean_b).powi(2);
    }

    cov / (var_a.sqrt() * var_b.sqrt())
}
