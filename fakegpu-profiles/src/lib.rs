//! Synthetic metric profiles for simulated GPUs.
//!
//! A profile is a small stateful strategy that produces one device's
//! [`Sample`](fakegpu_common::Sample) per tick. Seven variants are available:
//!
//! | Profile     | Behaviour                                              |
//! |-------------|--------------------------------------------------------|
//! | `static`    | per-device baseline with small jitter                  |
//! | `stable`    | like `static`, jitter about a third as wide            |
//! | `spike`     | 20% chance per tick of a load spike                    |
//! | `wave`      | 60-tick sinusoid with a per-device phase               |
//! | `degrading` | temperature/power creep up, throughput creeps down     |
//! | `faulty`    | intermittent fault episodes of 3-10 ticks              |
//! | `chaos`     | uniform noise over each field's full domain            |
//!
//! The [`ProfileEngine`] owns one [`ProfileState`] per device together with
//! the random source and advances all of them once per tick.

pub mod engine;
pub mod kind;
pub mod state;
mod variants;

pub use engine::{DeviceProfile, ProfileAssignment, ProfileEngine};
pub use kind::{ProfileKind, UnknownProfile};
pub use state::ProfileState;
