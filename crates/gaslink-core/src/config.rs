//! Engine tuning knobs. Chosen at registry construction and fixed for the
//! registry's lifetime.

use serde::{Deserialize, Serialize};

use crate::fixed::{Fixed64, Frames};

/// Tuning knobs for the oxygen link engine.
///
/// A config travels with the registry it was built with, so snapshots restore
/// the same cadence and conversion ratio they were taken under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Litres of oxygen drawn per litre of hydrogen a consumer burns.
    pub o2_per_h2: Fixed64,

    /// Frames a newly-seen node waits before classification. Each queued add
    /// pushes the shared deadline out again, so bursts (world load, blueprint
    /// paste) settle as a single batch.
    pub debounce_frames: Frames,

    /// Balance pass cadence, in frames. The pass runs with
    /// `dt = balance_interval_frames * frame_step_seconds`.
    pub balance_interval_frames: Frames,

    /// Duration of one host frame, in seconds.
    pub frame_step_seconds: Fixed64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            o2_per_h2: Fixed64::from_num(0.25),
            debounce_frames: 20,
            balance_interval_frames: 30,
            frame_step_seconds: Fixed64::from_num(1.0 / 60.0),
        }
    }
}

impl LinkConfig {
    /// Elapsed seconds covered by one balance pass.
    pub fn balance_dt(&self) -> Fixed64 {
        Fixed64::from_num(self.balance_interval_frames) * self.frame_step_seconds
    }
}
