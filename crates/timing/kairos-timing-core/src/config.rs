//! Core configuration for kairos-timing-core.

use serde::{Deserialize, Serialize};

/// Bounds on the iterative parts of the engine. Pathological documents (for
/// example mutually dependent timing cycles that never stabilize) are cut off
/// at these limits with a logged warning instead of spinning.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Maximum resample rounds within one seek before giving up on a fixpoint.
    pub max_seek_iterations: usize,

    /// Maximum interval-update rounds within one element sample.
    pub max_interval_updates: usize,

    /// Maximum pending events retained per element before new ones are dropped.
    pub max_queued_events: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_seek_iterations: 64,
            max_interval_updates: 128,
            max_queued_events: 256,
        }
    }
}
