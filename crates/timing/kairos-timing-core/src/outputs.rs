//! Output contracts from one sampling pass.
//!
//! Outputs carry the renderer-facing sample notifications and the semantic
//! time events produced while seeking, plus the wait hint telling the caller
//! when the next sample is worth taking. The consumer applies samples to the
//! host scene; the engine itself never renders.

use serde::{Deserialize, Serialize};

use crate::ids::ElementId;
use crate::time::TimeValue;

/// Renderer-facing notification for one element this pass.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum SampleNotice {
    /// The element entered its active interval.
    ToActive { element: ElementId, begin: f32 },
    /// The element left its active interval; `frozen` reports whether the
    /// last value persists.
    ToInactive { element: ElementId, frozen: bool },
    /// Any persisted fill value should be discarded.
    RemoveFill { element: ElementId },
    /// Active sample at a local time within the current simple duration.
    SampledAt {
        element: ElementId,
        simple_time: f32,
        simple_dur: TimeValue,
        repeat_iteration: u32,
    },
    /// Frozen exactly on a simple-duration boundary; present the final value
    /// of that iteration.
    SampledLastValue {
        element: ElementId,
        repeat_iteration: u32,
    },
}

/// Discrete time events emitted while seeking.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum TimingNotice {
    Begin {
        element: ElementId,
        time: f32,
    },
    End {
        element: ElementId,
        time: f32,
    },
    Repeat {
        element: ElementId,
        time: f32,
        iteration: u32,
    },
}

/// Outputs returned by `TimedDocument::seek_to`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Outputs {
    #[serde(default)]
    pub samples: Vec<SampleNotice>,
    #[serde(default)]
    pub events: Vec<TimingNotice>,
    /// Seconds until something is scheduled to change: zero while any element
    /// is active, indefinite when nothing is pending.
    pub next_update: TimeValue,
}

impl Default for Outputs {
    fn default() -> Self {
        Self {
            samples: Vec::new(),
            events: Vec::new(),
            next_update: TimeValue::INDEFINITE,
        }
    }
}

impl Outputs {
    #[inline]
    pub fn clear(&mut self) {
        self.samples.clear();
        self.events.clear();
        self.next_update = TimeValue::INDEFINITE;
    }

    #[inline]
    pub fn push_sample(&mut self, sample: SampleNotice) {
        self.samples.push(sample);
    }

    #[inline]
    pub fn push_event(&mut self, event: TimingNotice) {
        self.events.push(event);
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty() && self.events.is_empty()
    }

    /// Samples for one element, in emission order.
    pub fn samples_for(&self, element: ElementId) -> impl Iterator<Item = &SampleNotice> {
        self.samples.iter().filter(move |s| match s {
            SampleNotice::ToActive { element: e, .. }
            | SampleNotice::ToInactive { element: e, .. }
            | SampleNotice::RemoveFill { element: e }
            | SampleNotice::SampledAt { element: e, .. }
            | SampleNotice::SampledLastValue { element: e, .. } => *e == element,
        })
    }
}
