//! Kairos Timing Core (renderer-agnostic)
//!
//! A declarative timing engine: begin/end timing conditions (offsets,
//! syncbase references, host events, access keys) resolve into concrete
//! activation intervals, evaluated incrementally as a single document clock
//! advances. The engine maintains the dependency graph between
//! time-dependent elements and reports activation state and simple times
//! through per-pass outputs; value interpolation and presentation belong to
//! the consumer.

pub mod attributes;
pub mod config;
pub mod document;
pub mod element;
pub mod error;
pub mod events;
pub mod ids;
pub mod instance;
pub mod interval;
pub mod outputs;
pub mod specifier;
pub mod time;

// Re-exports for consumers (adapters)
pub use attributes::{DurationSpec, Fill, RepeatCount, Restart, TimingAttributes};
pub use config::Config;
pub use document::TimedDocument;
pub use element::TimedElement;
pub use error::TimingError;
pub use events::{
    EventTargetHost, KeyDetail, NullEventHost, TimingEvent, BEGIN_EVENT, DOCUMENT_TARGET,
    END_EVENT, KEY_EVENT, REPEAT_EVENT,
};
pub use ids::{ElementId, InstanceTimeId, IntervalId, SpecId};
pub use instance::{InstanceList, InstanceTime};
pub use interval::{Interval, IntervalEdge};
pub use outputs::{Outputs, SampleNotice, TimingNotice};
pub use specifier::{SpecDesc, SpecEdge, SpecifierKind, TimingSpecifier};
pub use time::TimeValue;

/// Timing engine result type
pub type Result<T> = core::result::Result<T, TimingError>;
