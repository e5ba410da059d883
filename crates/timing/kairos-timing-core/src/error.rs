//! Error types for the timing engine.

use serde::{Deserialize, Serialize};

/// Errors raised while building a timed document.
///
/// Runtime sampling never produces errors: an element that cannot resolve an
/// interval simply has none, and unresolved/indefinite times are values.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum TimingError {
    /// An attribute value failed to parse
    #[error("Malformed value for attribute '{attribute}': {value}")]
    MalformedAttribute { attribute: String, value: String },

    /// A timing expression referenced an element id that does not exist
    #[error("Attribute '{attribute}' references unknown element '{reference}'")]
    UnresolvedReference {
        attribute: String,
        reference: String,
    },

    /// Lookup of a timed element by name failed
    #[error("Timed element not found: {name}")]
    ElementNotFound { name: String },

    /// An element with the same name is already registered
    #[error("Timed element already registered: {name}")]
    DuplicateElement { name: String },
}

impl TimingError {
    /// Get error category for logging/metrics
    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::MalformedAttribute { .. } => "parse",
            Self::UnresolvedReference { .. } => "binding",
            Self::ElementNotFound { .. } | Self::DuplicateElement { .. } => "registry",
        }
    }
}
