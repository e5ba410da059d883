//! Timing specifiers: the resolvers that turn one parsed begin/end condition
//! into instance times on the owning element's lists.

use serde::{Deserialize, Serialize};

use crate::events::KeyDetail;
use crate::ids::{ElementId, SpecId};
use crate::interval::IntervalEdge;

/// Which instance list a specifier feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpecEdge {
    Begin,
    End,
}

/// One parsed begin/end condition, as produced by the attribute parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SpecDesc {
    /// Fixed offset from simple time zero, e.g. `begin="2s"`.
    Offset { offset: f32 },
    /// Relative to another element's interval edge, e.g. `begin="x.end+1s"`.
    Syncbase {
        target: String,
        edge: IntervalEdge,
        #[serde(default)]
        offset: f32,
    },
    /// Fired by a host event on a target, e.g. `begin="x.click"`.
    Eventbase {
        #[serde(default)]
        target: Option<String>,
        event: String,
        #[serde(default)]
        offset: f32,
    },
    /// Fired at a repeat boundary of a target, e.g. `begin="x.repeat(2)"`.
    Repeat {
        #[serde(default)]
        target: Option<String>,
        #[serde(default)]
        iteration: Option<u32>,
        #[serde(default)]
        offset: f32,
    },
    /// Fired by a matching key press on the document root target.
    Accesskey {
        key: KeyDetail,
        #[serde(default)]
        offset: f32,
    },
    /// A single instance time pinned at indefinite.
    Indefinite,
}

/// A specifier bound to its owner, with references resolved.
#[derive(Debug, Clone)]
pub struct TimingSpecifier {
    pub id: SpecId,
    pub edge: SpecEdge,
    pub kind: SpecifierKind,
}

#[derive(Debug, Clone)]
pub enum SpecifierKind {
    Offset {
        offset: f32,
    },
    Syncbase {
        target: ElementId,
        interval_edge: IntervalEdge,
        offset: f32,
    },
    Eventbase {
        /// Host-side target id; defaults to the owner element's name.
        target: String,
        event_type: String,
        offset: f32,
    },
    Repeat {
        target: ElementId,
        /// Restrict to one iteration number; `None` matches every boundary.
        iteration: Option<u32>,
        offset: f32,
    },
    Accesskey {
        key: KeyDetail,
        offset: f32,
    },
    Indefinite,
}

impl TimingSpecifier {
    /// Event-like specifiers resolve from future occurrences rather than
    /// from already-known times; an end list containing one can leave an
    /// interval end unresolved instead of failing resolution.
    #[inline]
    pub fn is_event_condition(&self) -> bool {
        matches!(
            self.kind,
            SpecifierKind::Eventbase { .. }
                | SpecifierKind::Repeat { .. }
                | SpecifierKind::Accesskey { .. }
        )
    }

    /// Offset added to the source occurrence when this specifier creates an
    /// instance time.
    #[inline]
    pub fn offset(&self) -> f32 {
        match &self.kind {
            SpecifierKind::Offset { offset }
            | SpecifierKind::Syncbase { offset, .. }
            | SpecifierKind::Eventbase { offset, .. }
            | SpecifierKind::Repeat { offset, .. }
            | SpecifierKind::Accesskey { offset, .. } => *offset,
            SpecifierKind::Indefinite => 0.0,
        }
    }
}
