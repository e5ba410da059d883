//! Host event plumbing: the event input type, the listener capability the
//! host implements, and the internal subscription table.
//!
//! The engine never dispatches host events itself. It registers interest
//! through [`EventTargetHost`] and the host feeds matching events back via
//! `TimedDocument::dispatch_event` with wallclock timestamps. Delivery is
//! queued per element and drained at that element's next sample, so listener
//! callback order never leaks into interval resolution.

use serde::{Deserialize, Serialize};

use crate::ids::{ElementId, SpecId};
use crate::time::TimeValue;

/// Time event fired when an element's interval begins.
pub const BEGIN_EVENT: &str = "beginEvent";
/// Time event fired when an element's interval ends.
pub const END_EVENT: &str = "endEvent";
/// Time event fired at each repeat boundary.
pub const REPEAT_EVENT: &str = "repeatEvent";
/// Target id of the document root, where access-key listeners attach.
pub const DOCUMENT_TARGET: &str = "#document";
/// Host event type access-key specifiers subscribe to.
pub const KEY_EVENT: &str = "keydown";

/// Key selector and key payload for keyboard-driven timing: a single
/// character (legacy accesskey syntax) or a key-identifier string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyDetail {
    Char(char),
    Identifier(String),
}

/// One event delivered by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingEvent {
    pub event_type: String,
    #[serde(default)]
    pub namespace: Option<String>,
    /// Wallclock milliseconds; converted to document time on delivery.
    pub timestamp_ms: f64,
    /// Present for keyboard events.
    #[serde(default)]
    pub key: Option<KeyDetail>,
}

impl TimingEvent {
    pub fn new(event_type: impl Into<String>, timestamp_ms: f64) -> Self {
        Self {
            event_type: event_type.into(),
            namespace: None,
            timestamp_ms,
            key: None,
        }
    }

    #[inline]
    pub fn with_key(mut self, key: KeyDetail) -> Self {
        self.key = Some(key);
        self
    }
}

/// Capability the host supplies so the engine can declare which events it
/// wants forwarded. Targets are host-side ids; the engine never inspects
/// them beyond equality.
pub trait EventTargetHost {
    fn add_event_listener(&mut self, target: &str, event_type: &str, namespace: Option<&str>);
    fn remove_event_listener(&mut self, target: &str, event_type: &str, namespace: Option<&str>);
}

/// Host stub for documents driven purely by offsets, syncbase references,
/// and internal time events.
#[derive(Default, Debug)]
pub struct NullEventHost;

impl EventTargetHost for NullEventHost {
    fn add_event_listener(&mut self, _target: &str, _event_type: &str, _namespace: Option<&str>) {}
    fn remove_event_listener(
        &mut self,
        _target: &str,
        _event_type: &str,
        _namespace: Option<&str>,
    ) {
    }
}

/// An event waiting in an element's queue. `token` identifies the underlying
/// host event so that at most one instance time is honored per event when
/// several specifiers matched it.
#[derive(Debug, Clone, Copy)]
pub(crate) struct QueuedEvent {
    pub spec: SpecId,
    pub time: TimeValue,
    pub token: u64,
}

#[derive(Debug, Clone)]
pub(crate) struct ListenerRow {
    pub target: String,
    pub event_type: String,
    pub namespace: Option<String>,
    pub owner: ElementId,
    pub spec: SpecId,
    /// Whether a host-side listener was registered for this row (internal
    /// time events route without one).
    pub host_backed: bool,
}

/// Subscription table mapping (target, event type) to interested specifiers.
#[derive(Default, Debug)]
pub(crate) struct ListenerTable {
    rows: Vec<ListenerRow>,
}

impl ListenerTable {
    pub fn add(&mut self, row: ListenerRow) {
        self.rows.push(row);
    }

    /// Rows matching an incoming event. A row without a namespace matches
    /// any namespace.
    pub fn matching<'a>(
        &'a self,
        target: &'a str,
        event_type: &'a str,
        namespace: Option<&'a str>,
    ) -> impl Iterator<Item = &'a ListenerRow> {
        self.rows.iter().filter(move |row| {
            row.target == target
                && row.event_type == event_type
                && (row.namespace.is_none() || row.namespace.as_deref() == namespace)
        })
    }

    /// Drop all rows owned by an element, returning the removed rows so the
    /// caller can detach host-side listeners.
    pub fn remove_owner(&mut self, owner: ElementId) -> Vec<ListenerRow> {
        let (removed, kept) = std::mem::take(&mut self.rows)
            .into_iter()
            .partition(|row| row.owner == owner);
        self.rows = kept;
        removed
    }
}
