//! Concrete activation intervals and their dependent bookkeeping.

use serde::{Deserialize, Serialize};

use crate::ids::{ElementId, InstanceTimeId, IntervalId};
use crate::time::TimeValue;

/// Which edge of an interval a dependency follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntervalEdge {
    Begin,
    End,
}

/// Non-owning record of an instance time derived from one of this interval's
/// edges. The owning element's instance list stays authoritative for
/// lifetime; this is only a notification route.
#[derive(Debug, Clone, Copy)]
pub struct DependentInstance {
    pub owner: ElementId,
    pub instance: InstanceTimeId,
    pub offset: f32,
}

/// A retime to apply to a dependent instance after an edge moved.
#[derive(Debug, Clone, Copy)]
pub struct Retime {
    pub owner: ElementId,
    pub instance: InstanceTimeId,
    pub time: TimeValue,
}

/// One resolved activation window `[begin, end)`.
///
/// `end` may be indefinite (or still unresolved while under construction);
/// once both edges are resolved, `begin <= end` holds. Edges stay mutable so
/// incremental re-resolution can move an interval that has not started yet,
/// or re-derive the end of one that has.
#[derive(Debug)]
pub struct Interval {
    id: IntervalId,
    begin: TimeValue,
    end: TimeValue,
    begin_dependents: Vec<DependentInstance>,
    end_dependents: Vec<DependentInstance>,
}

impl Interval {
    pub fn new(id: IntervalId, begin: TimeValue, end: TimeValue) -> Self {
        debug_assert!(
            !(begin.is_resolved() && end.is_resolved())
                || begin.as_seconds() <= end.as_seconds(),
            "interval begin after end"
        );
        Self {
            id,
            begin,
            end,
            begin_dependents: Vec::new(),
            end_dependents: Vec::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> IntervalId {
        self.id
    }

    #[inline]
    pub fn begin(&self) -> TimeValue {
        self.begin
    }

    #[inline]
    pub fn end(&self) -> TimeValue {
        self.end
    }

    /// Edge value of the requested side.
    #[inline]
    pub fn edge(&self, edge: IntervalEdge) -> TimeValue {
        match edge {
            IntervalEdge::Begin => self.begin,
            IntervalEdge::End => self.end,
        }
    }

    /// Move the begin edge, yielding the retimes owed to dependents.
    #[must_use]
    pub fn set_begin(&mut self, begin: TimeValue) -> Vec<Retime> {
        self.begin = begin;
        Self::retimes_for(&self.begin_dependents, begin)
    }

    /// Move the end edge, yielding the retimes owed to dependents.
    #[must_use]
    pub fn set_end(&mut self, end: TimeValue) -> Vec<Retime> {
        self.end = end;
        Self::retimes_for(&self.end_dependents, end)
    }

    fn retimes_for(dependents: &[DependentInstance], edge: TimeValue) -> Vec<Retime> {
        dependents
            .iter()
            .map(|dep| Retime {
                owner: dep.owner,
                instance: dep.instance,
                time: edge.add(TimeValue::seconds(dep.offset)),
            })
            .collect()
    }

    pub fn add_dependent(&mut self, edge: IntervalEdge, dependent: DependentInstance) {
        match edge {
            IntervalEdge::Begin => self.begin_dependents.push(dependent),
            IntervalEdge::End => self.end_dependents.push(dependent),
        }
    }

    /// Drop every dependent owned by `owner` (element teardown).
    pub fn remove_dependents_of(&mut self, owner: ElementId) {
        self.begin_dependents.retain(|d| d.owner != owner);
        self.end_dependents.retain(|d| d.owner != owner);
    }

    /// Take all dependents, for removal notification when the interval is
    /// dropped before ever running.
    pub fn take_dependents(&mut self) -> Vec<DependentInstance> {
        let mut all = std::mem::take(&mut self.begin_dependents);
        all.append(&mut self.end_dependents);
        all
    }

    /// All dependents, both edges.
    pub fn dependents(&self) -> impl Iterator<Item = &DependentInstance> {
        self.begin_dependents.iter().chain(self.end_dependents.iter())
    }
}
