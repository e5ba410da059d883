//! Instance times and the ordered lists that hold them.

use crate::ids::{ElementId, InstanceTimeId, IntervalId, SpecId};
use crate::interval::IntervalEdge;
use crate::time::TimeValue;

/// Back-reference from a dependent instance time to the interval edge it was
/// derived from. Pure observation, never ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimebaseRef {
    pub element: ElementId,
    pub interval: IntervalId,
    pub edge: IntervalEdge,
}

/// One candidate begin or end point on an element's timeline.
#[derive(Debug, Clone)]
pub struct InstanceTime {
    pub id: InstanceTimeId,
    pub time: TimeValue,
    /// Specifier that produced this instance, if any.
    pub creator: Option<SpecId>,
    /// Set for syncbase-derived instances, which retime when the source
    /// interval moves.
    pub timebase: Option<TimebaseRef>,
    /// Removed on document reset (event- and API-created instances).
    pub clear_on_reset: bool,
    /// Insertion sequence, the tiebreak for equal times.
    seq: u64,
}

impl InstanceTime {
    pub fn new(
        id: InstanceTimeId,
        time: TimeValue,
        creator: Option<SpecId>,
        clear_on_reset: bool,
    ) -> Self {
        Self {
            id,
            time,
            creator,
            timebase: None,
            clear_on_reset,
            seq: 0,
        }
    }

    #[inline]
    pub fn with_timebase(mut self, timebase: TimebaseRef) -> Self {
        self.timebase = Some(timebase);
        self
    }
}

/// An instance list kept sorted ascending by `(time, insertion sequence)`.
/// The sequence tiebreak makes ordering stable for duplicate times and lets
/// removal work by identity instead of value scans.
#[derive(Debug, Default)]
pub struct InstanceList {
    items: Vec<InstanceTime>,
    next_seq: u64,
}

impl InstanceList {
    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn insert(&mut self, mut instance: InstanceTime) {
        instance.seq = self.next_seq;
        self.next_seq += 1;
        let key = (instance.time, instance.seq);
        let pos = self
            .items
            .partition_point(|probe| (probe.time, probe.seq) < key);
        self.items.insert(pos, instance);
    }

    /// Remove by identity. Returns the instance if present.
    pub fn remove(&mut self, id: InstanceTimeId) -> Option<InstanceTime> {
        let pos = self.items.iter().position(|i| i.id == id)?;
        Some(self.items.remove(pos))
    }

    /// Move an existing instance to a new time, keeping its identity and
    /// sequence. Returns false if the instance is not in this list.
    pub fn retime(&mut self, id: InstanceTimeId, time: TimeValue) -> bool {
        let Some(pos) = self.items.iter().position(|i| i.id == id) else {
            return false;
        };
        let mut instance = self.items.remove(pos);
        instance.time = time;
        let key = (instance.time, instance.seq);
        let at = self
            .items
            .partition_point(|probe| (probe.time, probe.seq) < key);
        self.items.insert(at, instance);
        true
    }

    pub fn retain(&mut self, keep: impl FnMut(&InstanceTime) -> bool) {
        self.items.retain(keep);
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &InstanceTime> {
        self.items.iter()
    }

    #[inline]
    pub fn at(&self, index: usize) -> Option<&InstanceTime> {
        self.items.get(index)
    }

    /// First instance at or after `time`.
    pub fn first_at_or_after(&self, time: TimeValue) -> Option<&InstanceTime> {
        self.items.iter().find(|i| i.time >= time)
    }

    /// First instance strictly after `time`.
    pub fn first_after(&self, time: TimeValue) -> Option<&InstanceTime> {
        self.items.iter().find(|i| i.time > time)
    }

    #[cfg(test)]
    fn is_sorted(&self) -> bool {
        self.items
            .windows(2)
            .all(|w| (w[0].time, w[0].seq) <= (w[1].time, w[1].seq))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inst(id: u32, time: f32) -> InstanceTime {
        InstanceTime::new(InstanceTimeId(id), TimeValue::seconds(time), None, false)
    }

    #[test]
    fn insertion_keeps_ascending_order() {
        let mut list = InstanceList::default();
        for (id, t) in [(0, 3.0), (1, 1.0), (2, 2.0), (3, 1.0), (4, 0.0)] {
            list.insert(inst(id, t));
            assert!(list.is_sorted());
        }
        let times: Vec<f32> = list.iter().map(|i| i.time.as_seconds()).collect();
        assert_eq!(times, vec![0.0, 1.0, 1.0, 2.0, 3.0]);
        // Equal times keep insertion order.
        let ids: Vec<u32> = list.iter().map(|i| i.id.0).collect();
        assert_eq!(ids, vec![4, 1, 3, 2, 0]);
    }

    #[test]
    fn unresolved_sorts_after_indefinite() {
        let mut list = InstanceList::default();
        list.insert(InstanceTime::new(
            InstanceTimeId(0),
            TimeValue::UNRESOLVED,
            None,
            false,
        ));
        list.insert(InstanceTime::new(
            InstanceTimeId(1),
            TimeValue::INDEFINITE,
            None,
            false,
        ));
        list.insert(inst(2, 5.0));
        let ids: Vec<u32> = list.iter().map(|i| i.id.0).collect();
        assert_eq!(ids, vec![2, 1, 0]);
    }

    #[test]
    fn remove_is_identity_aware_with_duplicate_times() {
        let mut list = InstanceList::default();
        list.insert(inst(0, 1.0));
        list.insert(inst(1, 1.0));
        list.insert(inst(2, 1.0));
        let removed = list.remove(InstanceTimeId(1)).unwrap();
        assert_eq!(removed.id, InstanceTimeId(1));
        let ids: Vec<u32> = list.iter().map(|i| i.id.0).collect();
        assert_eq!(ids, vec![0, 2]);
        assert!(list.remove(InstanceTimeId(1)).is_none());
    }

    #[test]
    fn retime_moves_and_stays_sorted() {
        let mut list = InstanceList::default();
        list.insert(inst(0, 1.0));
        list.insert(inst(1, 2.0));
        list.insert(inst(2, 3.0));
        assert!(list.retime(InstanceTimeId(0), TimeValue::seconds(2.5)));
        assert!(list.is_sorted());
        let ids: Vec<u32> = list.iter().map(|i| i.id.0).collect();
        assert_eq!(ids, vec![1, 0, 2]);
        assert!(!list.retime(InstanceTimeId(9), TimeValue::ZERO));
    }

    #[test]
    fn search_helpers() {
        let mut list = InstanceList::default();
        list.insert(inst(0, 1.0));
        list.insert(inst(1, 3.0));
        assert_eq!(
            list.first_at_or_after(TimeValue::seconds(1.0)).unwrap().id,
            InstanceTimeId(0)
        );
        assert_eq!(
            list.first_after(TimeValue::seconds(1.0)).unwrap().id,
            InstanceTimeId(1)
        );
        assert!(list.first_after(TimeValue::seconds(3.0)).is_none());
    }
}
