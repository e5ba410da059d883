//! The timed element state machine.
//!
//! An element owns its begin/end instance lists and its interval history, and
//! steps through inactive/active/frozen states as the document samples it.
//! Everything graph-shaped (notifying dependents, routing time events) is
//! collected into [`StepEffects`] and applied by the document after the
//! element-local step, so a notification can never observe the element mid
//! mutation.

use hashbrown::HashSet;

use crate::attributes::{DurationSpec, Fill, RepeatCount, Restart, TimingAttributes};
use crate::config::Config;
use crate::events::QueuedEvent;
use crate::ids::{ElementId, IdAllocator, SpecId};
use crate::instance::{InstanceList, InstanceTime};
use crate::interval::{DependentInstance, Interval, Retime};
use crate::outputs::{Outputs, SampleNotice, TimingNotice};
use crate::specifier::{SpecDesc, SpecEdge, TimingSpecifier};
use crate::time::TimeValue;

/// Reference to a specifier owned by some element, used for dependent
/// notification lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecRef {
    pub owner: ElementId,
    pub spec: SpecId,
}

/// Internal time event kinds an element can fire while stepping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimeEventKind {
    Begin,
    End,
    Repeat,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct FiredEvent {
    pub kind: TimeEventKind,
    pub time: f32,
    pub iteration: u32,
}

/// Graph-level side effects of one element step, applied by the document.
#[derive(Debug, Default)]
pub(crate) struct StepEffects {
    /// Time events to route through the listener table.
    pub fired: Vec<FiredEvent>,
    /// Newly created intervals to announce to dependent specifiers.
    pub created: Vec<crate::ids::IntervalId>,
    /// Dependent instances to remove because their source interval was
    /// dropped before running.
    pub removed: Vec<DependentInstance>,
    /// Dependent instances to move because a source edge changed.
    pub retimes: Vec<Retime>,
}

/// One schedulable element of the timegraph.
#[derive(Debug)]
pub struct TimedElement {
    pub(crate) id: ElementId,
    pub(crate) name: String,

    /// Parsed conditions awaiting reference resolution in `bind`.
    pub(crate) pending_descs: Vec<(SpecEdge, SpecDesc)>,
    pub(crate) initialized: bool,

    pub(crate) specifiers: Vec<TimingSpecifier>,
    pub(crate) begin_times: InstanceList,
    pub(crate) end_times: InstanceList,

    pub(crate) dur: Option<DurationSpec>,
    pub(crate) repeat_count: Option<RepeatCount>,
    pub(crate) repeat_dur: Option<DurationSpec>,
    pub(crate) min_dur: f32,
    pub(crate) max_dur: TimeValue,
    pub(crate) fill: Fill,
    pub(crate) restart: Restart,

    pub(crate) current_interval: Option<Interval>,
    /// Retired intervals in append order. Edges of retired intervals are
    /// never recomputed, but dependency propagation may still retime
    /// instances registered directly on them.
    pub(crate) previous_intervals: Vec<Interval>,

    /// Specifiers on other elements that reference this one as a syncbase.
    pub(crate) dependent_specs: Vec<SpecRef>,

    pub(crate) is_active: bool,
    pub(crate) is_frozen: bool,
    presenting: bool,
    pub(crate) last_sample_time: Option<f32>,
    pub(crate) last_repeat_time: f32,
    pub(crate) current_repeat_iteration: u32,

    pub(crate) needs_interval_update: bool,
    /// Set when another element's notification touched this one mid pass;
    /// the document resamples dirty elements until none remain.
    pub(crate) dirty: bool,

    pub(crate) queued: Vec<QueuedEvent>,
    pub(crate) has_parsed: bool,
    /// Wait hint computed by the last step.
    pub(crate) wait_time: TimeValue,
}

impl TimedElement {
    pub(crate) fn new(id: ElementId, name: String) -> Self {
        Self {
            id,
            name,
            pending_descs: Vec::new(),
            initialized: false,
            specifiers: Vec::new(),
            begin_times: InstanceList::default(),
            end_times: InstanceList::default(),
            dur: None,
            repeat_count: None,
            repeat_dur: None,
            min_dur: 0.0,
            max_dur: TimeValue::INDEFINITE,
            fill: Fill::Remove,
            restart: Restart::Always,
            current_interval: None,
            previous_intervals: Vec::new(),
            dependent_specs: Vec::new(),
            is_active: false,
            is_frozen: false,
            presenting: false,
            last_sample_time: None,
            last_repeat_time: 0.0,
            current_repeat_iteration: 0,
            needs_interval_update: true,
            dirty: false,
            queued: Vec::new(),
            has_parsed: false,
            wait_time: TimeValue::INDEFINITE,
        }
    }

    /// Adopt validated attribute values. Parsing happens once; repeated
    /// calls are ignored.
    pub(crate) fn parse_attributes(&mut self, attrs: &TimingAttributes) {
        if self.has_parsed {
            return;
        }
        self.has_parsed = true;
        self.dur = attrs.dur;
        self.repeat_count = attrs.repeat_count;
        self.repeat_dur = attrs.repeat_dur;
        let (min, max) = attrs.clamp_bounds();
        self.min_dur = min;
        self.max_dur = max;
        self.fill = attrs.fill;
        self.restart = attrs.restart;
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    #[inline]
    pub fn is_frozen(&self) -> bool {
        self.is_frozen
    }

    #[inline]
    pub fn repeat_iteration(&self) -> u32 {
        self.current_repeat_iteration
    }

    /// Document time of the most recent sample taken while active.
    #[inline]
    pub fn last_sample_time(&self) -> Option<f32> {
        self.last_sample_time
    }

    /// Edges of the current interval, if one is resolved.
    pub fn current_interval_edges(&self) -> Option<(TimeValue, TimeValue)> {
        self.current_interval
            .as_ref()
            .map(|iv| (iv.begin(), iv.end()))
    }

    /// Times currently on the begin instance list.
    pub fn begin_instance_times(&self) -> Vec<TimeValue> {
        self.begin_times.iter().map(|i| i.time).collect()
    }

    /// Times currently on the end instance list.
    pub fn end_instance_times(&self) -> Vec<TimeValue> {
        self.end_times.iter().map(|i| i.time).collect()
    }

    pub(crate) fn spec(&self, id: SpecId) -> Option<&TimingSpecifier> {
        self.specifiers.iter().find(|s| s.id == id)
    }

    /// Look up an interval by id, current first, then the retired history
    /// (retired intervals still carry live dependent registrations).
    pub(crate) fn find_interval(&self, id: crate::ids::IntervalId) -> Option<&Interval> {
        self.current_interval
            .iter()
            .chain(self.previous_intervals.iter())
            .find(|iv| iv.id() == id)
    }

    pub(crate) fn find_interval_mut(
        &mut self,
        id: crate::ids::IntervalId,
    ) -> Option<&mut Interval> {
        self.current_interval
            .iter_mut()
            .chain(self.previous_intervals.iter_mut())
            .find(|iv| iv.id() == id)
    }

    /// The base repeat-unit length: `dur`, or indefinite when unspecified.
    pub(crate) fn simple_duration(&self) -> TimeValue {
        match self.dur {
            Some(d) => d.to_time(),
            None => TimeValue::INDEFINITE,
        }
    }

    fn intermediate_active_duration(&self) -> TimeValue {
        let d = self.simple_duration();
        if d == TimeValue::ZERO {
            return TimeValue::ZERO;
        }
        if self.repeat_count.is_none() && self.repeat_dur.is_none() {
            return d;
        }
        let p1 = match self.repeat_count {
            Some(RepeatCount::Count(c)) => d.multiply(c),
            _ => TimeValue::INDEFINITE,
        };
        let p2 = match self.repeat_dur {
            Some(DurationSpec::Seconds(s)) => TimeValue::seconds(s),
            _ => TimeValue::INDEFINITE,
        };
        p1.min(p2).min(TimeValue::INDEFINITE)
    }

    /// Active duration of an interval beginning at `begin` and constrained by
    /// the end instance `end` (which may be indefinite or unresolved). This
    /// is where the asymmetric min/max algebra earns its keep.
    pub(crate) fn active_duration(&self, begin: TimeValue, end: TimeValue) -> TimeValue {
        let no_duration_attrs =
            self.dur.is_none() && self.repeat_count.is_none() && self.repeat_dur.is_none();
        let pad = if end.is_resolved() && no_duration_attrs {
            end.subtract(begin)
        } else if !end.is_resolved() {
            self.intermediate_active_duration()
        } else {
            self.intermediate_active_duration().min(end.subtract(begin))
        };
        self.max_dur.min(TimeValue::seconds(self.min_dur).max(pad))
    }

    #[inline]
    fn has_end_specifiers(&self) -> bool {
        self.specifiers.iter().any(|s| s.edge == SpecEdge::End)
    }

    #[inline]
    fn end_has_event_conditions(&self) -> bool {
        self.specifiers
            .iter()
            .any(|s| s.edge == SpecEdge::End && s.is_event_condition())
    }

    /// Whether restart policy permits resolving a further interval.
    fn can_begin_again(&self) -> bool {
        match self.restart {
            Restart::Never => self.previous_intervals.is_empty(),
            _ => true,
        }
    }

    /// Resolve the next interval from the instance lists.
    ///
    /// `first` permits a zero-length first interval; `fixed_begin` pins the
    /// begin to `begin_after` and re-derives only the end (used while an
    /// interval is running); otherwise the begin list is walked from
    /// `begin_after` forward. Returns `None` when no interval can be
    /// resolved, which is the normal "never activates (yet)" outcome.
    pub(crate) fn compute_interval(
        &self,
        first: bool,
        fixed_begin: bool,
        begin_after: TimeValue,
        parent_simple_dur: TimeValue,
    ) -> Option<(TimeValue, TimeValue)> {
        let mut begin_after = begin_after;
        let mut begin_idx = 0usize;
        loop {
            let temp_begin = if fixed_begin {
                begin_after
            } else {
                while self
                    .begin_times
                    .at(begin_idx)
                    .is_some_and(|i| i.time < begin_after)
                {
                    begin_idx += 1;
                }
                self.begin_times.at(begin_idx)?.time
            };
            // An unresolved or indefinite begin never resolves an interval,
            // and neither does one at or past the parent's simple duration.
            if temp_begin >= parent_simple_dur || !temp_begin.is_resolved() {
                return None;
            }

            let unconstrained = !self.has_end_specifiers() && self.end_times.is_empty();
            let temp_end = if unconstrained {
                temp_begin.add(self.active_duration(temp_begin, TimeValue::INDEFINITE))
            } else {
                // First end value at or after the begin; a coincident pair is
                // only usable for the first interval, later ones must look
                // past it.
                let constraint = self
                    .end_times
                    .iter()
                    .find(|i| i.time > temp_begin || (first && i.time == temp_begin))
                    .map(|i| i.time);
                let constraint = match constraint {
                    Some(t) => t,
                    // Exhausted, but a future event (or a scripted end call,
                    // when no end conditions were declared at all) could
                    // still close the interval.
                    None if self.end_has_event_conditions() || !self.has_end_specifiers() => {
                        TimeValue::UNRESOLVED
                    }
                    None => return None,
                };
                temp_begin.add(self.active_duration(temp_begin, constraint))
            };

            // A restartable element's next begin steals the end from the
            // interval being resolved. The total order makes one comparison
            // cover resolved, indefinite, and unresolved ends alike.
            let temp_end = match self.restart {
                Restart::Always => match self.begin_times.first_after(temp_begin) {
                    Some(next) if next.time < temp_end => next.time,
                    _ => temp_end,
                },
                _ => temp_end,
            };

            if temp_end > temp_begin || (first && temp_end == temp_begin) {
                return Some((temp_begin, temp_end));
            }
            if fixed_begin {
                return None;
            }
            // Degenerate candidate: retry past it.
            begin_after = temp_end;
            begin_idx += 1;
        }
    }

    /// Apply queued host/internal events to the instance lists, honoring the
    /// sensitivity rules at drain time: a begin event only lands while
    /// inactive (or under restart=always), an end event only while active,
    /// and one underlying event yields at most one instance, with the end
    /// side winning while active.
    pub(crate) fn drain_queued_events(&mut self, ids: &mut IdAllocator) {
        if self.queued.is_empty() {
            return;
        }
        let queued = std::mem::take(&mut self.queued);
        let end_tokens: HashSet<u64> = queued
            .iter()
            .filter(|q| {
                self.spec(q.spec)
                    .is_some_and(|s| s.edge == SpecEdge::End)
            })
            .map(|q| q.token)
            .collect();

        for q in queued {
            let Some(spec) = self.spec(q.spec) else {
                log::warn!("queued event for unknown specifier {:?}", q.spec);
                debug_assert!(false, "queued event for unknown specifier");
                continue;
            };
            let (edge, offset, spec_id) = (spec.edge, spec.offset(), spec.id);
            let accept = match edge {
                SpecEdge::Begin => {
                    (!self.is_active || self.restart == Restart::Always)
                        && !(self.is_active && end_tokens.contains(&q.token))
                }
                SpecEdge::End => self.is_active,
            };
            if !accept {
                continue;
            }
            let time = q.time.add(TimeValue::seconds(offset));
            let instance =
                InstanceTime::new(ids.alloc_instance_time(), time, Some(spec_id), true);
            match edge {
                SpecEdge::Begin => self.begin_times.insert(instance),
                SpecEdge::End => self.end_times.insert(instance),
            }
            self.needs_interval_update = true;
        }
    }

    fn activate(&mut self, begin: f32, outputs: &mut Outputs, fx: &mut StepEffects) {
        self.is_active = true;
        self.is_frozen = false;
        self.presenting = true;
        self.last_repeat_time = begin;
        self.current_repeat_iteration = 0;
        outputs.push_sample(SampleNotice::ToActive {
            element: self.id,
            begin,
        });
        outputs.push_event(TimingNotice::Begin {
            element: self.id,
            time: begin,
        });
        fx.fired.push(FiredEvent {
            kind: TimeEventKind::Begin,
            time: begin,
            iteration: 0,
        });
    }

    /// Fire repeat events for every simple-duration boundary crossed up to
    /// `t` within the current interval.
    fn update_repeats(&mut self, t: f32, outputs: &mut Outputs, fx: &mut StepEffects) {
        if !self.is_active {
            return;
        }
        let Some(iv) = &self.current_interval else {
            return;
        };
        let end = iv.end();
        let Some(d) = self.simple_duration().resolved_seconds() else {
            return;
        };
        if d <= 0.0 {
            return;
        }
        while t - self.last_repeat_time >= d {
            let boundary = self.last_repeat_time + d;
            if TimeValue::seconds(boundary) >= end {
                break;
            }
            self.last_repeat_time = boundary;
            self.current_repeat_iteration += 1;
            outputs.push_event(TimingNotice::Repeat {
                element: self.id,
                time: boundary,
                iteration: self.current_repeat_iteration,
            });
            fx.fired.push(FiredEvent {
                kind: TimeEventKind::Repeat,
                time: boundary,
                iteration: self.current_repeat_iteration,
            });
        }
    }

    /// Run one sample of the state machine at document time `t`.
    pub(crate) fn step(
        &mut self,
        t: f32,
        hyperlinking: bool,
        parent_simple_dur: TimeValue,
        cfg: &Config,
        ids: &mut IdAllocator,
        outputs: &mut Outputs,
    ) -> StepEffects {
        let mut fx = StepEffects::default();
        self.dirty = false;
        let tv = TimeValue::seconds(t);

        // 1. Apply events queued since the previous sample.
        self.drain_queued_events(ids);
        if hyperlinking {
            self.needs_interval_update = true;
        }

        // 2. Begin transition on an interval resolved in an earlier pass. A
        // current interval on an inactive element has by construction not
        // begun yet; it activates as soon as its begin is in range.
        if let Some(iv) = &self.current_interval {
            let begin = iv.begin();
            if !self.is_active && begin <= tv {
                self.activate(begin.as_seconds(), outputs, &mut fx);
            }
        }
        self.update_repeats(t, outputs, &mut fx);

        // 3. Interval update loop: retire, re-resolve, and re-derive until
        // stable. Each round either consumes instance times or clears the
        // update flag, so this converges; the cap is a defensive bound.
        let mut rounds = 0usize;
        let mut has_ended = self
            .current_interval
            .as_ref()
            .is_some_and(|iv| tv >= iv.end());
        while self.needs_interval_update || has_ended {
            rounds += 1;
            if rounds > cfg.max_interval_updates {
                log::warn!(
                    "element '{}' exceeded {} interval updates in one sample",
                    self.name,
                    cfg.max_interval_updates
                );
                break;
            }

            if has_ended {
                let iv = self.current_interval.take().expect("ended without interval");
                let end_time = iv.end().as_seconds();
                self.previous_intervals.push(iv);
                let was_active = self.is_active;
                self.is_active = false;
                self.is_frozen = was_active && self.fill == Fill::Freeze;
                outputs.push_sample(SampleNotice::ToInactive {
                    element: self.id,
                    frozen: self.is_frozen,
                });
                outputs.push_event(TimingNotice::End {
                    element: self.id,
                    time: end_time,
                });
                fx.fired.push(FiredEvent {
                    kind: TimeEventKind::End,
                    time: end_time,
                    iteration: 0,
                });
            }

            if self.current_interval.is_none() {
                if self.can_begin_again() {
                    let first = self.previous_intervals.is_empty();
                    let begin_after = if hyperlinking || first {
                        TimeValue::seconds(f32::NEG_INFINITY)
                    } else {
                        self.previous_intervals
                            .last()
                            .map(|p| p.end())
                            .unwrap_or(TimeValue::seconds(f32::NEG_INFINITY))
                    };
                    if let Some((b, e)) =
                        self.compute_interval(first, false, begin_after, parent_simple_dur)
                    {
                        let iv = Interval::new(ids.alloc_interval(), b, e);
                        fx.created.push(iv.id());
                        self.current_interval = Some(iv);
                    }
                }
            } else if !self.is_active
                && self
                    .current_interval
                    .as_ref()
                    .is_some_and(|iv| iv.begin() > tv)
            {
                // Un-started interval: instance lists may have shifted it.
                let first = self.previous_intervals.is_empty();
                let begin_after = self
                    .previous_intervals
                    .last()
                    .map(|p| p.end())
                    .unwrap_or(TimeValue::seconds(f32::NEG_INFINITY));
                match self.compute_interval(first, false, begin_after, parent_simple_dur) {
                    Some((b, e)) => {
                        let iv = self.current_interval.as_mut().expect("checked above");
                        if iv.begin() != b {
                            fx.retimes.extend(iv.set_begin(b));
                        }
                        if iv.end() != e {
                            fx.retimes.extend(iv.set_end(e));
                        }
                    }
                    None => {
                        let mut iv = self.current_interval.take().expect("checked above");
                        fx.removed.extend(iv.take_dependents());
                        // Leave the update flag set so the next round can
                        // re-resolve from scratch.
                        has_ended = false;
                        continue;
                    }
                }
            } else {
                // Started interval: the begin is pinned, only the end may
                // still move.
                let current_begin = self
                    .current_interval
                    .as_ref()
                    .expect("checked above")
                    .begin();
                if let Some((_, e)) =
                    self.compute_interval(false, true, current_begin, parent_simple_dur)
                {
                    let iv = self.current_interval.as_mut().expect("checked above");
                    if iv.end() != e {
                        fx.retimes.extend(iv.set_end(e));
                    }
                }
            }

            self.needs_interval_update = false;
            has_ended = self
                .current_interval
                .as_ref()
                .is_some_and(|iv| tv >= iv.end());

            // A freshly resolved interval that is already in range activates
            // immediately, catching up on any repeat boundaries crossed.
            if let Some(iv) = &self.current_interval {
                let begin = iv.begin();
                if !self.is_active && begin <= tv {
                    self.activate(begin.as_seconds(), outputs, &mut fx);
                    self.update_repeats(t, outputs, &mut fx);
                }
            }
        }

        // 4. Sampling dispatch.
        if self.is_active {
            self.last_sample_time = Some(t);
            outputs.push_sample(SampleNotice::SampledAt {
                element: self.id,
                simple_time: t - self.last_repeat_time,
                simple_dur: self.simple_duration(),
                repeat_iteration: self.current_repeat_iteration,
            });
        } else if self.is_frozen {
            self.presenting = true;
            let last_local = self
                .previous_intervals
                .last()
                .map(|p| p.end().as_seconds() - self.last_repeat_time)
                .unwrap_or(0.0);
            let d = self.simple_duration();
            let on_boundary = d
                .resolved_seconds()
                .is_some_and(|ds| ds > 0.0 && last_local % ds == 0.0);
            if on_boundary {
                outputs.push_sample(SampleNotice::SampledLastValue {
                    element: self.id,
                    repeat_iteration: self.current_repeat_iteration,
                });
            } else {
                outputs.push_sample(SampleNotice::SampledAt {
                    element: self.id,
                    simple_time: last_local,
                    simple_dur: d,
                    repeat_iteration: self.current_repeat_iteration,
                });
            }
        } else if self.presenting {
            outputs.push_sample(SampleNotice::RemoveFill { element: self.id });
            self.presenting = false;
        }

        // 5. Wait hint for the caller's scheduler.
        self.wait_time = if self.is_active {
            TimeValue::ZERO
        } else if let Some(begin) = self
            .current_interval
            .as_ref()
            .map(|iv| iv.begin())
            .filter(|b| b.is_resolved() && *b > tv)
        {
            begin.subtract(tv)
        } else if let Some(next) = self
            .begin_times
            .first_after(tv)
            .filter(|i| i.time.is_resolved())
        {
            next.time.subtract(tv)
        } else {
            TimeValue::INDEFINITE
        };

        fx
    }

    /// Document-reset behavior: event- and API-created instances vanish,
    /// repeat and freeze state is zeroed. Interval teardown notifications are
    /// handled by the document before calling this.
    pub(crate) fn reset(&mut self) {
        self.begin_times.retain(|i| !i.clear_on_reset);
        self.end_times.retain(|i| !i.clear_on_reset);
        self.current_interval = None;
        self.previous_intervals.clear();
        self.is_active = false;
        self.is_frozen = false;
        self.presenting = false;
        self.last_sample_time = None;
        self.last_repeat_time = 0.0;
        self.current_repeat_iteration = 0;
        self.needs_interval_update = true;
        self.queued.clear();
        self.wait_time = TimeValue::INDEFINITE;
    }
}
