//! The document root: element registry, reference binding, event routing,
//! and the sampling fixpoint.
//!
//! One `TimedDocument` owns every timed element of a document and a single
//! clock. Sampling is cooperative and synchronous: the caller invokes
//! `seek_to` with a document time (typically once per frame or per explicit
//! seek) and schedules the next call from `Outputs::next_update`. Document
//! order does not topologically order the dependency graph, since timing
//! references go both forward and backward, so one pass is not enough; the
//! seek loop resamples elements dirtied by notifications until none remain.

use hashbrown::{HashMap, HashSet};
use indexmap::IndexMap;

use crate::attributes::TimingAttributes;
use crate::config::Config;
use crate::element::{SpecRef, StepEffects, TimeEventKind, TimedElement};
use crate::error::TimingError;
use crate::events::{
    EventTargetHost, ListenerRow, ListenerTable, QueuedEvent, TimingEvent, BEGIN_EVENT,
    DOCUMENT_TARGET, END_EVENT, KEY_EVENT, REPEAT_EVENT,
};
use crate::ids::{ElementId, IdAllocator, IntervalId, SpecId};
use crate::instance::{InstanceTime, TimebaseRef};
use crate::interval::DependentInstance;
use crate::outputs::Outputs;
use crate::specifier::{SpecDesc, SpecEdge, SpecifierKind, TimingSpecifier};
use crate::time::TimeValue;

/// The aggregate of timed elements under one document clock.
#[derive(Debug)]
pub struct TimedDocument {
    cfg: Config,
    ids: IdAllocator,
    /// Elements in document order.
    elements: IndexMap<ElementId, TimedElement>,
    names: HashMap<String, ElementId>,
    listeners: ListenerTable,
    /// `(interval, specifier)` pairs already notified this pass. Keyed by
    /// identity so cyclic syncbase graphs cannot ping-pong.
    propagated: HashSet<(IntervalId, SpecId)>,
    /// Wallclock anchor for converting host event timestamps.
    document_begin_ms: f64,
    /// Simple duration of the document container itself.
    simple_duration: TimeValue,
    current_time: f32,
    event_token: u64,
    outputs: Outputs,
}

impl Default for TimedDocument {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl TimedDocument {
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            ids: IdAllocator::new(),
            elements: IndexMap::new(),
            names: HashMap::new(),
            listeners: ListenerTable::default(),
            propagated: HashSet::new(),
            document_begin_ms: 0.0,
            simple_duration: TimeValue::INDEFINITE,
            current_time: 0.0,
            event_token: 0,
            outputs: Outputs::default(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Document time of the most recent seek.
    #[inline]
    pub fn document_time(&self) -> f32 {
        self.current_time
    }

    /// Constrain the container's own simple duration; candidate begins at or
    /// past it are rejected during interval resolution.
    pub fn set_simple_duration(&mut self, dur: TimeValue) {
        self.simple_duration = dur;
    }

    #[inline]
    pub fn element_id(&self, name: &str) -> Option<ElementId> {
        self.names.get(name).copied()
    }

    pub fn element(&self, name: &str) -> Option<&TimedElement> {
        self.names.get(name).and_then(|id| self.elements.get(id))
    }

    #[inline]
    pub fn wallclock_to_document_time(&self, timestamp_ms: f64) -> f32 {
        ((timestamp_ms - self.document_begin_ms) / 1000.0) as f32
    }

    /// Register an element with its parsed timing attributes. References to
    /// other elements stay unresolved until [`bind`](Self::bind) runs, so
    /// documents may be registered in any order.
    pub fn add_element(
        &mut self,
        name: &str,
        attrs: TimingAttributes,
    ) -> Result<ElementId, TimingError> {
        if self.names.contains_key(name) {
            return Err(TimingError::DuplicateElement {
                name: name.to_string(),
            });
        }
        attrs.validate()?;
        let id = self.ids.alloc_element();
        let mut element = TimedElement::new(id, name.to_string());
        element.parse_attributes(&attrs);
        for desc in attrs.begin {
            element.pending_descs.push((SpecEdge::Begin, desc));
        }
        for desc in attrs.end {
            element.pending_descs.push((SpecEdge::End, desc));
        }
        self.names.insert(name.to_string(), id);
        self.elements.insert(id, element);
        Ok(id)
    }

    /// Resolve references and attach listeners for every element added since
    /// the last bind. A missing reference fails that element's setup loudly;
    /// a silently absent timing source would produce wrong behavior.
    pub fn bind(&mut self, host: &mut dyn EventTargetHost) -> Result<(), TimingError> {
        let order: Vec<ElementId> = self.elements.keys().copied().collect();
        for id in order {
            let descs = {
                let element = &self.elements[&id];
                if element.initialized {
                    continue;
                }
                element.pending_descs.clone()
            };
            for (edge, desc) in &descs {
                self.bind_specifier(id, *edge, desc, host)?;
            }
            let element = self.elements.get_mut(&id).expect("bound element exists");
            element.initialized = true;
            element.needs_interval_update = true;
            element.dirty = true;
        }
        Ok(())
    }

    fn resolve_element(&self, reference: &str, edge: SpecEdge) -> Result<ElementId, TimingError> {
        self.names.get(reference).copied().ok_or_else(|| {
            TimingError::UnresolvedReference {
                attribute: match edge {
                    SpecEdge::Begin => "begin".to_string(),
                    SpecEdge::End => "end".to_string(),
                },
                reference: reference.to_string(),
            }
        })
    }

    fn bind_specifier(
        &mut self,
        owner: ElementId,
        edge: SpecEdge,
        desc: &SpecDesc,
        host: &mut dyn EventTargetHost,
    ) -> Result<(), TimingError> {
        let spec_id = self.ids.alloc_spec();
        let owner_name = self.elements[&owner].name().to_string();
        match desc {
            SpecDesc::Offset { offset } => {
                let instance_id = self.ids.alloc_instance_time();
                let element = self.elements.get_mut(&owner).expect("owner exists");
                element.specifiers.push(TimingSpecifier {
                    id: spec_id,
                    edge,
                    kind: SpecifierKind::Offset { offset: *offset },
                });
                let instance = InstanceTime::new(
                    instance_id,
                    TimeValue::seconds(*offset),
                    Some(spec_id),
                    false,
                );
                match edge {
                    SpecEdge::Begin => element.begin_times.insert(instance),
                    SpecEdge::End => element.end_times.insert(instance),
                }
            }
            SpecDesc::Indefinite => {
                let instance_id = self.ids.alloc_instance_time();
                let element = self.elements.get_mut(&owner).expect("owner exists");
                element.specifiers.push(TimingSpecifier {
                    id: spec_id,
                    edge,
                    kind: SpecifierKind::Indefinite,
                });
                let instance =
                    InstanceTime::new(instance_id, TimeValue::INDEFINITE, Some(spec_id), false);
                match edge {
                    SpecEdge::Begin => element.begin_times.insert(instance),
                    SpecEdge::End => element.end_times.insert(instance),
                }
            }
            SpecDesc::Syncbase {
                target,
                edge: interval_edge,
                offset,
            } => {
                let target_id = self.resolve_element(target, edge)?;
                let element = self.elements.get_mut(&owner).expect("owner exists");
                element.specifiers.push(TimingSpecifier {
                    id: spec_id,
                    edge,
                    kind: SpecifierKind::Syncbase {
                        target: target_id,
                        interval_edge: *interval_edge,
                        offset: *offset,
                    },
                });
                let spec_ref = SpecRef {
                    owner,
                    spec: spec_id,
                };
                let target_element =
                    self.elements.get_mut(&target_id).expect("resolved target");
                target_element.dependent_specs.push(spec_ref);
                // A target bound earlier may already carry an interval.
                if let Some(interval) = target_element
                    .current_interval
                    .as_ref()
                    .map(|iv| iv.id())
                {
                    self.create_syncbase_instance(spec_ref, target_id, interval);
                }
            }
            SpecDesc::Eventbase {
                target,
                event,
                offset,
            } => {
                let target_name = target.clone().unwrap_or_else(|| owner_name.clone());
                let element = self.elements.get_mut(&owner).expect("owner exists");
                element.specifiers.push(TimingSpecifier {
                    id: spec_id,
                    edge,
                    kind: SpecifierKind::Eventbase {
                        target: target_name.clone(),
                        event_type: event.clone(),
                        offset: *offset,
                    },
                });
                self.listeners.add(ListenerRow {
                    target: target_name.clone(),
                    event_type: event.clone(),
                    namespace: None,
                    owner,
                    spec: spec_id,
                    host_backed: true,
                });
                host.add_event_listener(&target_name, event, None);
            }
            SpecDesc::Repeat {
                target,
                iteration,
                offset,
            } => {
                let target_name = target.clone().unwrap_or_else(|| owner_name.clone());
                let target_id = self.resolve_element(&target_name, edge)?;
                let element = self.elements.get_mut(&owner).expect("owner exists");
                element.specifiers.push(TimingSpecifier {
                    id: spec_id,
                    edge,
                    kind: SpecifierKind::Repeat {
                        target: target_id,
                        iteration: *iteration,
                        offset: *offset,
                    },
                });
                self.listeners.add(ListenerRow {
                    target: target_name,
                    event_type: REPEAT_EVENT.to_string(),
                    namespace: None,
                    owner,
                    spec: spec_id,
                    host_backed: false,
                });
            }
            SpecDesc::Accesskey { key, offset } => {
                let element = self.elements.get_mut(&owner).expect("owner exists");
                element.specifiers.push(TimingSpecifier {
                    id: spec_id,
                    edge,
                    kind: SpecifierKind::Accesskey {
                        key: key.clone(),
                        offset: *offset,
                    },
                });
                self.listeners.add(ListenerRow {
                    target: DOCUMENT_TARGET.to_string(),
                    event_type: KEY_EVENT.to_string(),
                    namespace: None,
                    owner,
                    spec: spec_id,
                    host_backed: true,
                });
                host.add_event_listener(DOCUMENT_TARGET, KEY_EVENT, None);
            }
        }
        Ok(())
    }

    /// Deinitialize and drop an element: detach its listeners, unhook every
    /// dependency edge touching it, and remove instance times derived from
    /// its intervals so no dangling notification can reach it.
    pub fn remove_element(
        &mut self,
        name: &str,
        host: &mut dyn EventTargetHost,
    ) -> Result<(), TimingError> {
        let id = self
            .names
            .remove(name)
            .ok_or_else(|| TimingError::ElementNotFound {
                name: name.to_string(),
            })?;
        for row in self.listeners.remove_owner(id) {
            if row.host_backed {
                host.remove_event_listener(&row.target, &row.event_type, row.namespace.as_deref());
            }
        }
        self.elements
            .shift_remove(&id)
            .expect("registry consistent with name index");

        // Downstream instances timebased on the removed element lose their
        // source and go away with it; its own registrations on other
        // elements' intervals are dropped so nothing dangles.
        for element in self.elements.values_mut() {
            let before = element.begin_times.len() + element.end_times.len();
            element
                .begin_times
                .retain(|i| i.timebase.map_or(true, |tb| tb.element != id));
            element
                .end_times
                .retain(|i| i.timebase.map_or(true, |tb| tb.element != id));
            if element.begin_times.len() + element.end_times.len() != before {
                element.needs_interval_update = true;
                element.dirty = true;
            }
            element.dependent_specs.retain(|s| s.owner != id);
            if let Some(interval) = element.current_interval.as_mut() {
                interval.remove_dependents_of(id);
            }
            for interval in element.previous_intervals.iter_mut() {
                interval.remove_dependents_of(id);
            }
        }
        Ok(())
    }

    /// Insert a begin instance at the current document time plus `offset`,
    /// as the scripting `beginElement`/`beginElementAt` calls do. Restart
    /// policy still decides whether an interval results.
    pub fn begin_element(&mut self, name: &str, offset: f32) -> Result<(), TimingError> {
        self.insert_api_instance(name, offset, SpecEdge::Begin)
    }

    /// Insert an end instance at the current document time plus `offset`.
    pub fn end_element(&mut self, name: &str, offset: f32) -> Result<(), TimingError> {
        self.insert_api_instance(name, offset, SpecEdge::End)
    }

    fn insert_api_instance(
        &mut self,
        name: &str,
        offset: f32,
        edge: SpecEdge,
    ) -> Result<(), TimingError> {
        let id = self
            .names
            .get(name)
            .copied()
            .ok_or_else(|| TimingError::ElementNotFound {
                name: name.to_string(),
            })?;
        let time = TimeValue::seconds(self.current_time + offset);
        let instance = InstanceTime::new(self.ids.alloc_instance_time(), time, None, true);
        let element = self.elements.get_mut(&id).expect("registry consistent");
        match edge {
            SpecEdge::Begin => element.begin_times.insert(instance),
            SpecEdge::End => element.end_times.insert(instance),
        }
        element.needs_interval_update = true;
        element.dirty = true;
        Ok(())
    }

    /// Route a host event to subscribed specifiers. Delivery only queues;
    /// sensitivity rules and instance creation happen at the target
    /// element's next sample.
    pub fn dispatch_event(&mut self, target: &str, event: &TimingEvent) {
        let doc_time = self.wallclock_to_document_time(event.timestamp_ms);
        let token = self.next_token();
        let rows: Vec<(ElementId, SpecId)> = self
            .listeners
            .matching(target, &event.event_type, event.namespace.as_deref())
            .map(|row| (row.owner, row.spec))
            .collect();
        for (owner, spec_id) in rows {
            let Some(element) = self.elements.get_mut(&owner) else {
                continue;
            };
            let Some(spec) = element.spec(spec_id) else {
                continue;
            };
            match &spec.kind {
                SpecifierKind::Accesskey { key, .. } => {
                    if event.key.as_ref() != Some(key) {
                        continue;
                    }
                }
                // Repeat boundaries are engine-generated, never host events.
                SpecifierKind::Repeat { .. } => continue,
                _ => {}
            }
            if element.queued.len() >= self.cfg.max_queued_events {
                log::warn!(
                    "event queue full for '{}', dropping {}",
                    element.name(),
                    event.event_type
                );
                continue;
            }
            element.queued.push(QueuedEvent {
                spec: spec_id,
                time: TimeValue::seconds(doc_time),
                token,
            });
            element.dirty = true;
        }
    }

    /// Set the wallclock anchor and return every element to its unsampled
    /// state, keeping only reset-surviving instance times.
    pub fn reset_document(&mut self, begin_timestamp_ms: f64) {
        self.document_begin_ms = begin_timestamp_ms;
        for element in self.elements.values_mut() {
            element.reset();
            // Every interval was just dropped, so every timebased instance
            // is stale; the next seek re-derives them from fresh intervals.
            element.begin_times.retain(|i| i.timebase.is_none());
            element.end_times.retain(|i| i.timebase.is_none());
        }
        self.propagated.clear();
        self.current_time = 0.0;
    }

    /// Sample the whole document at time `t`.
    pub fn seek_to(&mut self, t: f32) -> &Outputs {
        self.seek(t, false)
    }

    /// Sample at `t` with interval resolution unpinned from past history, as
    /// hyperlink traversal requires.
    pub fn hyperlink_seek(&mut self, t: f32) -> &Outputs {
        self.seek(t, true)
    }

    fn seek(&mut self, t: f32, hyperlinking: bool) -> &Outputs {
        self.propagated.clear();
        self.outputs.clear();
        self.current_time = t;

        let order: Vec<ElementId> = self.elements.keys().copied().collect();
        for id in &order {
            self.sample_element(*id, t, hyperlinking);
        }

        // Fixpoint over dirtied elements.
        let mut rounds = 0usize;
        loop {
            let dirty: Vec<ElementId> = self
                .elements
                .iter()
                .filter_map(|(id, el)| el.dirty.then_some(*id))
                .collect();
            if dirty.is_empty() {
                break;
            }
            rounds += 1;
            if rounds > self.cfg.max_seek_iterations {
                log::warn!(
                    "seek at t={t} did not stabilize after {} rounds",
                    self.cfg.max_seek_iterations
                );
                break;
            }
            for id in dirty {
                self.sample_element(id, t, false);
            }
        }

        let mut next = TimeValue::INDEFINITE;
        for element in self.elements.values() {
            next = next.min(element.wait_time);
        }
        self.outputs.next_update = next;
        &self.outputs
    }

    fn sample_element(&mut self, id: ElementId, t: f32, hyperlinking: bool) {
        let parent_dur = self.simple_duration;
        let Some(element) = self.elements.get_mut(&id) else {
            return;
        };
        if !element.initialized {
            element.dirty = false;
            return;
        }
        let effects = element.step(
            t,
            hyperlinking,
            parent_dur,
            &self.cfg,
            &mut self.ids,
            &mut self.outputs,
        );
        self.apply_effects(id, effects);
    }

    fn apply_effects(&mut self, source: ElementId, effects: StepEffects) {
        // Instances orphaned by a dropped interval.
        for dep in effects.removed {
            if let Some(element) = self.elements.get_mut(&dep.owner) {
                let found = element
                    .begin_times
                    .remove(dep.instance)
                    .or_else(|| element.end_times.remove(dep.instance));
                if found.is_some() {
                    element.needs_interval_update = true;
                    element.dirty = true;
                } else {
                    // Bookkeeping drift is a bug, not bad input; never take
                    // down the sampling loop for it.
                    log::warn!("stale dependent instance {:?}", dep.instance);
                    debug_assert!(false, "stale dependent instance");
                }
            }
        }

        // Instances following a moved interval edge.
        for retime in effects.retimes {
            if let Some(element) = self.elements.get_mut(&retime.owner) {
                let moved = element.begin_times.retime(retime.instance, retime.time)
                    || element.end_times.retime(retime.instance, retime.time);
                if moved {
                    element.needs_interval_update = true;
                    element.dirty = true;
                } else {
                    log::warn!("retime for unknown instance {:?}", retime.instance);
                    debug_assert!(false, "retime for unknown instance");
                }
            }
        }

        // Announce new intervals to dependent syncbase specifiers, at most
        // once per (interval, specifier) pair per pass.
        for interval_id in effects.created {
            let dependents: Vec<SpecRef> = self
                .elements
                .get(&source)
                .map(|e| e.dependent_specs.clone())
                .unwrap_or_default();
            for spec_ref in dependents {
                if !self.propagated.insert((interval_id, spec_ref.spec)) {
                    continue;
                }
                self.create_syncbase_instance(spec_ref, source, interval_id);
            }
        }

        // Route begin/end/repeat through the listener table so event-like
        // specifiers on other elements can observe them.
        if !effects.fired.is_empty() {
            let source_name = self
                .elements
                .get(&source)
                .map(|e| e.name().to_string())
                .unwrap_or_default();
            for fired in effects.fired {
                let event_type = match fired.kind {
                    TimeEventKind::Begin => BEGIN_EVENT,
                    TimeEventKind::End => END_EVENT,
                    TimeEventKind::Repeat => REPEAT_EVENT,
                };
                let token = self.next_token();
                let rows: Vec<(ElementId, SpecId)> = self
                    .listeners
                    .matching(&source_name, event_type, None)
                    .map(|row| (row.owner, row.spec))
                    .collect();
                for (owner, spec_id) in rows {
                    let Some(element) = self.elements.get_mut(&owner) else {
                        continue;
                    };
                    if let Some(TimingSpecifier {
                        kind:
                            SpecifierKind::Repeat {
                                iteration: Some(wanted),
                                ..
                            },
                        ..
                    }) = element.spec(spec_id)
                    {
                        if *wanted != fired.iteration {
                            continue;
                        }
                    }
                    if element.queued.len() >= self.cfg.max_queued_events {
                        log::warn!(
                            "event queue full for '{}', dropping {}",
                            element.name(),
                            event_type
                        );
                        continue;
                    }
                    element.queued.push(QueuedEvent {
                        spec: spec_id,
                        time: TimeValue::seconds(fired.time),
                        token,
                    });
                    element.dirty = true;
                }
            }
        }
    }

    /// Materialize one syncbase instance from a source interval edge and
    /// register it for edge-change notifications.
    fn create_syncbase_instance(
        &mut self,
        spec_ref: SpecRef,
        source: ElementId,
        interval: IntervalId,
    ) {
        let Some((spec_edge, interval_edge, offset)) = self
            .elements
            .get(&spec_ref.owner)
            .and_then(|e| e.spec(spec_ref.spec))
            .and_then(|s| match s.kind {
                SpecifierKind::Syncbase {
                    interval_edge,
                    offset,
                    ..
                } => Some((s.edge, interval_edge, offset)),
                _ => None,
            })
        else {
            log::warn!("dependent specifier {:?} is not a syncbase", spec_ref.spec);
            debug_assert!(false, "dependent specifier is not a syncbase");
            return;
        };
        let Some(edge_time) = self
            .elements
            .get(&source)
            .and_then(|e| e.find_interval(interval))
            .map(|iv| iv.edge(interval_edge))
        else {
            return;
        };

        let instance_id = self.ids.alloc_instance_time();
        let instance = InstanceTime::new(
            instance_id,
            edge_time.add(TimeValue::seconds(offset)),
            Some(spec_ref.spec),
            false,
        )
        .with_timebase(TimebaseRef {
            element: source,
            interval,
            edge: interval_edge,
        });

        let owner = self
            .elements
            .get_mut(&spec_ref.owner)
            .expect("dependent owner exists");
        match spec_edge {
            SpecEdge::Begin => owner.begin_times.insert(instance),
            SpecEdge::End => owner.end_times.insert(instance),
        }
        owner.needs_interval_update = true;
        owner.dirty = true;

        if let Some(interval) = self
            .elements
            .get_mut(&source)
            .and_then(|e| e.find_interval_mut(interval))
        {
            interval.add_dependent(
                interval_edge,
                DependentInstance {
                    owner: spec_ref.owner,
                    instance: instance_id,
                    offset,
                },
            );
        }
    }

    #[inline]
    fn next_token(&mut self) -> u64 {
        let token = self.event_token;
        self.event_token += 1;
        token
    }
}
