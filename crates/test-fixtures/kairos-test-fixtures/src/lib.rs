//! Shared builders for integration tests and benches: small canned timed
//! documents and a recording event host.

use kairos_timing::{
    DurationSpec, EventTargetHost, IntervalEdge, RepeatCount, SpecDesc, TimedDocument,
    TimingAttributes,
};

/// Attributes for a plain `begin="<begin>s" dur="<dur>s"` element.
pub fn offset_attrs(begin: f32, dur: f32) -> TimingAttributes {
    TimingAttributes {
        begin: vec![SpecDesc::Offset { offset: begin }],
        dur: Some(DurationSpec::Seconds(dur)),
        ..Default::default()
    }
}

/// Attributes for an element syncing its begin to another element's edge.
pub fn syncbase_attrs(target: &str, edge: IntervalEdge, offset: f32, dur: f32) -> TimingAttributes {
    TimingAttributes {
        begin: vec![SpecDesc::Syncbase {
            target: target.to_string(),
            edge,
            offset,
        }],
        dur: Some(DurationSpec::Seconds(dur)),
        ..Default::default()
    }
}

/// Attributes for a repeating element: `begin="<begin>s" dur="<dur>s"
/// repeatCount="<count>"`.
pub fn metronome_attrs(begin: f32, dur: f32, count: f32) -> TimingAttributes {
    TimingAttributes {
        begin: vec![SpecDesc::Offset { offset: begin }],
        dur: Some(DurationSpec::Seconds(dur)),
        repeat_count: Some(RepeatCount::Count(count)),
        ..Default::default()
    }
}

/// Parse a JSON attribute description, as a host-side parser would hand over.
pub fn attrs_from_json(json: &str) -> TimingAttributes {
    serde_json::from_str(json).expect("fixture attributes should parse")
}

/// A document of `n` elements `e0..e(n-1)` where each element begins when
/// the previous one ends. `e0` starts at zero; every element runs for `dur`.
pub fn chain_document(n: usize, dur: f32) -> TimedDocument {
    let mut doc = TimedDocument::default();
    doc.add_element("e0", offset_attrs(0.0, dur)).unwrap();
    for i in 1..n {
        doc.add_element(
            &format!("e{i}"),
            syncbase_attrs(&format!("e{}", i - 1), IntervalEdge::End, 0.0, dur),
        )
        .unwrap();
    }
    doc.bind(&mut kairos_timing::NullEventHost)
        .expect("chain references resolve");
    doc
}

/// Event host that records listener registrations, for asserting attach and
/// detach behavior.
#[derive(Default, Debug)]
pub struct RecordingHost {
    pub added: Vec<(String, String)>,
    pub removed: Vec<(String, String)>,
}

impl EventTargetHost for RecordingHost {
    fn add_event_listener(&mut self, target: &str, event_type: &str, _namespace: Option<&str>) {
        self.added.push((target.to_string(), event_type.to_string()));
    }

    fn remove_event_listener(&mut self, target: &str, event_type: &str, _namespace: Option<&str>) {
        self.removed
            .push((target.to_string(), event_type.to_string()));
    }
}
