//! Host events: listener attachment, queued delivery, sensitivity rules,
//! and access-key filtering.

use kairos_timing::{
    DurationSpec, KeyDetail, Restart, SpecDesc, TimeValue, TimedDocument, TimingAttributes,
    TimingEvent, DOCUMENT_TARGET, KEY_EVENT,
};
use kairos_test_fixtures::RecordingHost;

fn event_begun_attrs(event: &str, dur: f32, restart: Restart) -> TimingAttributes {
    TimingAttributes {
        begin: vec![SpecDesc::Eventbase {
            target: None,
            event: event.to_string(),
            offset: 0.0,
        }],
        dur: Some(DurationSpec::Seconds(dur)),
        restart,
        ..Default::default()
    }
}

#[test]
fn listeners_attach_on_bind_and_detach_on_removal() {
    let mut host = RecordingHost::default();
    let mut doc = TimedDocument::default();
    doc.add_element("x", event_begun_attrs("click", 2.0, Restart::Always))
        .unwrap();
    doc.bind(&mut host).unwrap();
    assert_eq!(host.added, vec![("x".to_string(), "click".to_string())]);

    doc.remove_element("x", &mut host).unwrap();
    assert_eq!(host.removed, vec![("x".to_string(), "click".to_string())]);
}

#[test]
fn event_begins_interval_at_document_time() {
    let mut host = RecordingHost::default();
    let mut doc = TimedDocument::default();
    doc.add_element("x", event_begun_attrs("click", 2.0, Restart::Always))
        .unwrap();
    doc.bind(&mut host).unwrap();
    doc.reset_document(10_000.0);

    // Wallclock 11.5s is document time 1.5s.
    doc.dispatch_event("x", &TimingEvent::new("click", 11_500.0));
    doc.seek_to(1.5);
    let x = doc.element("x").unwrap();
    assert!(x.is_active());
    let (b, e) = x.current_interval_edges().unwrap();
    assert_eq!((b, e), (TimeValue::seconds(1.5), TimeValue::seconds(3.5)));
}

#[test]
fn event_to_unrelated_target_or_type_is_ignored() {
    let mut doc = TimedDocument::default();
    doc.add_element("x", event_begun_attrs("click", 2.0, Restart::Always))
        .unwrap();
    doc.bind(&mut RecordingHost::default()).unwrap();

    doc.dispatch_event("someone-else", &TimingEvent::new("click", 1000.0));
    doc.dispatch_event("x", &TimingEvent::new("mouseover", 1000.0));
    doc.seek_to(1.0);
    assert!(doc.element("x").unwrap().begin_instance_times().is_empty());
}

#[test]
fn begin_event_while_active_suppressed_unless_restart_always() {
    let mut doc = TimedDocument::default();
    doc.add_element("x", event_begun_attrs("click", 2.0, Restart::WhenNotActive))
        .unwrap();
    doc.bind(&mut RecordingHost::default()).unwrap();

    doc.dispatch_event("x", &TimingEvent::new("click", 1000.0));
    doc.seek_to(1.0);
    assert!(doc.element("x").unwrap().is_active());

    // Sensitivity is evaluated at drain time, against the active state.
    doc.dispatch_event("x", &TimingEvent::new("click", 2000.0));
    doc.seek_to(2.0);
    assert_eq!(doc.element("x").unwrap().begin_instance_times().len(), 1);
    let (b, _) = doc.element("x").unwrap().current_interval_edges().unwrap();
    assert_eq!(b, TimeValue::seconds(1.0));

    // After the interval ends the same event begins a new one.
    doc.seek_to(3.0);
    assert!(!doc.element("x").unwrap().is_active());
    doc.dispatch_event("x", &TimingEvent::new("click", 4000.0));
    doc.seek_to(4.0);
    assert!(doc.element("x").unwrap().is_active());
}

#[test]
fn begin_event_restarts_under_restart_always() {
    let mut doc = TimedDocument::default();
    doc.add_element("x", event_begun_attrs("click", 5.0, Restart::Always))
        .unwrap();
    doc.bind(&mut RecordingHost::default()).unwrap();

    doc.dispatch_event("x", &TimingEvent::new("click", 0.0));
    doc.seek_to(0.0);
    assert!(doc.element("x").unwrap().is_active());

    doc.dispatch_event("x", &TimingEvent::new("click", 2000.0));
    doc.seek_to(2.0);
    // The old interval was cut at 2 and a new one begins there.
    let (b, e) = doc.element("x").unwrap().current_interval_edges().unwrap();
    assert_eq!((b, e), (TimeValue::seconds(2.0), TimeValue::seconds(7.0)));
    assert!(doc.element("x").unwrap().is_active());
}

#[test]
fn end_event_closes_open_interval() {
    let mut doc = TimedDocument::default();
    doc.add_element(
        "x",
        TimingAttributes {
            begin: vec![SpecDesc::Offset { offset: 0.0 }],
            end: vec![SpecDesc::Eventbase {
                target: None,
                event: "stop".to_string(),
                offset: 0.0,
            }],
            ..Default::default()
        },
    )
    .unwrap();
    doc.bind(&mut RecordingHost::default()).unwrap();

    doc.seek_to(0.0);
    // Only an event can end it, so the provisional end is open.
    let (_, e) = doc.element("x").unwrap().current_interval_edges().unwrap();
    assert!(e.is_indefinite());

    doc.dispatch_event("x", &TimingEvent::new("stop", 2000.0));
    doc.seek_to(2.0);
    assert!(!doc.element("x").unwrap().is_active());
}

#[test]
fn end_event_while_inactive_is_suppressed() {
    let mut doc = TimedDocument::default();
    doc.add_element(
        "x",
        TimingAttributes {
            begin: vec![SpecDesc::Eventbase {
                target: None,
                event: "go".to_string(),
                offset: 0.0,
            }],
            end: vec![SpecDesc::Eventbase {
                target: None,
                event: "stop".to_string(),
                offset: 0.0,
            }],
            ..Default::default()
        },
    )
    .unwrap();
    doc.bind(&mut RecordingHost::default()).unwrap();

    doc.dispatch_event("x", &TimingEvent::new("stop", 500.0));
    doc.seek_to(0.5);
    assert!(doc.element("x").unwrap().end_instance_times().is_empty());

    doc.dispatch_event("x", &TimingEvent::new("go", 1000.0));
    doc.seek_to(1.0);
    assert!(doc.element("x").unwrap().is_active());
}

#[test]
fn one_event_toggles_but_never_does_both() {
    // The same host event feeds both lists; the end side wins while active,
    // the begin side while inactive.
    let mut doc = TimedDocument::default();
    doc.add_element(
        "x",
        TimingAttributes {
            begin: vec![SpecDesc::Eventbase {
                target: None,
                event: "toggle".to_string(),
                offset: 0.0,
            }],
            end: vec![SpecDesc::Eventbase {
                target: None,
                event: "toggle".to_string(),
                offset: 0.0,
            }],
            restart: Restart::Always,
            ..Default::default()
        },
    )
    .unwrap();
    doc.bind(&mut RecordingHost::default()).unwrap();

    doc.dispatch_event("x", &TimingEvent::new("toggle", 1000.0));
    doc.seek_to(1.0);
    assert!(doc.element("x").unwrap().is_active());

    doc.dispatch_event("x", &TimingEvent::new("toggle", 2000.0));
    doc.seek_to(2.0);
    let x = doc.element("x").unwrap();
    assert!(!x.is_active());
    // The begin half of the toggle was suppressed, not queued for later.
    assert_eq!(x.begin_instance_times().len(), 1);

    doc.dispatch_event("x", &TimingEvent::new("toggle", 3000.0));
    doc.seek_to(3.0);
    assert!(doc.element("x").unwrap().is_active());
}

#[test]
fn event_offset_shifts_instance_time() {
    let mut doc = TimedDocument::default();
    doc.add_element(
        "x",
        TimingAttributes {
            begin: vec![SpecDesc::Eventbase {
                target: None,
                event: "click".to_string(),
                offset: 1.5,
            }],
            dur: Some(DurationSpec::Seconds(1.0)),
            ..Default::default()
        },
    )
    .unwrap();
    doc.bind(&mut RecordingHost::default()).unwrap();

    doc.dispatch_event("x", &TimingEvent::new("click", 1000.0));
    doc.seek_to(1.0);
    assert_eq!(
        doc.element("x").unwrap().begin_instance_times(),
        vec![TimeValue::seconds(2.5)]
    );
    assert!(!doc.element("x").unwrap().is_active());
    doc.seek_to(2.5);
    assert!(doc.element("x").unwrap().is_active());
}

#[test]
fn accesskey_filters_on_key() {
    let mut host = RecordingHost::default();
    let mut doc = TimedDocument::default();
    doc.add_element(
        "x",
        TimingAttributes {
            begin: vec![SpecDesc::Accesskey {
                key: KeyDetail::Char('a'),
                offset: 0.0,
            }],
            dur: Some(DurationSpec::Seconds(1.0)),
            ..Default::default()
        },
    )
    .unwrap();
    doc.bind(&mut host).unwrap();
    assert_eq!(
        host.added,
        vec![(DOCUMENT_TARGET.to_string(), KEY_EVENT.to_string())]
    );

    doc.dispatch_event(
        DOCUMENT_TARGET,
        &TimingEvent::new(KEY_EVENT, 500.0).with_key(KeyDetail::Char('b')),
    );
    doc.seek_to(0.5);
    assert!(doc.element("x").unwrap().begin_instance_times().is_empty());

    doc.dispatch_event(
        DOCUMENT_TARGET,
        &TimingEvent::new(KEY_EVENT, 1000.0).with_key(KeyDetail::Char('a')),
    );
    doc.seek_to(1.0);
    assert!(doc.element("x").unwrap().is_active());
}

#[test]
fn accesskey_identifier_syntax() {
    let mut doc = TimedDocument::default();
    doc.add_element(
        "x",
        TimingAttributes {
            begin: vec![SpecDesc::Accesskey {
                key: KeyDetail::Identifier("Enter".to_string()),
                offset: 0.0,
            }],
            dur: Some(DurationSpec::Seconds(1.0)),
            ..Default::default()
        },
    )
    .unwrap();
    doc.bind(&mut RecordingHost::default()).unwrap();

    doc.dispatch_event(
        DOCUMENT_TARGET,
        &TimingEvent::new(KEY_EVENT, 1000.0).with_key(KeyDetail::Identifier("Enter".to_string())),
    );
    doc.seek_to(1.0);
    assert!(doc.element("x").unwrap().is_active());
}

#[test]
fn time_events_from_one_element_begin_another() {
    // Eventbase on a sibling's endEvent: unlike a syncbase end reference, the
    // instance appears only when the end actually happens.
    let mut doc = TimedDocument::default();
    doc.add_element("a", kairos_test_fixtures::offset_attrs(0.0, 2.0))
        .unwrap();
    doc.add_element(
        "b",
        TimingAttributes {
            begin: vec![SpecDesc::Eventbase {
                target: Some("a".to_string()),
                event: "endEvent".to_string(),
                offset: 0.0,
            }],
            dur: Some(DurationSpec::Seconds(1.0)),
            ..Default::default()
        },
    )
    .unwrap();
    doc.bind(&mut RecordingHost::default()).unwrap();

    doc.seek_to(0.0);
    assert!(doc.element("b").unwrap().begin_instance_times().is_empty());

    doc.seek_to(2.0);
    assert_eq!(
        doc.element("b").unwrap().begin_instance_times(),
        vec![TimeValue::seconds(2.0)]
    );
    assert!(doc.element("b").unwrap().is_active());
}
