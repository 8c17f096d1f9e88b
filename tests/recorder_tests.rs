use std::sync::Arc;

use flowtrace::telemetry::Kind::*;
use flowtrace::telemetry::{Context, Notification, Recorder, StreamId, Value};
use flowtrace::{DebugHook, Observable, Subscribers, UNBOUNDED};

#[test]
fn test_groups_by_origin_stream() {
    let recorder = Recorder::new();
    let a = StreamId::new();
    let b = StreamId::new();

    recorder.record(Context::new(a, Notification::Subscribe)).unwrap();
    recorder.record(Context::new(b, Notification::Subscribe)).unwrap();
    recorder.record(Context::new(a, Notification::OnStart)).unwrap();
    recorder.record(Context::new(b, Notification::OnStart)).unwrap();
    recorder.record(Context::new(a, Notification::Unsubscribe)).unwrap();

    let snapshot = recorder.snapshot();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(recorder.recorded(), 5);
    assert_eq!(snapshot.get(a).unwrap().kinds(), vec![Subscribe, OnStart, Unsubscribe]);
    assert_eq!(snapshot.get(b).unwrap().kinds(), vec![Subscribe, OnStart]);
    // First group seen first.
    assert_eq!(snapshot.streams()[0].stream(), a);
}

#[test]
fn test_late_arrival_is_placed_by_sequence() {
    let recorder = Recorder::new();
    let stream = StreamId::new();

    let subscribe = Context::new(stream, Notification::Subscribe);
    let start = Context::new(stream, Notification::OnStart);
    let request = Context::new(stream, Notification::Request(3));

    recorder.record(start).unwrap();
    recorder.record(request).unwrap();
    recorder.record(subscribe).unwrap();

    let snapshot = recorder.snapshot();
    let trace = snapshot.get(stream).unwrap();
    assert_eq!(trace.kinds(), vec![Subscribe, OnStart, Request]);
    assert!(trace
        .contexts()
        .windows(2)
        .all(|pair| pair[0].sequence() < pair[1].sequence()));
}

#[test]
fn test_snapshot_is_isolated_from_later_records() {
    let recorder = Recorder::new();
    let stream = StreamId::new();
    recorder.record(Context::new(stream, Notification::Subscribe)).unwrap();

    let before = recorder.snapshot();
    recorder.record(Context::new(stream, Notification::OnStart)).unwrap();
    recorder.record(Context::new(StreamId::new(), Notification::Subscribe)).unwrap();

    assert_eq!(before.len(), 1);
    assert_eq!(before.streams()[0].len(), 1, "Snapshot is a copy, not a view");
    assert_eq!(recorder.snapshot().len(), 2);
}

#[test]
fn test_reset_clears_everything() {
    let recorder = Recorder::new();
    recorder.record(Context::new(StreamId::new(), Notification::Subscribe)).unwrap();
    assert!(!recorder.is_empty());

    recorder.reset();
    assert!(recorder.is_empty());
    assert_eq!(recorder.recorded(), 0);
    assert!(recorder.snapshot().is_empty());
}

#[test]
fn test_render_lists_every_notification() {
    let recorder = Arc::new(Recorder::new());
    Observable::just(42)
        .with_hook(Arc::new(DebugHook::new(recorder.clone())))
        .subscribe(Subscribers::empty());

    let snapshot = recorder.snapshot();
    let rendered = snapshot.render();
    println!("{}", rendered);

    let stream = snapshot.streams()[0].stream();
    assert!(rendered.contains(&format!("stream {} (6 notifications)", stream.short())));
    for expected in ["Subscribe", "OnStart", "Request(∞)", "OnNext(42)", "OnCompleted", "Unsubscribe"] {
        assert!(rendered.contains(expected), "missing {} in rendering", expected);
    }
    assert_eq!(rendered, snapshot.to_string());
}

#[test]
fn test_json_rendering_carries_payloads() {
    let recorder = Recorder::new();
    let stream = StreamId::new();
    recorder.record(Context::new(stream, Notification::Request(UNBOUNDED))).unwrap();
    recorder
        .record(Context::new(stream, Notification::OnNext(Value::new("hello"))))
        .unwrap();

    let json = recorder.snapshot().to_json().unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    let contexts = &parsed["streams"][0]["contexts"];
    assert_eq!(contexts[0]["notification"]["kind"], "Request");
    assert_eq!(contexts[0]["notification"]["payload"], u64::MAX);
    assert_eq!(contexts[1]["notification"]["kind"], "OnNext");
    assert_eq!(contexts[1]["notification"]["payload"], "\"hello\"");
}

#[test]
fn test_value_payload_downcasts() {
    let value = Value::new(vec![1u8, 2]);
    assert_eq!(value.downcast_ref::<Vec<u8>>(), Some(&vec![1u8, 2]));
    assert!(value.downcast_ref::<String>().is_none());
    assert_eq!(format!("{:?}", value), "[1, 2]");
}
