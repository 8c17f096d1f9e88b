use std::collections::HashSet;
use std::sync::Arc;

use flowtrace::flow::TestSubscriber;
use flowtrace::telemetry::Kind::*;
use flowtrace::telemetry::{
    validate, Context, DebugHook, ExecutionHook, HookRegistry, NoopHook, NotificationListener, RecordError,
    Recorder,
};
use flowtrace::{Observable, StreamError, Subscribers};

struct RefusingListener;

impl NotificationListener for RefusingListener {
    fn on_notification(&self, _context: Context) -> Result<(), RecordError> {
        Err(RecordError::Poisoned)
    }
}

fn pipeline() -> Observable<i32> {
    Observable::from_iter(vec![1, 2, 3, 4])
        .map(|v| v * 2)
        .flat_map(|v| Observable::from_iter(vec![v, v + 1]))
        .take(5)
}

#[test]
fn test_tracer_is_transparent() {
    // 1. Run once without instrumentation
    let (plain, plain_probe) = TestSubscriber::unbounded();
    pipeline().subscribe(plain);

    // 2. Run again traced
    let recorder = Arc::new(Recorder::new());
    let (traced, traced_probe) = TestSubscriber::unbounded();
    pipeline()
        .with_hook(Arc::new(DebugHook::new(recorder.clone())))
        .subscribe(traced);

    // 3. Same values, same termination
    assert_eq!(plain_probe.values(), vec![2, 3, 4, 5, 6]);
    assert_eq!(plain_probe.values(), traced_probe.values());
    assert_eq!(plain_probe.completions(), traced_probe.completions());

    // 4. Consumer attach plus the three derived streams take(5) needed
    let snapshot = recorder.snapshot();
    assert_eq!(snapshot.len(), 4);
    assert!(validate(&snapshot).is_ok());
}

#[test]
fn test_hook_applied_last_still_traces_derived_streams() {
    let recorder = Arc::new(Recorder::new());
    Observable::from_iter(vec![1, 3])
        .flat_map(|v| Observable::from_iter(vec![v, v + 1]))
        .take(3)
        .with_hook(Arc::new(DebugHook::new(recorder.clone())))
        .subscribe(Subscribers::empty());

    let snapshot = recorder.snapshot();
    assert_eq!(snapshot.len(), 3, "Consumer attach plus two derived streams");
    assert!(validate(&snapshot).is_ok());
}

#[test]
fn test_nested_flat_map_is_traced() {
    let recorder = Arc::new(Recorder::new());
    Observable::from_iter(vec![1])
        .with_hook(Arc::new(DebugHook::new(recorder.clone())))
        .flat_map(|it| Observable::from_iter(vec![it, it + 1]).flat_map(Observable::just))
        .subscribe(Subscribers::empty());

    let snapshot = recorder.snapshot();
    // consumer, the derived [1, 2] stream, then just(1) and just(2) beneath it
    assert_eq!(snapshot.len(), 4);
    for trace in snapshot.streams() {
        assert_eq!(trace.kinds().first(), Some(&Subscribe));
        assert_eq!(trace.kinds().last(), Some(&Unsubscribe));
    }
    assert!(validate(&snapshot).is_ok());
}

#[test]
fn test_error_identity_survives_tracing() {
    let recorder = Arc::new(Recorder::new());
    let error = StreamError::msg("original");

    let (subscriber, probe) = TestSubscriber::unbounded();
    Observable::<i32>::fail(error.clone())
        .with_hook(Arc::new(DebugHook::new(recorder.clone())))
        .subscribe(subscriber);

    let delivered = probe.errors();
    assert_eq!(delivered.len(), 1);
    assert!(delivered[0].same_error(&error), "Tracer must not replace the error");
}

#[test]
fn test_noop_hook_records_nothing() {
    let recorder = Arc::new(Recorder::new());
    let (subscriber, probe) = TestSubscriber::unbounded();
    Observable::from_iter(vec![1, 2]).with_hook(Arc::new(NoopHook)).subscribe(subscriber);

    assert_eq!(probe.values(), vec![1, 2]);
    assert!(recorder.is_empty());
    assert!(NoopHook.on_subscribe_start().is_none());
}

#[test]
fn test_listener_failure_never_blocks_delivery() {
    let hook = Arc::new(DebugHook::new(Arc::new(RefusingListener)));

    let (subscriber, probe) = TestSubscriber::unbounded();
    Observable::from_iter(vec![1, 2, 3]).with_hook(hook.clone()).subscribe(subscriber);

    // Real events flow even though every notification was refused.
    assert_eq!(probe.values(), vec![1, 2, 3]);
    assert!(probe.is_completed());
    // Subscribe, OnStart, Request, 3x OnNext, OnCompleted, Unsubscribe
    assert_eq!(hook.failures(), 8, "Every refusal is surfaced on the hook");
}

#[test]
fn test_contexts_share_origin_and_increase() {
    let recorder = Arc::new(Recorder::new());
    Observable::from_iter(vec!["a", "b"])
        .with_hook(Arc::new(DebugHook::new(recorder.clone())))
        .subscribe(Subscribers::empty());

    let snapshot = recorder.snapshot();
    let group = &snapshot.streams()[0];
    assert!(group.contexts().iter().all(|c| c.origin() == group.stream()));
    assert!(group
        .contexts()
        .windows(2)
        .all(|pair| pair[0].sequence() < pair[1].sequence()));
    assert!(group
        .contexts()
        .windows(2)
        .all(|pair| pair[0].elapsed() <= pair[1].elapsed()));
}

#[test]
fn test_every_derived_stream_gets_its_own_identity() {
    let recorder = Arc::new(Recorder::new());
    Observable::from_iter(vec![1, 2, 3])
        .with_hook(Arc::new(DebugHook::new(recorder.clone())))
        .flat_map(Observable::just)
        .subscribe(Subscribers::empty());

    let snapshot = recorder.snapshot();
    let ids: HashSet<_> = snapshot.streams().iter().map(|t| t.stream()).collect();
    assert_eq!(ids.len(), 4, "Consumer attach plus one per derived stream");
    for trace in snapshot.streams() {
        assert_eq!(trace.kinds().iter().filter(|k| **k == Subscribe).count(), 1);
        assert_eq!(trace.kinds().iter().filter(|k| **k == Unsubscribe).count(), 1);
    }
}

#[test]
fn test_repeated_cancel_emits_one_unsubscribe() {
    let recorder = Arc::new(Recorder::new());
    let (subscriber, probe) = TestSubscriber::new(1);
    Observable::from_iter(vec![1, 2, 3])
        .with_hook(Arc::new(DebugHook::new(recorder.clone())))
        .subscribe(subscriber);

    probe.cancel();
    probe.cancel();
    probe.request(5);

    assert_eq!(probe.values(), vec![1]);
    let snapshot = recorder.snapshot();
    assert_eq!(
        snapshot.streams()[0].kinds(),
        vec![Subscribe, OnStart, Request, OnNext, Unsubscribe],
        "Nothing is traced after the attach is released"
    );
    assert!(validate(&snapshot).is_ok());
}

#[test]
fn test_registry_holds_one_hook_at_a_time() {
    let registry = HookRegistry::new();
    assert!(!registry.is_installed());
    assert!(registry.current().on_subscribe_start().is_none(), "Empty slot is a no-op");

    let first = Arc::new(Recorder::new());
    let second = Arc::new(Recorder::new());
    assert!(registry.install(Arc::new(DebugHook::new(first.clone()))).is_none());
    assert!(registry.install(Arc::new(DebugHook::new(second.clone()))).is_some());

    Observable::just(7).with_hook(registry.current()).subscribe(Subscribers::empty());
    assert!(first.is_empty(), "Replaced hook no longer traces");
    assert_eq!(second.len(), 1);

    registry.reset();
    assert!(!registry.is_installed());
    Observable::just(8).with_hook(registry.current()).subscribe(Subscribers::empty());
    assert_eq!(second.len(), 1, "Reset returns to no instrumentation");
}
