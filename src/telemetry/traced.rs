use std::sync::atomic::{AtomicBool, Ordering};

use super::hook::{AttachTrace, ExecutionHook};
use super::notification::{Notification, Value};
use crate::flow::{BoxSubscriber, Item, Producer, StreamError, Subscriber, Subscription};

/// Opens a trace for this attach (emitting `Subscribe`) and wraps the
/// subscriber, or hands it back untouched when the hook declines.
pub fn instrument<T: Item>(hook: &dyn ExecutionHook, subscriber: BoxSubscriber<T>) -> BoxSubscriber<T> {
    match hook.on_subscribe_start() {
        Some(trace) => {
            trace.emit(Notification::Subscribe);
            Box::new(TracedSubscriber::new(subscriber, trace))
        }
        None => subscriber,
    }
}

/// Pass-through subscriber emitting one notification per signal, ahead of forwarding it.
pub struct TracedSubscriber<T> {
    inner: BoxSubscriber<T>,
    trace: AttachTrace,
}

impl<T: Item> TracedSubscriber<T> {
    pub fn new(inner: BoxSubscriber<T>, trace: AttachTrace) -> Self {
        Self { inner, trace }
    }
}

impl<T: Item> Subscriber<T> for TracedSubscriber<T> {
    fn on_start(&mut self, subscription: Subscription) {
        self.trace.emit(Notification::OnStart);
        let traced = TracedSubscription::new(subscription, self.trace.clone());
        self.inner.on_start(Subscription::new(traced));
    }

    fn on_next(&mut self, value: T) {
        self.trace.emit(Notification::OnNext(Value::new(value.clone())));
        self.inner.on_next(value);
    }

    fn on_error(&mut self, error: StreamError) {
        self.trace.emit(Notification::OnError(error.clone()));
        self.inner.on_error(error);
    }

    fn on_completed(&mut self) {
        self.trace.emit(Notification::OnCompleted);
        self.inner.on_completed();
    }
}

/// Pass-through producer recording demand and cancellation of one attach.
pub struct TracedSubscription {
    upstream: Subscription,
    trace: AttachTrace,
    unsubscribed: AtomicBool,
}

impl TracedSubscription {
    pub fn new(upstream: Subscription, trace: AttachTrace) -> Self {
        Self {
            upstream,
            trace,
            unsubscribed: AtomicBool::new(false),
        }
    }
}

impl Producer for TracedSubscription {
    fn request(&self, n: u64) {
        // Demand from a detached consumer is inert and not part of the attach's lifecycle.
        if !self.unsubscribed.load(Ordering::Acquire) {
            self.trace.emit(Notification::Request(n));
        }
        self.upstream.request(n);
    }

    fn cancel(&self) {
        // Cancelling is idempotent; only the first call is a lifecycle event.
        if !self.unsubscribed.swap(true, Ordering::AcqRel) {
            self.trace.emit(Notification::Unsubscribe);
        }
        self.upstream.cancel();
    }
}
