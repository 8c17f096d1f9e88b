use std::marker::PhantomData;
use std::sync::{Arc, Mutex};

use super::error::StreamError;
use super::subscription::Subscription;
use super::{lock, UNBOUNDED};

/// Downstream side of an attach.
///
/// `on_start` is called exactly once, before any other signal. After
/// `on_error` or `on_completed` nothing else arrives.
pub trait Subscriber<T>: Send {
    fn on_start(&mut self, subscription: Subscription);
    fn on_next(&mut self, value: T);
    fn on_error(&mut self, error: StreamError);
    fn on_completed(&mut self);
}

pub type BoxSubscriber<T> = Box<dyn Subscriber<T>>;

impl<T, S: Subscriber<T> + ?Sized> Subscriber<T> for Box<S> {
    fn on_start(&mut self, subscription: Subscription) {
        (**self).on_start(subscription)
    }

    fn on_next(&mut self, value: T) {
        (**self).on_next(value)
    }

    fn on_error(&mut self, error: StreamError) {
        (**self).on_error(error)
    }

    fn on_completed(&mut self) {
        (**self).on_completed()
    }
}

/// Wraps every attach: drops signals after a terminal event and releases the
/// subscription right after forwarding one.
pub struct SafeSubscriber<T> {
    inner: BoxSubscriber<T>,
    subscription: Option<Subscription>,
    done: bool,
}

impl<T> SafeSubscriber<T> {
    pub fn new(inner: BoxSubscriber<T>) -> Self {
        Self {
            inner,
            subscription: None,
            done: false,
        }
    }

    fn release(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.cancel();
        }
    }
}

impl<T> Subscriber<T> for SafeSubscriber<T> {
    fn on_start(&mut self, subscription: Subscription) {
        self.subscription = Some(subscription.clone());
        self.inner.on_start(subscription);
    }

    fn on_next(&mut self, value: T) {
        if !self.done {
            self.inner.on_next(value);
        }
    }

    fn on_error(&mut self, error: StreamError) {
        if self.done {
            return;
        }
        self.done = true;
        self.inner.on_error(error);
        self.release();
    }

    fn on_completed(&mut self) {
        if self.done {
            return;
        }
        self.done = true;
        self.inner.on_completed();
        self.release();
    }
}

/// Ready-made consumers.
pub struct Subscribers;

impl Subscribers {
    /// Requests everything and ignores it.
    pub fn empty<T>() -> EmptySubscriber<T> {
        EmptySubscriber(PhantomData)
    }

    /// Detaches during `on_start` without requesting anything.
    pub fn cancelling<T>() -> CancellingSubscriber<T> {
        CancellingSubscriber(PhantomData)
    }
}

pub struct EmptySubscriber<T>(PhantomData<fn(T)>);

impl<T> Subscriber<T> for EmptySubscriber<T> {
    fn on_start(&mut self, subscription: Subscription) {
        subscription.request(UNBOUNDED);
    }

    fn on_next(&mut self, _value: T) {}

    fn on_error(&mut self, _error: StreamError) {}

    fn on_completed(&mut self) {}
}

pub struct CancellingSubscriber<T>(PhantomData<fn(T)>);

impl<T> Subscriber<T> for CancellingSubscriber<T> {
    fn on_start(&mut self, subscription: Subscription) {
        subscription.cancel();
    }

    fn on_next(&mut self, _value: T) {}

    fn on_error(&mut self, _error: StreamError) {}

    fn on_completed(&mut self) {}
}

struct ProbeState<T> {
    values: Vec<T>,
    errors: Vec<StreamError>,
    completions: usize,
    subscription: Option<Subscription>,
}

/// Shared view of what a `TestSubscriber` received.
pub struct TestProbe<T> {
    state: Arc<Mutex<ProbeState<T>>>,
}

impl<T> Clone for TestProbe<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T: Clone> TestProbe<T> {
    pub fn values(&self) -> Vec<T> {
        lock(&self.state).values.clone()
    }

    pub fn errors(&self) -> Vec<StreamError> {
        lock(&self.state).errors.clone()
    }

    pub fn completions(&self) -> usize {
        lock(&self.state).completions
    }

    pub fn is_completed(&self) -> bool {
        self.completions() > 0
    }

    /// Pulls `n` more values. A no-op before `on_start`.
    pub fn request(&self, n: u64) {
        // Delivery re-enters the subscriber, so the lock must be released first.
        let subscription = lock(&self.state).subscription.clone();
        if let Some(subscription) = subscription {
            subscription.request(n);
        }
    }

    pub fn cancel(&self) {
        let subscription = lock(&self.state).subscription.clone();
        if let Some(subscription) = subscription {
            subscription.cancel();
        }
    }
}

/// Records every signal; requests `initial_request` when started.
pub struct TestSubscriber<T> {
    initial_request: u64,
    state: Arc<Mutex<ProbeState<T>>>,
}

impl<T> TestSubscriber<T> {
    pub fn new(initial_request: u64) -> (Self, TestProbe<T>) {
        let state = Arc::new(Mutex::new(ProbeState {
            values: Vec::new(),
            errors: Vec::new(),
            completions: 0,
            subscription: None,
        }));
        let probe = TestProbe {
            state: Arc::clone(&state),
        };
        (Self { initial_request, state }, probe)
    }

    pub fn unbounded() -> (Self, TestProbe<T>) {
        Self::new(UNBOUNDED)
    }
}

impl<T: Send> Subscriber<T> for TestSubscriber<T> {
    fn on_start(&mut self, subscription: Subscription) {
        lock(&self.state).subscription = Some(subscription.clone());
        if self.initial_request > 0 {
            subscription.request(self.initial_request);
        }
    }

    fn on_next(&mut self, value: T) {
        lock(&self.state).values.push(value);
    }

    fn on_error(&mut self, error: StreamError) {
        lock(&self.state).errors.push(error);
    }

    fn on_completed(&mut self) {
        lock(&self.state).completions += 1;
    }
}
