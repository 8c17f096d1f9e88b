use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::flow::subscription::{add_demand, consume_demand};
use crate::flow::{
    lock, BoxSubscriber, Item, Observable, Producer, StreamError, Subscriber, Subscription, UNBOUNDED,
};
use crate::flow::observable::Attach;

type Mapper<T, R> = Arc<dyn Fn(T) -> Observable<R> + Send + Sync>;

struct MergeState<R> {
    queue: VecDeque<(u64, R)>,
    /// Live derived subscriptions, keyed by derivation index.
    inners: HashMap<u64, Subscription>,
    active: usize,
    outer_done: bool,
    failed: bool,
    error: Option<StreamError>,
}

enum Step<R> {
    Emit(u64, R),
    Fail(StreamError),
    Complete,
    Idle,
}

/// Shared by the outer subscriber, every derived subscriber and the downstream
/// subscription. Queued values reach downstream only from the drain loop.
struct MergeCore<R> {
    attach: Attach,
    prefetch: u64,
    state: Mutex<MergeState<R>>,
    downstream: Mutex<Option<BoxSubscriber<R>>>,
    outer: Mutex<Option<Subscription>>,
    requested: AtomicU64,
    wip: AtomicUsize,
    cancelled: AtomicBool,
}

impl<R: Item> MergeCore<R> {
    fn drain(&self) {
        if self.wip.fetch_add(1, Ordering::AcqRel) != 0 {
            return;
        }
        let mut missed = 1;
        loop {
            self.drain_pass();
            missed = self.wip.fetch_sub(missed, Ordering::AcqRel) - missed;
            if missed == 0 {
                break;
            }
        }
    }

    fn drain_pass(&self) {
        let mut downstream = lock(&self.downstream);
        if downstream.is_none() {
            return;
        }

        loop {
            if self.cancelled.load(Ordering::Acquire) {
                lock(&self.state).queue.clear();
                *downstream = None;
                return;
            }

            // The state lock is never held while calling out.
            let step = {
                let mut state = lock(&self.state);
                if let Some(error) = state.error.take() {
                    state.queue.clear();
                    Step::Fail(error)
                } else if self.requested.load(Ordering::Acquire) > 0 && !state.queue.is_empty() {
                    match state.queue.pop_front() {
                        Some((index, value)) => Step::Emit(index, value),
                        None => Step::Idle,
                    }
                } else if state.queue.is_empty() && state.outer_done && state.active == 0 {
                    Step::Complete
                } else {
                    Step::Idle
                }
            };

            match step {
                Step::Emit(index, value) => {
                    consume_demand(&self.requested);
                    if let Some(sink) = downstream.as_mut() {
                        sink.on_next(value);
                    }
                    self.replenish(index);
                }
                Step::Fail(error) => {
                    if let Some(mut sink) = downstream.take() {
                        sink.on_error(error);
                    }
                    return;
                }
                Step::Complete => {
                    if let Some(mut sink) = downstream.take() {
                        sink.on_completed();
                    }
                    return;
                }
                Step::Idle => return,
            }
        }
    }

    /// One delivered value buys its derived stream one more.
    fn replenish(&self, index: u64) {
        if self.cancelled.load(Ordering::Acquire) {
            return;
        }
        let inner = lock(&self.state).inners.get(&index).cloned();
        if let Some(inner) = inner {
            inner.request(1);
        }
    }

    fn cancel_sources(&self) {
        let outer = lock(&self.outer).take();
        if let Some(outer) = outer {
            outer.cancel();
        }
        let inners: Vec<Subscription> = lock(&self.state).inners.drain().map(|(_, s)| s).collect();
        for inner in inners {
            inner.cancel();
        }
    }

    fn fail(&self, error: StreamError) {
        {
            let mut state = lock(&self.state);
            state.failed = true;
            if state.error.is_none() {
                state.error = Some(error);
            }
        }
        self.cancel_sources();
        self.drain();
    }
}

impl<R: Item> Producer for MergeCore<R> {
    fn request(&self, n: u64) {
        if n == 0 {
            return;
        }
        add_demand(&self.requested, n);
        self.drain();
    }

    fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::AcqRel) {
            self.cancel_sources();
            self.drain();
        }
    }
}

/// Subscribes to every derived stream and merges their values downstream.
pub(crate) struct MergeSubscriber<T, R> {
    core: Arc<MergeCore<R>>,
    mapper: Mapper<T, R>,
    pending_downstream: Option<BoxSubscriber<R>>,
    next_index: u64,
}

impl<T, R: Item> MergeSubscriber<T, R> {
    pub(crate) fn new(
        downstream: BoxSubscriber<R>,
        mapper: Mapper<T, R>,
        attach: Attach,
    ) -> Self {
        let prefetch = attach.config.merge_prefetch.max(1);
        Self {
            core: Arc::new(MergeCore {
                attach,
                prefetch,
                state: Mutex::new(MergeState {
                    queue: VecDeque::new(),
                    inners: HashMap::new(),
                    active: 0,
                    outer_done: false,
                    failed: false,
                    error: None,
                }),
                downstream: Mutex::new(None),
                outer: Mutex::new(None),
                requested: AtomicU64::new(0),
                wip: AtomicUsize::new(0),
                cancelled: AtomicBool::new(false),
            }),
            mapper,
            pending_downstream: Some(downstream),
            next_index: 0,
        }
    }
}

impl<T: Item, R: Item> Subscriber<T> for MergeSubscriber<T, R> {
    fn on_start(&mut self, subscription: Subscription) {
        *lock(&self.core.outer) = Some(subscription.clone());
        let Some(mut downstream) = self.pending_downstream.take() else {
            return;
        };

        downstream.on_start(Subscription::from_arc(self.core.clone()));
        *lock(&self.core.downstream) = Some(downstream);
        if self.core.cancelled.load(Ordering::Acquire) {
            self.core.drain();
            return;
        }
        subscription.request(UNBOUNDED);
        self.core.drain();
    }

    fn on_next(&mut self, value: T) {
        if self.core.cancelled.load(Ordering::Acquire) {
            return;
        }
        let index = self.next_index;
        self.next_index += 1;
        lock(&self.core.state).active += 1;

        let inner = Box::new(InnerSubscriber {
            index,
            core: Arc::clone(&self.core),
        });
        (self.mapper)(value).subscribe_within(inner, &self.core.attach);
    }

    fn on_error(&mut self, error: StreamError) {
        self.core.fail(error);
    }

    fn on_completed(&mut self) {
        lock(&self.core.state).outer_done = true;
        self.core.drain();
    }
}

struct InnerSubscriber<R> {
    index: u64,
    core: Arc<MergeCore<R>>,
}

impl<R: Item> Subscriber<R> for InnerSubscriber<R> {
    fn on_start(&mut self, subscription: Subscription) {
        let rejected = {
            let mut state = lock(&self.core.state);
            let rejected = self.core.cancelled.load(Ordering::Acquire) || state.failed;
            if !rejected {
                state.inners.insert(self.index, subscription.clone());
            }
            rejected
        };
        if rejected {
            subscription.cancel();
        } else {
            subscription.request(self.core.prefetch);
        }
    }

    fn on_next(&mut self, value: R) {
        lock(&self.core.state).queue.push_back((self.index, value));
        self.core.drain();
    }

    fn on_error(&mut self, error: StreamError) {
        {
            let mut state = lock(&self.core.state);
            state.inners.remove(&self.index);
            state.active = state.active.saturating_sub(1);
        }
        self.core.fail(error);
    }

    fn on_completed(&mut self) {
        {
            let mut state = lock(&self.core.state);
            state.inners.remove(&self.index);
            state.active = state.active.saturating_sub(1);
        }
        self.core.drain();
    }
}
