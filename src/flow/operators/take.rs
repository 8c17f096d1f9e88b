use std::sync::atomic::{AtomicU64, Ordering};

use crate::flow::subscription::Inert;
use crate::flow::{BoxSubscriber, Item, Producer, StreamError, Subscriber, Subscription};

/// Caps the demand forwarded upstream at whatever is left of `limit`.
struct TakeProducer {
    upstream: Subscription,
    limit: u64,
    granted: AtomicU64,
}

impl Producer for TakeProducer {
    fn request(&self, n: u64) {
        let mut grant = 0;
        let _ = self.granted.fetch_update(Ordering::AcqRel, Ordering::Acquire, |granted| {
            grant = n.min(self.limit - granted);
            if grant == 0 {
                None
            } else {
                Some(granted + grant)
            }
        });
        if grant > 0 {
            self.upstream.request(grant);
        }
    }

    fn cancel(&self) {
        self.upstream.cancel();
    }
}

pub(crate) struct TakeSubscriber<T> {
    downstream: BoxSubscriber<T>,
    limit: u64,
    received: u64,
    upstream: Option<Subscription>,
    done: bool,
}

impl<T> TakeSubscriber<T> {
    pub(crate) fn new(downstream: BoxSubscriber<T>, limit: u64) -> Self {
        Self {
            downstream,
            limit,
            received: 0,
            upstream: None,
            done: false,
        }
    }
}

impl<T: Item> Subscriber<T> for TakeSubscriber<T> {
    fn on_start(&mut self, subscription: Subscription) {
        if self.limit == 0 {
            subscription.cancel();
            self.done = true;
            self.downstream.on_start(Subscription::new(Inert));
            self.downstream.on_completed();
            return;
        }

        self.upstream = Some(subscription.clone());
        self.downstream.on_start(Subscription::new(TakeProducer {
            upstream: subscription,
            limit: self.limit,
            granted: AtomicU64::new(0),
        }));
    }

    fn on_next(&mut self, value: T) {
        if self.done {
            return;
        }
        self.received += 1;
        let last = self.received >= self.limit;
        if last {
            self.done = true;
        }
        self.downstream.on_next(value);
        if last {
            self.downstream.on_completed();
            if let Some(upstream) = self.upstream.take() {
                upstream.cancel();
            }
        }
    }

    fn on_error(&mut self, error: StreamError) {
        if !self.done {
            self.done = true;
            self.downstream.on_error(error);
        }
    }

    fn on_completed(&mut self) {
        if !self.done {
            self.done = true;
            self.downstream.on_completed();
        }
    }
}
