use std::iter::Peekable;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::error::StreamError;
use super::subscriber::BoxSubscriber;
use super::subscription::{add_demand, consume_demand, Producer, Subscription};
use super::{lock, Item};

struct IterState<T, I: Iterator> {
    source: Peekable<I>,
    subscriber: Option<BoxSubscriber<T>>,
}

/// Emits an iterator's items as demand arrives. Only the thread holding the
/// `wip` ticket touches the subscriber; re-entrant requests just leave a ticket.
pub(crate) struct IterProducer<T, I: Iterator> {
    state: Mutex<IterState<T, I>>,
    requested: AtomicU64,
    wip: AtomicUsize,
    cancelled: AtomicBool,
}

impl<T, I> IterProducer<T, I>
where
    T: Item,
    I: Iterator<Item = Result<T, StreamError>> + Send + 'static,
{
    pub(crate) fn attach(source: I, mut subscriber: BoxSubscriber<T>) {
        let producer = Arc::new(Self {
            state: Mutex::new(IterState {
                source: source.peekable(),
                subscriber: None,
            }),
            requested: AtomicU64::new(0),
            wip: AtomicUsize::new(0),
            cancelled: AtomicBool::new(false),
        });

        // Demand raised inside on_start is parked until the subscriber is stored.
        subscriber.on_start(Subscription::from_arc(producer.clone()));
        if producer.cancelled.load(Ordering::Acquire) {
            return;
        }
        lock(&producer.state).subscriber = Some(subscriber);
        producer.drain();
    }

    fn drain(&self) {
        if self.wip.fetch_add(1, Ordering::AcqRel) != 0 {
            return;
        }
        let mut missed = 1;
        loop {
            self.emit_pending();
            missed = self.wip.fetch_sub(missed, Ordering::AcqRel) - missed;
            if missed == 0 {
                break;
            }
        }
    }

    fn emit_pending(&self) {
        let mut state = lock(&self.state);
        let IterState { source, subscriber } = &mut *state;
        if subscriber.is_none() {
            return;
        }

        loop {
            if self.cancelled.load(Ordering::Acquire) {
                *subscriber = None;
                return;
            }
            // Termination needs no demand; values do.
            match source.peek() {
                None => {
                    if let Some(mut done) = subscriber.take() {
                        done.on_completed();
                    }
                    return;
                }
                Some(Err(_)) => {
                    if let (Some(Err(error)), Some(mut failed)) = (source.next(), subscriber.take()) {
                        failed.on_error(error);
                    }
                    return;
                }
                Some(Ok(_)) => {
                    if self.requested.load(Ordering::Acquire) == 0 {
                        return;
                    }
                    if let (Some(Ok(value)), Some(sink)) = (source.next(), subscriber.as_mut()) {
                        consume_demand(&self.requested);
                        sink.on_next(value);
                    }
                }
            }
        }
    }
}

impl<T, I> Producer for IterProducer<T, I>
where
    T: Item,
    I: Iterator<Item = Result<T, StreamError>> + Send + 'static,
{
    fn request(&self, n: u64) {
        if n == 0 {
            return;
        }
        add_demand(&self.requested, n);
        self.drain();
    }

    fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::AcqRel) {
            self.drain();
        }
    }
}
