use std::sync::Arc;

use crate::flow::{BoxSubscriber, Item, StreamError, Subscriber, Subscription};

pub(crate) struct MapSubscriber<T, R, F> {
    downstream: BoxSubscriber<R>,
    f: Arc<F>,
    _input: std::marker::PhantomData<fn(T)>,
}

impl<T, R, F> MapSubscriber<T, R, F> {
    pub(crate) fn new(downstream: BoxSubscriber<R>, f: Arc<F>) -> Self {
        Self {
            downstream,
            f,
            _input: std::marker::PhantomData,
        }
    }
}

impl<T, R, F> Subscriber<T> for MapSubscriber<T, R, F>
where
    T: Item,
    R: Item,
    F: Fn(T) -> R + Send + Sync + 'static,
{
    fn on_start(&mut self, subscription: Subscription) {
        self.downstream.on_start(subscription);
    }

    fn on_next(&mut self, value: T) {
        self.downstream.on_next((self.f)(value));
    }

    fn on_error(&mut self, error: StreamError) {
        self.downstream.on_error(error);
    }

    fn on_completed(&mut self) {
        self.downstream.on_completed();
    }
}
