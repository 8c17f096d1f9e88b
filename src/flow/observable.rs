use std::sync::Arc;

use super::error::StreamError;
use super::operators::{MapSubscriber, MergeSubscriber, TakeSubscriber};
use super::source::IterProducer;
use super::subscriber::{BoxSubscriber, SafeSubscriber, Subscriber};
use super::Item;
use crate::config::PipelineConfig;
use crate::telemetry::hook::{ExecutionHook, NoopHook};
use crate::telemetry::traced::instrument;

/// Instrumentation and tuning in effect for one attach. Resolved when the
/// outermost `subscribe` runs and handed down to every operator and derived stream.
#[derive(Clone)]
pub(crate) struct Attach {
    pub(crate) hook: Arc<dyn ExecutionHook>,
    pub(crate) config: PipelineConfig,
}

type OnSubscribe<T> = dyn Fn(BoxSubscriber<T>, &Attach) + Send + Sync;

/// A cold stream: every `subscribe` runs the source again for that consumer.
pub struct Observable<T> {
    on_subscribe: Arc<OnSubscribe<T>>,
    attach: Attach,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            on_subscribe: Arc::clone(&self.on_subscribe),
            attach: self.attach.clone(),
        }
    }
}

impl<T: Item> Observable<T> {
    /// Raw constructor. `on_subscribe` must call `on_start` first and honour demand.
    pub fn create<F>(on_subscribe: F) -> Self
    where
        F: Fn(BoxSubscriber<T>) + Send + Sync + 'static,
    {
        Self {
            on_subscribe: Arc::new(move |subscriber: BoxSubscriber<T>, _: &Attach| {
                on_subscribe(subscriber)
            }),
            attach: Attach {
                hook: Arc::new(NoopHook),
                config: PipelineConfig::default(),
            },
        }
    }

    pub fn from_iter<I>(values: I) -> Self
    where
        I: IntoIterator<Item = T> + Clone + Send + Sync + 'static,
        I::IntoIter: Send + 'static,
    {
        Self::create(move |subscriber| {
            IterProducer::attach(values.clone().into_iter().map(Ok::<T, StreamError>), subscriber)
        })
    }

    /// Emits the `Ok` values in order; the first `Err` terminates the stream.
    pub fn from_results<I>(results: I) -> Self
    where
        I: IntoIterator<Item = Result<T, StreamError>> + Clone + Send + Sync + 'static,
        I::IntoIter: Send + 'static,
    {
        Self::create(move |subscriber| IterProducer::attach(results.clone().into_iter(), subscriber))
    }

    pub fn just(value: T) -> Self {
        Self::from_iter(std::iter::once(value))
    }

    pub fn empty() -> Self {
        Self::from_iter(Vec::new())
    }

    pub fn fail(error: StreamError) -> Self {
        Self::from_results(vec![Err(error)])
    }

    /// Instruments every attach of this pipeline, derived streams included,
    /// wherever in the chain it is applied.
    pub fn with_hook(mut self, hook: Arc<dyn ExecutionHook>) -> Self {
        self.attach.hook = hook;
        self
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.attach.config = config;
        self
    }

    /// Attaches a consumer. The attach is traced when a hook is installed.
    pub fn subscribe<S>(&self, subscriber: S)
    where
        S: Subscriber<T> + 'static,
    {
        self.subscribe_within(Box::new(subscriber), &self.attach);
    }

    /// Attaches under an enclosing attach's hook and config, ignoring this
    /// observable's own. Used for derived streams.
    pub(crate) fn subscribe_within(&self, subscriber: BoxSubscriber<T>, attach: &Attach) {
        let safe: BoxSubscriber<T> = Box::new(SafeSubscriber::new(subscriber));
        let attached = instrument(attach.hook.as_ref(), safe);
        (self.on_subscribe)(attached, attach);
    }

    /// Chains an operator into this attach. Not an attach of its own, so not traced.
    fn lift<R, F>(&self, operator: F) -> Observable<R>
    where
        R: Item,
        F: Fn(BoxSubscriber<R>, &Attach) -> BoxSubscriber<T> + Send + Sync + 'static,
    {
        let source = Arc::clone(&self.on_subscribe);
        Observable {
            on_subscribe: Arc::new(move |downstream: BoxSubscriber<R>, attach: &Attach| {
                source(operator(downstream, attach), attach)
            }),
            attach: self.attach.clone(),
        }
    }

    pub fn map<R, F>(&self, f: F) -> Observable<R>
    where
        R: Item,
        F: Fn(T) -> R + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        self.lift(move |downstream: BoxSubscriber<R>, _: &Attach| -> BoxSubscriber<T> {
            Box::new(MapSubscriber::new(downstream, Arc::clone(&f)))
        })
    }

    /// First `limit` values, then completes and cancels upstream.
    pub fn take(&self, limit: u64) -> Observable<T> {
        self.lift(move |downstream: BoxSubscriber<T>, _: &Attach| -> BoxSubscriber<T> {
            Box::new(TakeSubscriber::new(downstream, limit))
        })
    }

    /// Subscribes to the stream `f` derives from each value and merges their values.
    /// Derived streams attach under the subscribing attach's hook and config, so
    /// each is traced as its own attach, however deeply nested.
    pub fn flat_map<R, F>(&self, f: F) -> Observable<R>
    where
        R: Item,
        F: Fn(T) -> Observable<R> + Send + Sync + 'static,
    {
        let mapper: Arc<dyn Fn(T) -> Observable<R> + Send + Sync> = Arc::new(f);
        self.lift(move |downstream: BoxSubscriber<R>, attach: &Attach| -> BoxSubscriber<T> {
            Box::new(MergeSubscriber::new(downstream, Arc::clone(&mapper), attach.clone()))
        })
    }
}
