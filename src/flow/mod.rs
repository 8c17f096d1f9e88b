//! Minimal pull-with-push stream pipeline.
//!
//! Consumers signal demand through `Subscription::request`; producers never
//! deliver more than was requested. Signals for one attach are serial, while
//! independent attaches may run on different threads.

mod error;
mod observable;
mod operators;
mod source;
mod subscriber;
mod subscription;

use std::fmt;
use std::sync::{Mutex, MutexGuard};

pub use error::StreamError;
pub use observable::Observable;
pub use subscriber::{
    BoxSubscriber, CancellingSubscriber, EmptySubscriber, SafeSubscriber, Subscriber, Subscribers,
    TestProbe, TestSubscriber,
};
pub use subscription::{Producer, Subscription};

/// Demand sentinel meaning "no limit".
pub const UNBOUNDED: u64 = u64::MAX;

/// Anything that can flow through a pipeline and be captured by the tracer.
pub trait Item: Clone + fmt::Debug + Send + Sync + 'static {}

impl<T: Clone + fmt::Debug + Send + Sync + 'static> Item for T {}

/// Pipeline state stays usable after a panicking user callback.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|p| p.into_inner())
}
