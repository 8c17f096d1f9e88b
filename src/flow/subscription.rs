use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::UNBOUNDED;

/// Upstream side of an attach: accepts demand and cancellation.
pub trait Producer: Send + Sync {
    /// Adds `n` to outstanding demand. `UNBOUNDED` lifts the limit for good.
    fn request(&self, n: u64);
    /// Idempotent.
    fn cancel(&self);
}

/// Cloneable handle a subscriber uses to pull values or detach.
#[derive(Clone)]
pub struct Subscription {
    producer: Arc<dyn Producer>,
}

impl Subscription {
    pub fn new(producer: impl Producer + 'static) -> Self {
        Self {
            producer: Arc::new(producer),
        }
    }

    pub fn from_arc(producer: Arc<dyn Producer>) -> Self {
        Self { producer }
    }

    pub fn request(&self, n: u64) {
        self.producer.request(n);
    }

    pub fn cancel(&self) {
        self.producer.cancel();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

/// Producer for attaches that have nothing left to deliver.
pub(crate) struct Inert;

impl Producer for Inert {
    fn request(&self, _n: u64) {}
    fn cancel(&self) {}
}

pub(crate) fn add_demand(requested: &AtomicU64, n: u64) {
    let _ = requested.fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
        if current == UNBOUNDED {
            None
        } else {
            Some(current.saturating_add(n))
        }
    });
}

/// Spends one unit of demand; unbounded demand is never spent.
pub(crate) fn consume_demand(requested: &AtomicU64) {
    let _ = requested.fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| match current {
        0 | UNBOUNDED => None,
        n => Some(n - 1),
    });
}
