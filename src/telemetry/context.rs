use std::cmp::Ordering;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::notification::{Kind, Notification};

static NEXT_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static TRACE_EPOCH: OnceLock<Instant> = OnceLock::new();

/// Identity of one traced attach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamId(Uuid);

impl StreamId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// First eight hex digits, enough to tell groups apart in a rendering.
    pub fn short(&self) -> String {
        let mut simple = self.0.simple().to_string();
        simple.truncate(8);
        simple
    }
}

impl Default for StreamId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A notification stamped with its place in the global order.
///
/// Immutable once created. Equality and ordering only look at `sequence`,
/// which is unique for the whole process run.
#[derive(Debug, Clone, Serialize)]
pub struct Context {
    sequence: u64,
    origin: StreamId,
    elapsed: Duration,
    notification: Notification,
}

impl Context {
    /// Stamps `notification` with the next global sequence number.
    pub fn new(origin: StreamId, notification: Notification) -> Self {
        let epoch = *TRACE_EPOCH.get_or_init(Instant::now);
        Self {
            sequence: NEXT_SEQUENCE.fetch_add(1, AtomicOrdering::Relaxed),
            origin,
            elapsed: epoch.elapsed(),
            notification,
        }
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn origin(&self) -> StreamId {
        self.origin
    }

    /// Time since the first context of the process was created.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn notification(&self) -> &Notification {
        &self.notification
    }

    pub fn kind(&self) -> Kind {
        self.notification.kind()
    }
}

impl PartialEq for Context {
    fn eq(&self, other: &Self) -> bool {
        self.sequence == other.sequence
    }
}

impl Eq for Context {}

impl PartialOrd for Context {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Context {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sequence.cmp(&other.sequence)
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} +{:.6}s {}",
            self.sequence,
            self.elapsed.as_secs_f64(),
            self.notification
        )
    }
}
