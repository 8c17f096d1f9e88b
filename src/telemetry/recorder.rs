use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use super::context::{Context, StreamId};
use super::notification::Kind;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("recorder lock poisoned by a panicking writer")]
    Poisoned,
}

/// Receives every context emitted by a tracer.
///
/// Called concurrently from independent streams; implementations must not drop
/// a context and must keep their critical section short.
pub trait NotificationListener: Send + Sync {
    fn on_notification(&self, context: Context) -> Result<(), RecordError>;
}

/// Groups contexts by originating stream, each group an append-only log in sequence order.
#[derive(Debug, Default)]
pub struct Recorder {
    groups: Mutex<HashMap<StreamId, Vec<Context>>>,
    recorded: AtomicU64,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, context: Context) -> Result<(), RecordError> {
        let mut groups = self.groups.lock().map_err(|_| RecordError::Poisoned)?;
        let log = groups.entry(context.origin()).or_default();
        match log.last() {
            Some(last) if last.sequence() > context.sequence() => {
                let at = log.partition_point(|c| c.sequence() < context.sequence());
                log.insert(at, context);
            }
            _ => log.push(context),
        }
        self.recorded.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Owned copy of every group; later `record` calls do not affect it.
    pub fn snapshot(&self) -> Snapshot {
        // Groups only ever grow by whole contexts, so a poisoned map is still consistent.
        let groups = self.groups.lock().unwrap_or_else(|p| p.into_inner());
        let mut streams: Vec<StreamTrace> = groups
            .iter()
            .map(|(stream, contexts)| StreamTrace {
                stream: *stream,
                contexts: contexts.clone(),
            })
            .collect();
        streams.sort_by_key(|trace| trace.first_sequence());
        Snapshot { streams }
    }

    /// Number of stream groups.
    pub fn len(&self) -> usize {
        self.groups.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Contexts recorded since construction or the last reset.
    pub fn recorded(&self) -> u64 {
        self.recorded.load(Ordering::Relaxed)
    }

    /// Clears every group. Only valid between runs, never while tracers emit.
    pub fn reset(&self) {
        let mut groups = self.groups.lock().unwrap_or_else(|p| p.into_inner());
        let dropped = groups.len();
        groups.clear();
        self.recorded.store(0, Ordering::Relaxed);
        info!(groups = dropped, "Recorder reset");
    }
}

impl NotificationListener for Recorder {
    fn on_notification(&self, context: Context) -> Result<(), RecordError> {
        self.record(context)
    }
}

/// Contexts of one stream, ascending by sequence.
#[derive(Debug, Clone, Serialize)]
pub struct StreamTrace {
    stream: StreamId,
    contexts: Vec<Context>,
}

impl StreamTrace {
    pub fn new(stream: StreamId, contexts: Vec<Context>) -> Self {
        Self { stream, contexts }
    }

    pub fn stream(&self) -> StreamId {
        self.stream
    }

    pub fn contexts(&self) -> &[Context] {
        &self.contexts
    }

    pub fn kinds(&self) -> Vec<Kind> {
        self.contexts.iter().map(Context::kind).collect()
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    fn first_sequence(&self) -> u64 {
        self.contexts.first().map_or(u64::MAX, Context::sequence)
    }
}

/// Read-only view of a recorder at one point in time.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Snapshot {
    streams: Vec<StreamTrace>,
}

impl Snapshot {
    pub fn new(streams: Vec<StreamTrace>) -> Self {
        Self { streams }
    }

    /// Groups ordered by their first sequence number.
    pub fn streams(&self) -> &[StreamTrace] {
        &self.streams
    }

    pub fn get(&self, stream: StreamId) -> Option<&StreamTrace> {
        self.streams.iter().find(|trace| trace.stream == stream)
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Human-readable listing for diagnostics.
    pub fn render(&self) -> String {
        self.to_string()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for trace in &self.streams {
            writeln!(f, "stream {} ({} notifications)", trace.stream.short(), trace.len())?;
            for context in &trace.contexts {
                writeln!(f, "    {}", context)?;
            }
        }
        Ok(())
    }
}
