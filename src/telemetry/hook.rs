use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tracing::{debug, info, warn};

use super::context::{Context, StreamId};
use super::notification::Notification;
use super::recorder::NotificationListener;
use crate::config::TracerConfig;

/// Instrumentation point the pipeline calls whenever a consumer attaches.
pub trait ExecutionHook: Send + Sync {
    /// Opens a trace for a new attach. `None` leaves the attach uninstrumented.
    fn on_subscribe_start(&self) -> Option<AttachTrace>;
}

/// Default instrumentation: traces nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHook;

impl ExecutionHook for NoopHook {
    fn on_subscribe_start(&self) -> Option<AttachTrace> {
        None
    }
}

#[derive(Debug, Default)]
struct HookStats {
    attaches: AtomicU64,
    failures: AtomicU64,
}

/// Emission handle shared by the subscriber/subscription pair of one attach.
#[derive(Clone)]
pub struct AttachTrace {
    origin: StreamId,
    listener: Arc<dyn NotificationListener>,
    stats: Arc<HookStats>,
    log_notifications: bool,
}

impl AttachTrace {
    pub fn origin(&self) -> StreamId {
        self.origin
    }

    /// Stamps and hands off one notification. Never blocks beyond the listener's
    /// critical section, and a listener failure never stops the real event.
    pub fn emit(&self, notification: Notification) {
        let context = Context::new(self.origin, notification);
        if self.log_notifications {
            debug!(stream = %self.origin.short(), sequence = context.sequence(), "{}", context.notification());
        }

        let sequence = context.sequence();
        if let Err(e) = self.listener.on_notification(context) {
            self.stats.failures.fetch_add(1, Ordering::Relaxed);
            warn!(stream = %self.origin, sequence, "Notification not recorded: {}", e);
        }
    }
}

/// Traces every attach into a `NotificationListener`.
pub struct DebugHook {
    listener: Arc<dyn NotificationListener>,
    stats: Arc<HookStats>,
    config: TracerConfig,
}

impl DebugHook {
    pub fn new(listener: Arc<dyn NotificationListener>) -> Self {
        Self::with_config(listener, TracerConfig::default())
    }

    pub fn with_config(listener: Arc<dyn NotificationListener>, config: TracerConfig) -> Self {
        Self {
            listener,
            stats: Arc::new(HookStats::default()),
            config,
        }
    }

    /// Attaches traced so far.
    pub fn attaches(&self) -> u64 {
        self.stats.attaches.load(Ordering::Relaxed)
    }

    /// Notifications the listener refused.
    pub fn failures(&self) -> u64 {
        self.stats.failures.load(Ordering::Relaxed)
    }
}

impl ExecutionHook for DebugHook {
    fn on_subscribe_start(&self) -> Option<AttachTrace> {
        self.stats.attaches.fetch_add(1, Ordering::Relaxed);
        Some(AttachTrace {
            origin: StreamId::new(),
            listener: Arc::clone(&self.listener),
            stats: Arc::clone(&self.stats),
            log_notifications: self.config.log_notifications,
        })
    }
}

/// Holds at most one active hook. Owned by the composition root and handed to
/// pipelines explicitly instead of living in a process-wide static.
#[derive(Default)]
pub struct HookRegistry {
    slot: RwLock<Option<Arc<dyn ExecutionHook>>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `hook`, returning the one it replaced.
    pub fn install(&self, hook: Arc<dyn ExecutionHook>) -> Option<Arc<dyn ExecutionHook>> {
        let mut slot = self.slot.write().unwrap_or_else(|p| p.into_inner());
        let previous = slot.replace(hook);
        if previous.is_some() {
            warn!("Replacing installed execution hook");
        } else {
            info!("Execution hook installed");
        }
        previous
    }

    /// The installed hook, or `NoopHook` when the slot is empty.
    pub fn current(&self) -> Arc<dyn ExecutionHook> {
        let slot = self.slot.read().unwrap_or_else(|p| p.into_inner());
        match slot.as_ref() {
            Some(hook) => Arc::clone(hook),
            None => Arc::new(NoopHook),
        }
    }

    pub fn is_installed(&self) -> bool {
        self.slot.read().unwrap_or_else(|p| p.into_inner()).is_some()
    }

    /// Back to "no instrumentation". Must not race with active tracers.
    pub fn reset(&self) {
        let mut slot = self.slot.write().unwrap_or_else(|p| p.into_inner());
        if slot.take().is_some() {
            info!("Execution hook reset");
        }
    }
}
