//! Flow-control instrumentation.
//!
//! # TRANSPARENCY INVARIANT
//! The tracer is a READ-ONLY side-effect layer over the pipeline.
//! It must **NEVER** change which values flow, when they flow, or how a stream terminates.
//! Every notification is emitted inline with the real event, before it is forwarded.
//!
//! # ORDERING INVARIANT
//! Every `Context` carries a process-wide sequence number. Within one attach the
//! sequence is strictly increasing, so a recorded group is already in causal order.

pub mod context;
pub mod hook;
pub mod notification;
pub mod recorder;
pub mod traced;
pub mod validator;

pub use context::{Context, StreamId};
pub use hook::{AttachTrace, DebugHook, ExecutionHook, HookRegistry, NoopHook};
pub use notification::{Kind, Notification, Value};
pub use recorder::{NotificationListener, RecordError, Recorder, Snapshot, StreamTrace};
pub use traced::{TracedSubscriber, TracedSubscription};
pub use validator::{
    validate, Offending, ValidationError, ValidationReport, Validator, ValidatorState, Violation,
};
