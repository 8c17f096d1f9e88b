pub mod config;
pub mod flow;
pub mod telemetry;

pub use config::FlowTraceConfig;
pub use flow::{Observable, StreamError, Subscriber, Subscribers, Subscription, UNBOUNDED};
pub use telemetry::{DebugHook, ExecutionHook, HookRegistry, Recorder, Snapshot, Validator};
