use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize, Serializer};

use crate::flow::{StreamError, UNBOUNDED};

/// The closed vocabulary of lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Kind {
    Subscribe,
    OnStart,
    Request,
    OnNext,
    OnCompleted,
    OnError,
    Unsubscribe,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

trait Payload: Any + fmt::Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any + fmt::Debug + Send + Sync> Payload for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Opaque copy of a value delivered through `OnNext`.
#[derive(Clone)]
pub struct Value(Arc<dyn Payload>);

impl Value {
    pub fn new<T: Any + fmt::Debug + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        let payload: &dyn Payload = &*self.0;
        payload.as_any().downcast_ref::<T>()
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let payload: &dyn Payload = &*self.0;
        fmt::Debug::fmt(payload, f)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&format_args!("{:?}", self))
    }
}

/// One lifecycle event. The payload is fixed by the variant.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "payload")]
pub enum Notification {
    Subscribe,
    OnStart,
    /// Requested amount; `UNBOUNDED` means no limit.
    Request(u64),
    OnNext(Value),
    OnCompleted,
    OnError(StreamError),
    Unsubscribe,
}

impl Notification {
    pub fn kind(&self) -> Kind {
        match self {
            Notification::Subscribe => Kind::Subscribe,
            Notification::OnStart => Kind::OnStart,
            Notification::Request(_) => Kind::Request,
            Notification::OnNext(_) => Kind::OnNext,
            Notification::OnCompleted => Kind::OnCompleted,
            Notification::OnError(_) => Kind::OnError,
            Notification::Unsubscribe => Kind::Unsubscribe,
        }
    }

    pub fn requested(&self) -> Option<u64> {
        match self {
            Notification::Request(n) => Some(*n),
            _ => None,
        }
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            Notification::OnNext(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&StreamError> {
        match self {
            Notification::OnError(error) => Some(error),
            _ => None,
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::Request(UNBOUNDED) => write!(f, "Request(∞)"),
            Notification::Request(n) => write!(f, "Request({})", n),
            Notification::OnNext(value) => write!(f, "OnNext({:?})", value),
            Notification::OnError(error) => write!(f, "OnError({})", error),
            other => write!(f, "{}", other.kind()),
        }
    }
}
