use std::fmt;

use thiserror::Error;

use super::context::{Context, StreamId};
use super::notification::{Kind, Notification};
use super::recorder::{Snapshot, StreamTrace};
use crate::config::ValidatorConfig;
use crate::flow::UNBOUNDED;

/// A broken flow-control or lifecycle rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("subscriber wasn't used")]
    SubscriberNotUsed,
    #[error("first notification should be Subscribe or OnStart, found {0}")]
    WrongFirstEvent(Kind),
    #[error("{0} seen twice in one attach")]
    DuplicateStart(Kind),
    #[error("{0} before OnStart")]
    BeforeStart(Kind),
    #[error("OnNext delivered without outstanding request credit")]
    DeliveredWithoutCredit,
    #[error("{0} after Unsubscribe")]
    EventsAfterUnsubscribe(Kind),
    #[error("{0} not followed by Unsubscribe")]
    MissingUnsubscribe(Kind),
    #[error("{found} after {terminal}, expected Unsubscribe")]
    WrongEventAfterTerminal { terminal: Kind, found: Kind },
    #[error("stream neither terminated nor unsubscribed")]
    Unterminated,
    #[error("no stream was ever attached")]
    NoStreamsObserved,
}

/// Per-group walk over the contract:
///
/// | state           | event                 | next                      |
/// |-----------------|-----------------------|---------------------------|
/// | `AwaitingStart` | Subscribe             | `Running { started: false }` |
/// | `AwaitingStart` | OnStart               | `Running { started: true }`  |
/// | `Running`       | Subscribe / OnStart   | unchanged, OnStart marks `started` |
/// | `Running`       | Request(n)            | credit += n               |
/// | `Running`       | OnNext                | credit -= 1, needs credit |
/// | `Running`       | OnCompleted / OnError | `Terminated`              |
/// | `Running`       | Unsubscribe           | `Done`                    |
/// | `Terminated`    | Unsubscribe           | `Done`                    |
///
/// Anything else is a `Violation`. `step_strict` additionally rejects a repeated
/// Subscribe/OnStart and any Request or OnNext before OnStart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidatorState {
    AwaitingStart,
    /// `credit` is outstanding delivery credit; `UNBOUNDED` never decreases.
    /// Finite grants that sum to `UNBOUNDED` saturate into unlimited credit.
    Running { credit: u64, started: bool },
    Terminated { by: Kind },
    Done,
}

impl ValidatorState {
    pub fn step(self, notification: &Notification) -> Result<Self, Violation> {
        let kind = notification.kind();
        match self {
            ValidatorState::AwaitingStart => match kind {
                Kind::Subscribe => Ok(ValidatorState::Running { credit: 0, started: false }),
                Kind::OnStart => Ok(ValidatorState::Running { credit: 0, started: true }),
                other => Err(Violation::WrongFirstEvent(other)),
            },
            ValidatorState::Running { credit, started } => match notification {
                Notification::Subscribe => Ok(self),
                Notification::OnStart => Ok(ValidatorState::Running { credit, started: true }),
                Notification::Request(n) => Ok(ValidatorState::Running {
                    credit: grant(credit, *n),
                    started,
                }),
                Notification::OnNext(_) => match credit {
                    0 => Err(Violation::DeliveredWithoutCredit),
                    UNBOUNDED => Ok(self),
                    c => Ok(ValidatorState::Running { credit: c - 1, started }),
                },
                Notification::OnCompleted | Notification::OnError(_) => {
                    Ok(ValidatorState::Terminated { by: kind })
                }
                Notification::Unsubscribe => Ok(ValidatorState::Done),
            },
            ValidatorState::Terminated { by } => match kind {
                Kind::Unsubscribe => Ok(ValidatorState::Done),
                found => Err(Violation::WrongEventAfterTerminal { terminal: by, found }),
            },
            ValidatorState::Done => Err(Violation::EventsAfterUnsubscribe(kind)),
        }
    }

    /// `step` plus the start-order rules.
    pub fn step_strict(self, notification: &Notification) -> Result<Self, Violation> {
        if let ValidatorState::Running { started, .. } = self {
            match notification.kind() {
                Kind::Subscribe => return Err(Violation::DuplicateStart(Kind::Subscribe)),
                Kind::OnStart if started => return Err(Violation::DuplicateStart(Kind::OnStart)),
                kind @ (Kind::Request | Kind::OnNext) if !started => {
                    return Err(Violation::BeforeStart(kind))
                }
                _ => {}
            }
        }
        self.step(notification)
    }

    /// Checks the state a group ended in.
    pub fn finish(self) -> Result<(), Violation> {
        match self {
            ValidatorState::AwaitingStart => Err(Violation::SubscriberNotUsed),
            ValidatorState::Running { .. } => Err(Violation::Unterminated),
            ValidatorState::Terminated { by } => Err(Violation::MissingUnsubscribe(by)),
            ValidatorState::Done => Ok(()),
        }
    }
}

fn grant(credit: u64, n: u64) -> u64 {
    if n == UNBOUNDED {
        UNBOUNDED
    } else {
        credit.saturating_add(n)
    }
}

/// The context a violation was detected on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Offending {
    pub kind: Kind,
    pub sequence: u64,
}

impl From<&Context> for Offending {
    fn from(context: &Context) -> Self {
        Self {
            kind: context.kind(),
            sequence: context.sequence(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// `None` only for snapshot-wide failures.
    pub stream: Option<StreamId>,
    pub violation: Violation,
    pub offending: Option<Offending>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.stream {
            Some(stream) => write!(f, "stream {}: {}", stream, self.violation)?,
            None => write!(f, "{}", self.violation)?,
        }
        if let Some(offending) = self.offending {
            write!(f, " (at #{} {})", offending.sequence, offending.kind)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Every group that failed, in snapshot order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub failures: Vec<ValidationError>,
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} flow-control violation(s)", self.failures.len())?;
        for failure in &self.failures {
            write!(f, "\n  {}", failure)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationReport {}

#[derive(Debug, Clone, Default)]
pub struct Validator {
    require_activity: bool,
    strict_start: bool,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Treats a snapshot with no groups as a failure.
    pub fn requiring_activity() -> Self {
        Self {
            require_activity: true,
            strict_start: false,
        }
    }

    /// Also enforces `ValidatorState::step_strict` start-order rules.
    pub fn strict_start() -> Self {
        Self {
            require_activity: false,
            strict_start: true,
        }
    }

    pub fn from_config(config: &ValidatorConfig) -> Self {
        Self {
            require_activity: config.require_activity,
            strict_start: config.strict_start,
        }
    }

    /// Pure read of the snapshot; running it twice yields the same verdict.
    pub fn validate(&self, snapshot: &Snapshot) -> Result<(), ValidationReport> {
        if snapshot.is_empty() && self.require_activity {
            return Err(ValidationReport {
                failures: vec![ValidationError {
                    stream: None,
                    violation: Violation::NoStreamsObserved,
                    offending: None,
                }],
            });
        }

        let failures: Vec<ValidationError> = snapshot
            .streams()
            .iter()
            .filter_map(|trace| self.validate_stream(trace).err())
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ValidationReport { failures })
        }
    }

    /// Stops at the first violation in the group.
    pub fn validate_stream(&self, trace: &StreamTrace) -> Result<(), ValidationError> {
        let fail = |violation, offending| ValidationError {
            stream: Some(trace.stream()),
            violation,
            offending,
        };

        let mut state = ValidatorState::AwaitingStart;
        for context in trace.contexts() {
            let next = if self.strict_start {
                state.step_strict(context.notification())
            } else {
                state.step(context.notification())
            };
            state = next.map_err(|violation| fail(violation, Some(Offending::from(context))))?;
        }

        let last = trace.contexts().last().map(Offending::from);
        state.finish().map_err(|violation| fail(violation, last))
    }
}

/// `Validator::new().validate(snapshot)`.
pub fn validate(snapshot: &Snapshot) -> Result<(), ValidationReport> {
    Validator::new().validate(snapshot)
}
