//! Common types for the router module
//!
//! Transport directives, cast modes and the call state machine.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Opaque key/value bag handed to selection filters
pub type FilterExtensions = BTreeMap<String, Value>;

/// Binary reduction over multicast results
///
/// Need not be commutative: the router always folds in candidate order.
#[derive(Clone)]
pub struct Accumulator(Arc<dyn Fn(Value, Value) -> Value + Send + Sync>);

impl Accumulator {
    pub fn new(f: impl Fn(Value, Value) -> Value + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Keeps the left operand, so the first successful result wins
    pub fn first() -> Self {
        Self::new(|first, _| first)
    }

    pub fn apply(&self, left: Value, right: Value) -> Value {
        (self.0)(left, right)
    }

    /// Identity comparison
    pub fn same_as(&self, other: &Accumulator) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl std::fmt::Debug for Accumulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Accumulator(..)")
    }
}

/// How many implementations a call reaches
#[derive(Debug, Clone)]
pub enum CastMode {
    /// One implementation, failing over along the candidate list
    Unicast,
    /// Every candidate, results folded through the accumulator
    Multicast(Accumulator),
}

impl CastMode {
    pub fn is_multicast(&self) -> bool {
        matches!(self, CastMode::Multicast(_))
    }

    pub(crate) fn same_as(&self, other: &CastMode) -> bool {
        match (self, other) {
            (CastMode::Unicast, CastMode::Unicast) => true,
            (CastMode::Multicast(a), CastMode::Multicast(b)) => a.same_as(b),
            _ => false,
        }
    }
}

impl Default for CastMode {
    fn default() -> Self {
        Self::Unicast
    }
}

/// Request/response style requested from the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommunicationType {
    Sync,
    Async,
}

impl Default for CommunicationType {
    fn default() -> Self {
        Self::Sync
    }
}

/// Transport protocol requested for remote implementations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
    Grpc,
    Socket,
}

/// Payload serialization format requested for remote implementations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Json,
    Protobuf,
    Cbor,
}

/// Unit for [`crate::CallBuilder::timeout_in`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Nanoseconds,
    Microseconds,
    Milliseconds,
    Seconds,
    Minutes,
}

impl TimeUnit {
    /// Convert a positive amount; `None` for non-positive values
    pub fn to_duration(self, amount: i64) -> Option<Duration> {
        let amount = u64::try_from(amount).ok().filter(|a| *a > 0)?;
        Some(match self {
            TimeUnit::Nanoseconds => Duration::from_nanos(amount),
            TimeUnit::Microseconds => Duration::from_micros(amount),
            TimeUnit::Milliseconds => Duration::from_millis(amount),
            TimeUnit::Seconds => Duration::from_secs(amount),
            TimeUnit::Minutes => Duration::from_secs(amount.saturating_mul(60)),
        })
    }
}

/// Progress of one call through the router
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Configuring,
    Frozen,
    Resolving,
    Filtering,
    DispatchingUnicast,
    DispatchingMulticast,
    Degraded,
    Succeeded,
    Failed,
}

impl CallState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CallState::Succeeded | CallState::Failed)
    }
}

impl std::fmt::Display for CallState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CallState::Configuring => "configuring",
            CallState::Frozen => "frozen",
            CallState::Resolving => "resolving",
            CallState::Filtering => "filtering",
            CallState::DispatchingUnicast => "dispatching-unicast",
            CallState::DispatchingMulticast => "dispatching-multicast",
            CallState::Degraded => "degraded",
            CallState::Succeeded => "succeeded",
            CallState::Failed => "failed",
        };
        f.write_str(name)
    }
}
