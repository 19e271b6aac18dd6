//! Invocation context - frozen routing directives for one call
//!
//! Produced by [`crate::CallBuilder::build`]; never mutated afterwards, so a
//! single context can be shared by every task of a multicast fan-out.

use std::sync::Arc;
use std::time::Duration;

use broker_core::{MethodSignature, Scope, UniqueImplementationId};
use uuid::Uuid;

use crate::filter::SelectionFilter;
use crate::types::{Accumulator, CastMode, CommunicationType, FilterExtensions, Format, Protocol};

/// Immutable snapshot of all routing directives for one call
#[derive(Clone)]
pub struct InvocationContext {
    pub(crate) invocation_id: Uuid,
    pub(crate) contract_id: String,
    pub(crate) version: String,
    pub(crate) method: Option<MethodSignature>,
    pub(crate) cast: CastMode,
    pub(crate) retry: u32,
    pub(crate) timeout: Duration,
    pub(crate) communication_type: CommunicationType,
    pub(crate) protocol: Option<Protocol>,
    pub(crate) format: Option<Format>,
    pub(crate) filter: Option<Arc<dyn SelectionFilter>>,
    pub(crate) fixed_ids: Vec<UniqueImplementationId>,
    pub(crate) environment: Option<String>,
    pub(crate) extensions: FilterExtensions,
    pub(crate) with_degradation: bool,
    pub(crate) scope: Scope,
}

impl InvocationContext {
    /// Per-call identifier used in log correlation only
    pub fn invocation_id(&self) -> Uuid {
        self.invocation_id
    }

    pub fn contract_id(&self) -> &str {
        &self.contract_id
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn method(&self) -> Option<&MethodSignature> {
        self.method.as_ref()
    }

    pub fn cast(&self) -> &CastMode {
        &self.cast
    }

    pub fn is_multicast(&self) -> bool {
        self.cast.is_multicast()
    }

    /// Reduction used for multicast; `None` for unicast calls
    pub fn accumulator(&self) -> Option<&Accumulator> {
        match &self.cast {
            CastMode::Multicast(acc) => Some(acc),
            CastMode::Unicast => None,
        }
    }

    /// Extra attempts per candidate after the first
    pub fn retry(&self) -> u32 {
        self.retry
    }

    /// Upper bound for each single attempt
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn communication_type(&self) -> CommunicationType {
        self.communication_type
    }

    pub fn protocol(&self) -> Option<Protocol> {
        self.protocol
    }

    pub fn format(&self) -> Option<Format> {
        self.format
    }

    pub fn filter(&self) -> Option<&Arc<dyn SelectionFilter>> {
        self.filter.as_ref()
    }

    pub fn fixed_ids(&self) -> &[UniqueImplementationId] {
        &self.fixed_ids
    }

    pub fn environment(&self) -> Option<&str> {
        self.environment.as_deref()
    }

    pub fn extensions(&self) -> &FilterExtensions {
        &self.extensions
    }

    pub fn with_degradation(&self) -> bool {
        self.with_degradation
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Whether two contexts route identically
    ///
    /// Ignores the invocation id; filters and accumulators compare by identity.
    pub fn routing_eq(&self, other: &InvocationContext) -> bool {
        let same_filter = match (&self.filter, &other.filter) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        };

        same_filter
            && self.cast.same_as(&other.cast)
            && self.contract_id == other.contract_id
            && self.version == other.version
            && self.method == other.method
            && self.retry == other.retry
            && self.timeout == other.timeout
            && self.communication_type == other.communication_type
            && self.protocol == other.protocol
            && self.format == other.format
            && self.fixed_ids == other.fixed_ids
            && self.environment == other.environment
            && self.extensions == other.extensions
            && self.with_degradation == other.with_degradation
            && self.scope == other.scope
    }
}

impl std::fmt::Debug for InvocationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvocationContext")
            .field("invocation_id", &self.invocation_id)
            .field("contract_id", &self.contract_id)
            .field("version", &self.version)
            .field("method", &self.method)
            .field("multicast", &self.is_multicast())
            .field("retry", &self.retry)
            .field("timeout", &self.timeout)
            .field("communication_type", &self.communication_type)
            .field("protocol", &self.protocol)
            .field("format", &self.format)
            .field("filter", &self.filter.as_ref().map(|f| f.name()))
            .field("fixed_ids", &self.fixed_ids)
            .field("environment", &self.environment)
            .field("extensions", &self.extensions)
            .field("with_degradation", &self.with_degradation)
            .field("scope", &self.scope)
            .finish()
    }
}
