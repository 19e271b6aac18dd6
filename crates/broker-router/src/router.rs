//! Router - resolves, filters and dispatches one call
//!
//! # Call Lifecycle
//!
//! ```text
//! InvocationContext
//!        │
//!        ▼
//!   Resolve contract ──miss──► ContractNotFound
//!        │
//!        ▼
//!   Environment → fixed ids → selection filter
//!        │
//!   Empty? ──Yes──► degradation default ──none──► ImplementationNotFound
//!        │                  │
//!        No                 ▼
//!        │             single attempt
//!        ▼
//!   Unicast: candidates in order, retry + 1 attempts each
//!   Multicast: all candidates, fold in candidate order
//! ```

use std::sync::Arc;

use broker_core::{BrokerConfig, Implementation, ServiceContract, UniqueImplementationId};
use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::context::InvocationContext;
use crate::dispatcher::Dispatcher;
use crate::error::{BrokerError, DispatchError};
use crate::filter;
use crate::invoker::Invoker;
use crate::registry::Registry;
use crate::types::{Accumulator, CallState, CastMode};

/// Routes calls from frozen contexts to implementations
#[derive(Clone)]
pub struct Router {
    registry: Arc<dyn Registry>,
    dispatcher: Arc<dyn Dispatcher>,
    config: BrokerConfig,
}

impl Router {
    /// Create with default configuration
    pub fn new(registry: Arc<dyn Registry>, dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self::with_config(registry, dispatcher, BrokerConfig::default())
    }

    /// Create with explicit call defaults
    pub fn with_config(
        registry: Arc<dyn Registry>,
        dispatcher: Arc<dyn Dispatcher>,
        config: BrokerConfig,
    ) -> Self {
        Self { registry, dispatcher, config }
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// Start configuring a call to `contract_id`
    pub fn invoker(&self, contract_id: impl Into<String>) -> Invoker {
        Invoker::new(self.clone(), contract_id)
    }

    /// Run one call described by `context`
    pub async fn execute(&self, context: &InvocationContext, args: &[Value]) -> Result<Value, BrokerError> {
        let span = info_span!(
            "invoke",
            invocation_id = %context.invocation_id(),
            contract_id = %context.contract_id(),
        );

        async {
            let result = self.route(context, args).await;
            match &result {
                Ok(_) => trace_state(context, CallState::Succeeded),
                Err(err) => {
                    trace_state(context, CallState::Failed);
                    debug!(code = err.code(), error = %err, "Call failed");
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Freeze-time checks, registry lookup and method binding
    pub fn resolve(&self, context: &InvocationContext) -> Result<Arc<ServiceContract>, BrokerError> {
        trace_state(context, CallState::Frozen);
        if context.contract_id().trim().is_empty() {
            return Err(BrokerError::ContractIdMissing);
        }

        trace_state(context, CallState::Resolving);
        let contract = self
            .registry
            .resolve(context.contract_id(), context.version(), context.scope())
            .ok_or_else(|| BrokerError::ContractNotFound {
                contract_id: context.contract_id().to_string(),
                version: context.version().to_string(),
                scope: context.scope(),
            })?;

        if let Some(method) = context.method() {
            if contract.is_configurable() {
                contract.bind_method(method.clone());
            }
        }

        Ok(contract)
    }

    /// Final ordered candidate sequence for `contract` under `context`
    pub fn candidates(&self, context: &InvocationContext, contract: &ServiceContract) -> Vec<Implementation> {
        trace_state(context, CallState::Filtering);
        let mut candidates = self.registry.all_implementations(contract);
        let enumerated = candidates.len();

        if let Some(environment) = context.environment() {
            candidates.retain(|c| c.environment.as_deref() == Some(environment));
        }

        if !context.fixed_ids().is_empty() {
            candidates = pin(candidates, context.fixed_ids());
        }

        if let Some(selection) = context.filter() {
            candidates = filter::apply(selection.as_ref(), candidates, context.extensions());
        }

        debug!(
            enumerated,
            selected = candidates.len(),
            order = ?candidates.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(),
            "Filtered candidates"
        );
        candidates
    }

    async fn route(&self, context: &InvocationContext, args: &[Value]) -> Result<Value, BrokerError> {
        let contract = self.resolve(context)?;
        let candidates = self.candidates(context, &contract);

        let Some((first, rest)) = candidates.split_first() else {
            return self.degrade(context, &contract, args).await;
        };

        let outcome = match context.cast() {
            CastMode::Unicast => {
                trace_state(context, CallState::DispatchingUnicast);
                self.unicast(context, first, rest, args).await
            }
            CastMode::Multicast(accumulator) => {
                trace_state(context, CallState::DispatchingMulticast);
                self.multicast(context, accumulator, first, rest, args).await
            }
        };

        outcome.map_err(|cause| invocation_error(context, cause))
    }

    /// Fall back to the degradation default with a single attempt
    async fn degrade(
        &self,
        context: &InvocationContext,
        contract: &ServiceContract,
        args: &[Value],
    ) -> Result<Value, BrokerError> {
        let not_found = || BrokerError::ImplementationNotFound {
            contract_id: context.contract_id().to_string(),
        };

        if !context.with_degradation() {
            debug!("No candidates and degradation disabled");
            return Err(not_found());
        }

        let fallback = self.registry.degradation_default(contract).ok_or_else(not_found)?;

        trace_state(context, CallState::Degraded);
        info!(implementation_id = %fallback.id, "No candidates, dispatching to degradation default");
        self.attempt(context, &fallback, args)
            .await
            .map_err(|cause| invocation_error(context, cause))
    }

    /// Try candidates strictly in order, exhausting retries before failing over
    async fn unicast(
        &self,
        context: &InvocationContext,
        first: &Implementation,
        rest: &[Implementation],
        args: &[Value],
    ) -> Result<Value, DispatchError> {
        let mut last_error = match self.dispatch_with_retry(context, first, args).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        for candidate in rest {
            warn!(implementation_id = %candidate.id, error = %last_error, "Failing over to next candidate");
            match self.dispatch_with_retry(context, candidate, args).await {
                Ok(value) => return Ok(value),
                Err(err) => last_error = err,
            }
        }

        Err(last_error)
    }

    /// Dispatch to every candidate concurrently and fold in candidate order
    async fn multicast(
        &self,
        context: &InvocationContext,
        accumulator: &Accumulator,
        first: &Implementation,
        rest: &[Implementation],
        args: &[Value],
    ) -> Result<Value, DispatchError> {
        let (first_result, rest_results) = futures::join!(
            self.dispatch_with_retry(context, first, args),
            join_all(rest.iter().map(|c| self.dispatch_with_retry(context, c, args))),
        );

        // join_all yields results in input order, not completion order
        let mut folded = first_result;
        for (candidate, result) in rest.iter().zip(rest_results) {
            folded = match (folded, result) {
                (Ok(acc), Ok(value)) => Ok(accumulator.apply(acc, value)),
                (Ok(acc), Err(err)) => {
                    warn!(implementation_id = %candidate.id, error = %err, "Excluding failed candidate from fold");
                    Ok(acc)
                }
                (Err(_), result) => result,
            };
        }
        folded
    }

    /// Up to `retry + 1` attempts against one candidate
    async fn dispatch_with_retry(
        &self,
        context: &InvocationContext,
        candidate: &Implementation,
        args: &[Value],
    ) -> Result<Value, DispatchError> {
        let attempts = context.retry().saturating_add(1);
        let mut attempt = 1;
        loop {
            match self.attempt(context, candidate, args).await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < attempts => {
                    debug!(
                        implementation_id = %candidate.id,
                        attempt,
                        attempts,
                        error = %err,
                        "Attempt failed, retrying"
                    );
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// One attempt bounded by the context timeout
    async fn attempt(
        &self,
        context: &InvocationContext,
        candidate: &Implementation,
        args: &[Value],
    ) -> Result<Value, DispatchError> {
        debug!(implementation_id = %candidate.id, locality = %candidate.locality, "Dispatching");
        match tokio::time::timeout(context.timeout(), self.dispatcher.dispatch(candidate, context, args)).await {
            Ok(result) => result,
            Err(_) => Err(DispatchError::Timeout(context.timeout())),
        }
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router").field("config", &self.config).finish_non_exhaustive()
    }
}

/// Keep only pinned candidates, in pin order, each at most once
fn pin(candidates: Vec<Implementation>, fixed_ids: &[UniqueImplementationId]) -> Vec<Implementation> {
    let mut pinned: Vec<Implementation> = Vec::with_capacity(fixed_ids.len());
    for id in fixed_ids {
        if let Some(candidate) = candidates.iter().find(|c| id.matches(c)) {
            if !pinned.iter().any(|p| p.id == candidate.id) {
                pinned.push(candidate.clone());
            }
        }
    }
    pinned
}

fn invocation_error(context: &InvocationContext, cause: DispatchError) -> BrokerError {
    BrokerError::Invocation {
        contract_id: context.contract_id().to_string(),
        cause,
    }
}

fn trace_state(context: &InvocationContext, state: CallState) {
    debug!(
        invocation_id = %context.invocation_id(),
        state = %state,
        terminal = state.is_terminal(),
        "Call state"
    );
}
