//! Invoker - a call builder bound to a router
//!
//! Every [`Invoker::invoke`] freezes a fresh context, so directives set
//! between calls apply to the next call only.

use std::sync::Arc;
use std::time::Duration;

use broker_core::{MethodSignature, Scope, ServiceContract, UniqueImplementationId};
use serde_json::Value;
use tracing::debug;

use crate::builder::CallBuilder;
use crate::context::InvocationContext;
use crate::error::BrokerError;
use crate::filter::SelectionFilter;
use crate::router::Router;
use crate::types::{Accumulator, CallState, CommunicationType, FilterExtensions, Format, Protocol, TimeUnit};

/// Configures and issues calls to one contract
#[derive(Debug)]
pub struct Invoker {
    router: Router,
    builder: CallBuilder,
}

impl Invoker {
    pub(crate) fn new(router: Router, contract_id: impl Into<String>) -> Self {
        let contract_id = contract_id.into();
        debug!(contract_id = %contract_id, state = %CallState::Configuring, "Call state");
        let builder = CallBuilder::with_config(contract_id, router.config());
        Self { router, builder }
    }

    /// Current directives, for inspection
    pub fn builder(&self) -> &CallBuilder {
        &self.builder
    }

    /// Freeze the current directives without dispatching
    pub fn context(&self) -> InvocationContext {
        self.builder.build()
    }

    /// Resolve and bind the target contract without dispatching
    pub fn contract(&self) -> Result<Arc<ServiceContract>, BrokerError> {
        self.router.resolve(&self.builder.build())
    }

    /// Freeze the directives and run the call
    pub async fn invoke(&self, args: &[Value]) -> Result<Value, BrokerError> {
        let context = self.builder.build();
        self.router.execute(&context, args).await
    }

    pub fn version(&mut self, version: impl Into<String>) -> &mut Self {
        self.builder.version(version);
        self
    }

    pub fn method(&mut self, method: MethodSignature) -> &mut Self {
        self.builder.method(method);
        self
    }

    pub fn unicast(&mut self) -> &mut Self {
        self.builder.unicast();
        self
    }

    pub fn multicast(&mut self, accumulator: Accumulator) -> &mut Self {
        self.builder.multicast(accumulator);
        self
    }

    pub fn retry(&mut self, max_count: i64) -> &mut Self {
        self.builder.retry(max_count);
        self
    }

    pub fn timeout(&mut self, timeout: Duration) -> &mut Self {
        self.builder.timeout(timeout);
        self
    }

    pub fn timeout_in(&mut self, amount: i64, unit: TimeUnit) -> &mut Self {
        self.builder.timeout_in(amount, unit);
        self
    }

    pub fn communication_type(&mut self, communication_type: CommunicationType) -> &mut Self {
        self.builder.communication_type(communication_type);
        self
    }

    pub fn protocol(&mut self, protocol: Protocol) -> &mut Self {
        self.builder.protocol(protocol);
        self
    }

    pub fn format(&mut self, format: Format) -> &mut Self {
        self.builder.format(format);
        self
    }

    pub fn environment(&mut self, environment: impl Into<String>) -> &mut Self {
        self.builder.environment(environment);
        self
    }

    pub fn filter(&mut self, selection: Arc<dyn SelectionFilter>) -> &mut Self {
        self.builder.filter(selection);
        self
    }

    pub fn filter_with(&mut self, ids: impl IntoIterator<Item = UniqueImplementationId>) -> &mut Self {
        self.builder.filter_with(ids);
        self
    }

    pub fn filter_extensions(&mut self, extensions: FilterExtensions) -> &mut Self {
        self.builder.filter_extensions(extensions);
        self
    }

    pub fn filter_extension(&mut self, key: impl Into<String>, value: Value) -> &mut Self {
        self.builder.filter_extension(key, value);
        self
    }

    pub fn ignore_degradation(&mut self) -> &mut Self {
        self.builder.ignore_degradation();
        self
    }

    pub fn with_degradation(&mut self, enabled: bool) -> &mut Self {
        self.builder.with_degradation(enabled);
        self
    }

    pub fn scope(&mut self, scope: Scope) -> &mut Self {
        self.builder.scope(scope);
        self
    }
}
