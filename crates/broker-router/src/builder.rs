//! Call builder - mutable accumulator of routing directives
//!
//! Setters take `&mut self` so one builder can outlive several calls; each
//! [`CallBuilder::build`] copies the current directives into a fresh
//! [`InvocationContext`]. Invalid tuning values are ignored and the previous
//! value is kept.

use std::sync::Arc;
use std::time::Duration;

use broker_core::{BrokerConfig, MethodSignature, Scope, UniqueImplementationId, DEFAULT_VERSION};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::context::InvocationContext;
use crate::filter::{self, SelectionFilter};
use crate::types::{Accumulator, CastMode, CommunicationType, FilterExtensions, Format, Protocol, TimeUnit};

/// Fluent accumulator of routing directives
///
/// Not meant for concurrent configuration; share the built context instead.
#[derive(Clone)]
pub struct CallBuilder {
    contract_id: String,
    version: String,
    method: Option<MethodSignature>,
    cast: CastMode,
    retry: u32,
    timeout: Duration,
    communication_type: CommunicationType,
    protocol: Option<Protocol>,
    format: Option<Format>,
    filter: Option<Arc<dyn SelectionFilter>>,
    fixed_ids: Vec<UniqueImplementationId>,
    environment: Option<String>,
    extensions: FilterExtensions,
    with_degradation: bool,
    scope: Scope,
}

impl CallBuilder {
    /// Create a builder for `contract_id` with default directives
    pub fn new(contract_id: impl Into<String>) -> Self {
        Self::with_config(contract_id, &BrokerConfig::default())
    }

    /// Create a builder seeded from `config`
    pub fn with_config(contract_id: impl Into<String>, config: &BrokerConfig) -> Self {
        let timeout = if config.timeout_ms > 0 {
            config.timeout()
        } else {
            BrokerConfig::default().timeout()
        };

        Self {
            contract_id: contract_id.into(),
            version: DEFAULT_VERSION.to_string(),
            method: None,
            cast: CastMode::Unicast,
            retry: config.retry,
            timeout,
            communication_type: CommunicationType::default(),
            protocol: None,
            format: None,
            filter: None,
            fixed_ids: Vec::new(),
            environment: config.environment.clone(),
            extensions: FilterExtensions::new(),
            with_degradation: config.degradation,
            scope: config.scope,
        }
    }

    pub fn contract_id(&mut self, contract_id: impl Into<String>) -> &mut Self {
        self.contract_id = contract_id.into();
        self
    }

    /// Target contract version; blank versions are ignored
    pub fn version(&mut self, version: impl Into<String>) -> &mut Self {
        let version = version.into();
        if !version.trim().is_empty() {
            self.version = version;
        }
        self
    }

    /// Overload to bind on configurable contracts
    pub fn method(&mut self, method: MethodSignature) -> &mut Self {
        self.method = Some(method);
        self
    }

    /// Dispatch to a single implementation with failover
    pub fn unicast(&mut self) -> &mut Self {
        self.cast = CastMode::Unicast;
        self
    }

    /// Dispatch to every candidate and fold the results
    pub fn multicast(&mut self, accumulator: Accumulator) -> &mut Self {
        self.cast = CastMode::Multicast(accumulator);
        self
    }

    /// Extra attempts per candidate; negative values are ignored
    pub fn retry(&mut self, max_count: i64) -> &mut Self {
        match u32::try_from(max_count) {
            Ok(count) => self.retry = count,
            Err(_) => debug!(max_count, "Ignoring invalid retry count"),
        }
        self
    }

    /// Per-attempt timeout; a zero duration is ignored
    pub fn timeout(&mut self, timeout: Duration) -> &mut Self {
        if timeout.is_zero() {
            debug!("Ignoring zero timeout");
        } else {
            self.timeout = timeout;
        }
        self
    }

    /// Per-attempt timeout in `unit`; non-positive amounts are ignored
    pub fn timeout_in(&mut self, amount: i64, unit: TimeUnit) -> &mut Self {
        match unit.to_duration(amount) {
            Some(timeout) => self.timeout = timeout,
            None => debug!(amount, ?unit, "Ignoring invalid timeout"),
        }
        self
    }

    pub fn communication_type(&mut self, communication_type: CommunicationType) -> &mut Self {
        self.communication_type = communication_type;
        self
    }

    pub fn protocol(&mut self, protocol: Protocol) -> &mut Self {
        self.protocol = Some(protocol);
        self
    }

    pub fn format(&mut self, format: Format) -> &mut Self {
        self.format = Some(format);
        self
    }

    /// Restrict candidates to an environment tag; blank tags are ignored
    pub fn environment(&mut self, environment: impl Into<String>) -> &mut Self {
        let environment = environment.into();
        if !environment.trim().is_empty() {
            self.environment = Some(environment);
        }
        self
    }

    /// Add a selection filter; it is combined with earlier ones by conjunction
    pub fn filter(&mut self, selection: Arc<dyn SelectionFilter>) -> &mut Self {
        self.filter = Some(filter::combine(self.filter.take(), selection));
        self
    }

    /// Pin the call to specific implementations, appended after earlier pins
    pub fn filter_with(&mut self, ids: impl IntoIterator<Item = UniqueImplementationId>) -> &mut Self {
        self.fixed_ids.extend(ids);
        self
    }

    /// Replace the extension bag handed to selection filters
    pub fn filter_extensions(&mut self, extensions: FilterExtensions) -> &mut Self {
        self.extensions = extensions;
        self
    }

    /// Set a single extension entry
    pub fn filter_extension(&mut self, key: impl Into<String>, value: Value) -> &mut Self {
        self.extensions.insert(key.into(), value);
        self
    }

    /// Fail instead of falling back when no candidate remains
    pub fn ignore_degradation(&mut self) -> &mut Self {
        self.with_degradation = false;
        self
    }

    pub fn with_degradation(&mut self, enabled: bool) -> &mut Self {
        self.with_degradation = enabled;
        self
    }

    pub fn scope(&mut self, scope: Scope) -> &mut Self {
        self.scope = scope;
        self
    }

    /// Freeze the current directives into a new context
    pub fn build(&self) -> InvocationContext {
        InvocationContext {
            invocation_id: Uuid::new_v4(),
            contract_id: self.contract_id.clone(),
            version: self.version.clone(),
            method: self.method.clone(),
            cast: self.cast.clone(),
            retry: self.retry,
            timeout: self.timeout,
            communication_type: self.communication_type,
            protocol: self.protocol,
            format: self.format,
            filter: self.filter.clone(),
            fixed_ids: self.fixed_ids.clone(),
            environment: self.environment.clone(),
            extensions: self.extensions.clone(),
            with_degradation: self.with_degradation,
            scope: self.scope,
        }
    }
}

impl std::fmt::Debug for CallBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallBuilder")
            .field("contract_id", &self.contract_id)
            .field("version", &self.version)
            .field("multicast", &self.cast.is_multicast())
            .field("retry", &self.retry)
            .field("timeout", &self.timeout)
            .field("filter", &self.filter.as_ref().map(|f| f.name()))
            .field("fixed_ids", &self.fixed_ids.len())
            .field("environment", &self.environment)
            .field("with_degradation", &self.with_degradation)
            .field("scope", &self.scope)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{filter_fn, Verdict};
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let ctx = CallBuilder::new("greet").build();

        assert_eq!(ctx.contract_id(), "greet");
        assert_eq!(ctx.version(), DEFAULT_VERSION);
        assert!(!ctx.is_multicast());
        assert!(ctx.accumulator().is_none());
        assert_eq!(ctx.retry(), 0);
        assert_eq!(ctx.timeout(), Duration::from_secs(3));
        assert!(ctx.with_degradation());
        assert_eq!(ctx.scope(), Scope::Global);
        assert!(ctx.filter().is_none());
        assert!(ctx.fixed_ids().is_empty());
    }

    #[test]
    fn test_invalid_tuning_is_ignored() {
        let mut builder = CallBuilder::new("greet");
        builder
            .retry(2)
            .timeout(Duration::from_millis(500))
            .retry(-1)
            .timeout(Duration::ZERO)
            .timeout_in(0, TimeUnit::Seconds)
            .timeout_in(-3, TimeUnit::Milliseconds)
            .environment("  ")
            .version("");

        let ctx = builder.build();
        assert_eq!(ctx.retry(), 2);
        assert_eq!(ctx.timeout(), Duration::from_millis(500));
        assert_eq!(ctx.environment(), None);
        assert_eq!(ctx.version(), DEFAULT_VERSION);
    }

    #[test]
    fn test_zero_retry_is_accepted() {
        let mut builder = CallBuilder::new("greet");
        builder.retry(3).retry(0);
        assert_eq!(builder.build().retry(), 0);
    }

    #[test]
    fn test_cast_mode_last_write_wins() {
        let mut builder = CallBuilder::new("greet");
        builder.multicast(Accumulator::first()).unicast();
        assert!(!builder.build().is_multicast());

        builder.multicast(Accumulator::first());
        assert!(builder.build().is_multicast());
    }

    #[test]
    fn test_filters_accumulate_by_conjunction() {
        let mut builder = CallBuilder::new("greet");
        builder
            .filter(filter_fn("not-a", |c, _| Verdict::keep_if(c.id != "a")))
            .filter(filter_fn("not-b", |c, _| Verdict::keep_if(c.id != "b")));

        let ctx = builder.build();
        let filter = ctx.filter().unwrap();
        let ext = FilterExtensions::new();
        let a = broker_core::Implementation::remote("greet", "a");
        let b = broker_core::Implementation::remote("greet", "b");
        let c = broker_core::Implementation::remote("greet", "c");
        assert!(!filter.evaluate(&a, &ext).keep);
        assert!(!filter.evaluate(&b, &ext).keep);
        assert!(filter.evaluate(&c, &ext).keep);
    }

    #[test]
    fn test_fixed_ids_accumulate_by_append() {
        let mut builder = CallBuilder::new("greet");
        builder
            .filter_with(vec![UniqueImplementationId::new("greet", "b")])
            .filter_with(vec![
                UniqueImplementationId::new("greet", "a"),
                UniqueImplementationId::new("greet", "b"),
            ]);

        let ids: Vec<_> = builder
            .build()
            .fixed_ids()
            .iter()
            .map(|id| id.implementation_id.clone())
            .collect();
        assert_eq!(ids, vec!["b", "a", "b"]);
    }

    #[test]
    fn test_build_is_idempotent() {
        let mut builder = CallBuilder::new("greet");
        builder
            .retry(1)
            .timeout_in(2, TimeUnit::Seconds)
            .multicast(Accumulator::first())
            .filter(filter_fn("any", |_, _| Verdict::keep()))
            .filter_extension("routingKey", json!("k"))
            .protocol(Protocol::Grpc)
            .format(Format::Json);

        let first = builder.build();
        let second = builder.build();

        assert_ne!(first.invocation_id(), second.invocation_id());
        assert!(first.routing_eq(&second));
    }

    #[test]
    fn test_build_does_not_see_later_mutation() {
        let mut builder = CallBuilder::new("greet");
        let before = builder.build();
        builder.retry(4).ignore_degradation().scope(Scope::Local);
        let after = builder.build();

        assert_eq!(before.retry(), 0);
        assert!(before.with_degradation());
        assert_eq!(after.retry(), 4);
        assert!(!after.with_degradation());
        assert_eq!(after.scope(), Scope::Local);
        assert!(!before.routing_eq(&after));
    }

    #[test]
    fn test_config_seeds_defaults() {
        let config = BrokerConfig {
            retry: 2,
            timeout_ms: 100,
            scope: Scope::Local,
            environment: Some("gray".to_string()),
            degradation: false,
        };
        let ctx = CallBuilder::with_config("greet", &config).build();

        assert_eq!(ctx.retry(), 2);
        assert_eq!(ctx.timeout(), Duration::from_millis(100));
        assert_eq!(ctx.scope(), Scope::Local);
        assert_eq!(ctx.environment(), Some("gray"));
        assert!(!ctx.with_degradation());
    }
}
