//! Service contracts and their implementations
//!
//! A [`ServiceContract`] names an abstract operation. Concrete
//! [`Implementation`]s register against it over the life of the process;
//! readers always receive cloned snapshots so registration can race with
//! in-flight calls.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::types::{ContractId, ImplementationId, Locality, DEFAULT_VERSION};

/// Signature of the method a call is bound to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodSignature {
    /// Method name
    pub name: String,
    /// Parameter type names, in declaration order
    pub parameter_types: Vec<String>,
    /// Return type name
    pub return_type: String,
}

impl MethodSignature {
    pub fn new(name: impl Into<String>, parameter_types: Vec<String>, return_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameter_types,
            return_type: return_type.into(),
        }
    }

    pub fn arity(&self) -> usize {
        self.parameter_types.len()
    }
}

/// A concrete, executable realization of a service contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Implementation {
    /// Unique within the owning contract
    pub id: ImplementationId,

    /// Owning contract
    pub contract_id: ContractId,

    /// Contract version this implementation serves
    pub version: String,

    /// In-process or remote
    pub locality: Locality,

    /// Deployment environment tag (e.g. "prod", "gray")
    pub environment: Option<String>,

    /// Fallback used when normal resolution yields nothing
    pub is_degradation_default: bool,

    /// Free-form labels matched by selection filters
    pub tags: BTreeMap<String, String>,

    /// Relative preference for weight-ordered selection (higher first)
    pub weight: u32,
}

impl Implementation {
    /// Create a local implementation of `contract_id` at the default version
    pub fn local(contract_id: impl Into<ContractId>, id: impl Into<ImplementationId>) -> Self {
        Self::new(contract_id, id, Locality::Local)
    }

    /// Create a remote implementation of `contract_id` at the default version
    pub fn remote(contract_id: impl Into<ContractId>, id: impl Into<ImplementationId>) -> Self {
        Self::new(contract_id, id, Locality::Remote)
    }

    pub fn new(
        contract_id: impl Into<ContractId>,
        id: impl Into<ImplementationId>,
        locality: Locality,
    ) -> Self {
        Self {
            id: id.into(),
            contract_id: contract_id.into(),
            version: DEFAULT_VERSION.to_string(),
            locality,
            environment: None,
            is_degradation_default: false,
            tags: BTreeMap::new(),
            weight: 100,
        }
    }

    /// Set the contract version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Set the environment tag
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    /// Mark as the contract's degradation default
    pub fn as_degradation_default(mut self) -> Self {
        self.is_degradation_default = true;
        self
    }

    /// Add a label
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Set selection weight
    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    pub fn is_local(&self) -> bool {
        self.locality == Locality::Local
    }

    /// Compound key identifying this implementation
    pub fn unique_id(&self) -> UniqueImplementationId {
        UniqueImplementationId::new(self.contract_id.clone(), self.id.clone())
            .with_version(self.version.clone())
    }
}

/// Compound key pinning a call to a specific implementation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UniqueImplementationId {
    pub contract_id: ContractId,
    pub implementation_id: ImplementationId,
    /// `None` matches any version
    pub version: Option<String>,
}

impl UniqueImplementationId {
    pub fn new(contract_id: impl Into<ContractId>, implementation_id: impl Into<ImplementationId>) -> Self {
        Self {
            contract_id: contract_id.into(),
            implementation_id: implementation_id.into(),
            version: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Whether `implementation` is the one this key names
    pub fn matches(&self, implementation: &Implementation) -> bool {
        self.contract_id == implementation.contract_id
            && self.implementation_id == implementation.id
            && self
                .version
                .as_ref()
                .map_or(true, |v| *v == implementation.version)
    }
}

impl std::fmt::Display for UniqueImplementationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.version {
            Some(v) => write!(f, "{}/{}@{}", self.contract_id, self.implementation_id, v),
            None => write!(f, "{}/{}", self.contract_id, self.implementation_id),
        }
    }
}

#[derive(Debug, Default)]
struct ContractState {
    implementations: Vec<Implementation>,
    degradation_default: Option<Implementation>,
    bound_method: Option<MethodSignature>,
}

/// An abstract, versioned operation and the implementations registered for it
#[derive(Debug)]
pub struct ServiceContract {
    id: ContractId,
    version: String,
    method: Option<MethodSignature>,
    configurable: bool,
    state: RwLock<ContractState>,
}

impl ServiceContract {
    /// Create an empty contract at `version`
    pub fn new(id: impl Into<ContractId>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
            method: None,
            configurable: false,
            state: RwLock::new(ContractState::default()),
        }
    }

    /// Declare the contract's method signature
    pub fn with_method(mut self, method: MethodSignature) -> Self {
        self.method = Some(method);
        self
    }

    /// Allow callers to bind a specific overload per call
    pub fn configurable(mut self) -> Self {
        self.configurable = true;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn method(&self) -> Option<&MethodSignature> {
        self.method.as_ref()
    }

    pub fn is_configurable(&self) -> bool {
        self.configurable
    }

    /// Register an implementation
    ///
    /// An implementation with the same id replaces the earlier one in place.
    /// Implementations flagged as degradation defaults become the fallback and
    /// are not enumerated as ordinary candidates.
    pub fn register(&self, implementation: Implementation) {
        if implementation.is_degradation_default {
            self.set_degradation_default(implementation);
            return;
        }

        info!(
            contract_id = %self.id,
            implementation_id = %implementation.id,
            locality = %implementation.locality,
            "Registering implementation"
        );

        let mut state = self.state.write();
        match state
            .implementations
            .iter_mut()
            .find(|existing| existing.id == implementation.id)
        {
            Some(existing) => *existing = implementation,
            None => state.implementations.push(implementation),
        }
    }

    /// Install the fallback implementation
    pub fn set_degradation_default(&self, mut implementation: Implementation) {
        implementation.is_degradation_default = true;
        info!(
            contract_id = %self.id,
            implementation_id = %implementation.id,
            "Registering degradation default"
        );
        self.state.write().degradation_default = Some(implementation);
    }

    /// Remove an implementation (ordinary or fallback); returns whether one was removed
    pub fn unregister(&self, implementation_id: &str) -> bool {
        let mut state = self.state.write();
        let before = state.implementations.len();
        state.implementations.retain(|i| i.id != implementation_id);
        let mut removed = state.implementations.len() != before;

        if state
            .degradation_default
            .as_ref()
            .is_some_and(|d| d.id == implementation_id)
        {
            state.degradation_default = None;
            removed = true;
        }

        if removed {
            info!(contract_id = %self.id, implementation_id = %implementation_id, "Unregistering implementation");
        }
        removed
    }

    /// Snapshot of the ordinary implementations in registration order
    pub fn implementations(&self) -> Vec<Implementation> {
        self.state.read().implementations.clone()
    }

    pub fn degradation_default(&self) -> Option<Implementation> {
        self.state.read().degradation_default.clone()
    }

    /// Bind the overload a call targets; only configurable contracts accept it
    pub fn bind_method(&self, method: MethodSignature) -> bool {
        if !self.configurable {
            return false;
        }
        debug!(contract_id = %self.id, method = %method.name, arity = method.arity(), "Binding method");
        self.state.write().bound_method = Some(method);
        true
    }

    /// Most recently bound overload, falling back to the declared signature
    pub fn bound_method(&self) -> Option<MethodSignature> {
        self.state
            .read()
            .bound_method
            .clone()
            .or_else(|| self.method.clone())
    }

    pub fn implementation_count(&self) -> usize {
        self.state.read().implementations.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_preserves_order_and_replaces_in_place() {
        let contract = ServiceContract::new("greet", DEFAULT_VERSION);
        contract.register(Implementation::local("greet", "a"));
        contract.register(Implementation::remote("greet", "b"));
        contract.register(Implementation::local("greet", "a").with_weight(7));

        let ids: Vec<_> = contract.implementations().into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(contract.implementations()[0].weight, 7);
    }

    #[test]
    fn test_degradation_default_is_not_a_candidate() {
        let contract = ServiceContract::new("greet", DEFAULT_VERSION);
        contract.register(Implementation::local("greet", "fallback").as_degradation_default());

        assert_eq!(contract.implementation_count(), 0);
        let fallback = contract.degradation_default().unwrap();
        assert_eq!(fallback.id, "fallback");
        assert!(fallback.is_degradation_default);

        assert!(contract.unregister("fallback"));
        assert!(contract.degradation_default().is_none());
        assert!(!contract.unregister("fallback"));
    }

    #[test]
    fn test_bind_method_only_on_configurable_contracts() {
        let sig = MethodSignature::new("sum", vec!["i64".into(), "i64".into()], "i64");

        let fixed = ServiceContract::new("sum", DEFAULT_VERSION);
        assert!(!fixed.bind_method(sig.clone()));
        assert!(fixed.bound_method().is_none());

        let overloaded = ServiceContract::new("sum", DEFAULT_VERSION).configurable();
        assert!(overloaded.bind_method(sig.clone()));
        assert_eq!(overloaded.bound_method(), Some(sig));
    }

    #[test]
    fn test_unique_id_matching() {
        let implementation = Implementation::remote("greet", "a").with_version("2.0.0");

        assert!(UniqueImplementationId::new("greet", "a").matches(&implementation));
        assert!(UniqueImplementationId::new("greet", "a")
            .with_version("2.0.0")
            .matches(&implementation));
        assert!(!UniqueImplementationId::new("greet", "a")
            .with_version("1.0.0")
            .matches(&implementation));
        assert!(!UniqueImplementationId::new("other", "a").matches(&implementation));
        assert_eq!(implementation.unique_id().to_string(), "greet/a@2.0.0");
    }
}
