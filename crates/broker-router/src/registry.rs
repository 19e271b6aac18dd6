//! Candidate registry - tracks service contracts per scope
//!
//! Two independent partitions exist: the local scope (implementations known
//! inside this process or cluster) and the global scope (implementations
//! known through wider discovery). A lookup only ever consults the scope the
//! call selected.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use broker_core::{Implementation, Scope, ServiceContract};

/// Lookup surface the router resolves candidates through
pub trait Registry: Send + Sync {
    /// Find a contract in the given scope
    fn resolve(&self, contract_id: &str, version: &str, scope: Scope) -> Option<Arc<ServiceContract>>;

    /// Ordered snapshot of the contract's ordinary implementations
    fn all_implementations(&self, contract: &ServiceContract) -> Vec<Implementation> {
        contract.implementations()
    }

    /// The contract's fallback implementation, if any
    fn degradation_default(&self, contract: &ServiceContract) -> Option<Implementation> {
        contract.degradation_default()
    }
}

type ContractKey = (String, String);

/// Contracts known within one scope
#[derive(Debug, Default)]
pub struct ContractRepository {
    contracts: RwLock<HashMap<ContractKey, Arc<ServiceContract>>>,
}

impl ContractRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a contract by id and version
    pub fn get(&self, contract_id: &str, version: &str) -> Option<Arc<ServiceContract>> {
        let contracts = self.contracts.read();
        contracts
            .get(&(contract_id.to_string(), version.to_string()))
            .cloned()
    }

    /// Insert a pre-built contract, replacing any with the same id and version
    pub fn insert(&self, contract: ServiceContract) -> Arc<ServiceContract> {
        let contract = Arc::new(contract);
        info!(
            contract_id = %contract.id(),
            version = %contract.version(),
            "Registering contract"
        );
        let key = (contract.id().to_string(), contract.version().to_string());
        self.contracts.write().insert(key, contract.clone());
        contract
    }

    /// Get a contract, creating an empty one on first use
    pub fn get_or_create(&self, contract_id: &str, version: &str) -> Arc<ServiceContract> {
        if let Some(contract) = self.get(contract_id, version) {
            return contract;
        }

        let mut contracts = self.contracts.write();
        contracts
            .entry((contract_id.to_string(), version.to_string()))
            .or_insert_with(|| {
                debug!(contract_id = %contract_id, version = %version, "Creating contract on first registration");
                Arc::new(ServiceContract::new(contract_id, version))
            })
            .clone()
    }

    /// Register an implementation under its own contract id and version
    pub fn register(&self, implementation: Implementation) -> Arc<ServiceContract> {
        let contract = self.get_or_create(&implementation.contract_id, &implementation.version);
        contract.register(implementation);
        contract
    }

    /// Unregister an implementation; returns whether it was known
    pub fn unregister(&self, contract_id: &str, version: &str, implementation_id: &str) -> bool {
        self.get(contract_id, version)
            .map_or(false, |contract| contract.unregister(implementation_id))
    }

    /// Drop a whole contract
    pub fn remove_contract(&self, contract_id: &str, version: &str) -> Option<Arc<ServiceContract>> {
        info!(contract_id = %contract_id, version = %version, "Removing contract");
        self.contracts
            .write()
            .remove(&(contract_id.to_string(), version.to_string()))
    }

    /// Count of known contracts
    pub fn len(&self) -> usize {
        self.contracts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.read().is_empty()
    }
}

/// Registry holding a local and a global repository
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    local: ContractRepository,
    global: ContractRepository,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Repository backing `scope`
    pub fn scope(&self, scope: Scope) -> &ContractRepository {
        match scope {
            Scope::Local => &self.local,
            Scope::Global => &self.global,
        }
    }

    pub fn local(&self) -> &ContractRepository {
        &self.local
    }

    pub fn global(&self) -> &ContractRepository {
        &self.global
    }
}

impl Registry for InMemoryRegistry {
    fn resolve(&self, contract_id: &str, version: &str, scope: Scope) -> Option<Arc<ServiceContract>> {
        self.scope(scope).get(contract_id, version)
    }
}
