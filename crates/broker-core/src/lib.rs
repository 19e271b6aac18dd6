//! Broker Core - Shared model for the call router
//!
//! This crate provides the service contract model and configuration
//! used by the routing crate and by the wiring layer that registers
//! implementations.

pub mod config;
pub mod contract;
pub mod types;

pub use config::BrokerConfig;
pub use contract::{Implementation, MethodSignature, ServiceContract, UniqueImplementationId};
pub use types::{ContractId, ImplementationId, Locality, ParseScopeError, Scope, DEFAULT_VERSION};
