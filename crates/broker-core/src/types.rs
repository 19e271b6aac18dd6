//! Common types shared by the contract model and the router
//!
//! Centralizes identifiers and small enums so both crates agree on them.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Service contract identifier (stable across versions)
pub type ContractId = String;

/// Implementation identifier (unique within a contract)
pub type ImplementationId = String;

/// Version assumed when a caller does not name one
pub const DEFAULT_VERSION: &str = "1.0.0";

/// Which registry partition a call resolves its contract from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Implementations known within the current process or cluster
    Local,
    /// Implementations known through wider discovery
    Global,
}

impl Default for Scope {
    fn default() -> Self {
        Self::Global
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::Local => write!(f, "local"),
            Scope::Global => write!(f, "global"),
        }
    }
}

/// Error returned when a scope name is not recognised
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown scope: {0}")]
pub struct ParseScopeError(pub String);

impl FromStr for Scope {
    type Err = ParseScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "micro" => Ok(Scope::Local),
            "global" | "macro" => Ok(Scope::Global),
            other => Err(ParseScopeError(other.to_string())),
        }
    }
}

/// Where an implementation executes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locality {
    /// Direct in-process call
    Local,
    /// Requires a transport
    Remote,
}

impl std::fmt::Display for Locality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Locality::Local => write!(f, "local"),
            Locality::Remote => write!(f, "remote"),
        }
    }
}
