//! Error types for the router module

use std::time::Duration;

use broker_core::Scope;
use thiserror::Error;

/// Failure of a single dispatch attempt against one implementation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    /// The attempt did not finish within the call timeout
    #[error("Dispatch timed out after {0:?}")]
    Timeout(Duration),

    /// The transport could not reach the implementation
    #[error("Transport failure: {0}")]
    Transport(String),

    /// Arguments or result could not be (de)serialized
    #[error("Serialization failure: {0}")]
    Serialization(String),

    /// The remote side raised an error
    #[error("Remote error {code}: {message}")]
    Remote { code: i32, message: String },

    /// An in-process implementation failed
    #[error("Local implementation failed: {0}")]
    Local(String),
}

impl DispatchError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, DispatchError::Timeout(_))
    }
}

/// Router error types
///
/// Exactly one of these reaches the caller per call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BrokerError {
    /// The call did not name a contract
    #[error("The contract id cannot be blank")]
    ContractIdMissing,

    /// The selected registry scope does not know the contract
    #[error("Contract not found: {contract_id}@{version} in {scope} scope")]
    ContractNotFound {
        contract_id: String,
        version: String,
        scope: Scope,
    },

    /// No candidate survived filtering and no degradation default applied
    #[error("No implementation available for contract {contract_id}")]
    ImplementationNotFound { contract_id: String },

    /// Every attempt failed; carries the last underlying cause
    #[error("Invocation of contract {contract_id} failed: {cause}")]
    Invocation {
        contract_id: String,
        #[source]
        cause: DispatchError,
    },
}

impl BrokerError {
    /// Numeric code in the broker client error space
    pub fn code(&self) -> u32 {
        match self {
            BrokerError::ContractIdMissing => 0x7F01_0000,
            BrokerError::ContractNotFound { .. } => 0x7F01_0001,
            BrokerError::ImplementationNotFound { .. } => 0x7F01_0002,
            BrokerError::Invocation { cause, .. } => match cause {
                DispatchError::Timeout(_) => 0x7F01_0003,
                DispatchError::Transport(_) => 0x7F01_0004,
                DispatchError::Serialization(_) => 0x7F01_0005,
                DispatchError::Remote { .. } => 0x7F01_0006,
                DispatchError::Local(_) => 0x7F01_0007,
            },
        }
    }

    /// Contract the failed call targeted, when known
    pub fn contract_id(&self) -> Option<&str> {
        match self {
            BrokerError::ContractIdMissing => None,
            BrokerError::ContractNotFound { contract_id, .. }
            | BrokerError::ImplementationNotFound { contract_id }
            | BrokerError::Invocation { contract_id, .. } => Some(contract_id),
        }
    }

    /// Underlying dispatch failure, for invocation errors
    pub fn cause(&self) -> Option<&DispatchError> {
        match self {
            BrokerError::Invocation { cause, .. } => Some(cause),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_invocation_error_carries_cause() {
        let err = BrokerError::Invocation {
            contract_id: "greet".to_string(),
            cause: DispatchError::Remote { code: 500, message: "boom".to_string() },
        };

        assert_eq!(err.contract_id(), Some("greet"));
        assert_eq!(err.code(), 0x7F01_0006);
        assert!(err.source().is_some());
        assert_eq!(
            err.to_string(),
            "Invocation of contract greet failed: Remote error 500: boom"
        );
    }

    #[test]
    fn test_routing_errors_have_distinct_codes() {
        let missing = BrokerError::ContractIdMissing;
        let not_found = BrokerError::ContractNotFound {
            contract_id: "c".to_string(),
            version: "1.0.0".to_string(),
            scope: Scope::Local,
        };
        let no_impl = BrokerError::ImplementationNotFound { contract_id: "c".to_string() };

        assert_ne!(missing.code(), not_found.code());
        assert_ne!(not_found.code(), no_impl.code());
        assert!(missing.contract_id().is_none());
        assert!(no_impl.cause().is_none());
        assert!(not_found.to_string().contains("local scope"));
    }
}
