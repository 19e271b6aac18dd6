//! Configuration module for the call broker

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::Scope;

/// Defaults applied to every call builder before caller directives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Extra attempts per candidate after the first failure
    pub retry: u32,

    /// Per-attempt timeout in milliseconds
    pub timeout_ms: u64,

    /// Registry partition calls resolve from
    pub scope: Scope,

    /// Environment tag calls are restricted to, if any
    pub environment: Option<String>,

    /// Whether an empty candidate set falls back to the degradation default
    pub degradation: bool,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            retry: 0,
            timeout_ms: 3000,
            scope: Scope::Global,
            environment: None,
            degradation: true,
        }
    }
}

impl BrokerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    ///
    /// Values that fail to parse are ignored and the default is kept.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = BrokerConfig::default();

        if let Some(retry) = lookup("BROKER_RETRY") {
            if let Ok(retry) = retry.trim().parse() {
                config.retry = retry;
            }
        }

        if let Some(timeout) = lookup("BROKER_TIMEOUT_MS") {
            if let Ok(timeout) = timeout.trim().parse::<u64>() {
                if timeout > 0 {
                    config.timeout_ms = timeout;
                }
            }
        }

        if let Some(scope) = lookup("BROKER_SCOPE") {
            if let Ok(scope) = scope.parse() {
                config.scope = scope;
            }
        }

        if let Some(environment) = lookup("BROKER_ENVIRONMENT") {
            let environment = environment.trim();
            if !environment.is_empty() {
                config.environment = Some(environment.to_string());
            }
        }

        if let Some(degradation) = lookup("BROKER_DEGRADATION") {
            if let Ok(degradation) = degradation.trim().parse() {
                config.degradation = degradation;
            }
        }

        config
    }

    /// Parse configuration from a JSON document; missing fields take defaults
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
