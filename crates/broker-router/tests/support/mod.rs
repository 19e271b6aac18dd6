//! Shared fixtures for router integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use broker_router::{
    DispatchError, Dispatcher, Implementation, InMemoryRegistry, InvocationContext, Registry, Router,
    Scope, ServiceContract,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Behaviour of one implementation under the scripted dispatcher
#[derive(Debug, Clone)]
pub enum Script {
    /// Always succeed with the value
    Reply(Value),
    /// Always fail
    Fail(DispatchError),
    /// Sleep, then succeed
    Delayed(Duration, Value),
    /// Fail the first `n` attempts, then succeed
    FlakyThenReply(usize, Value),
}

/// Dispatcher that replays per-implementation scripts and records every call
#[derive(Default)]
pub struct ScriptedDispatcher {
    scripts: Mutex<HashMap<String, Script>>,
    calls: Mutex<Vec<(String, Vec<Value>)>>,
}

impl ScriptedDispatcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, implementation_id: &str, script: Script) {
        self.scripts.lock().insert(implementation_id.to_string(), script);
    }

    /// Implementation ids in dispatch order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(id, _)| id.clone()).collect()
    }

    pub fn calls_to(&self, implementation_id: &str) -> Vec<Vec<Value>> {
        self.calls
            .lock()
            .iter()
            .filter(|(id, _)| id == implementation_id)
            .map(|(_, args)| args.clone())
            .collect()
    }

    fn attempts_so_far(&self, implementation_id: &str) -> usize {
        self.calls.lock().iter().filter(|(id, _)| id == implementation_id).count()
    }
}

#[async_trait]
impl Dispatcher for ScriptedDispatcher {
    async fn dispatch(
        &self,
        implementation: &Implementation,
        _context: &InvocationContext,
        args: &[Value],
    ) -> Result<Value, DispatchError> {
        let previous = self.attempts_so_far(&implementation.id);
        self.calls.lock().push((implementation.id.clone(), args.to_vec()));

        let script = self.scripts.lock().get(&implementation.id).cloned();
        match script {
            Some(Script::Reply(value)) => Ok(value),
            Some(Script::Fail(err)) => Err(err),
            Some(Script::Delayed(delay, value)) => {
                tokio::time::sleep(delay).await;
                Ok(value)
            }
            Some(Script::FlakyThenReply(failures, value)) => {
                if previous < failures {
                    Err(DispatchError::Transport(format!("flaky attempt {}", previous + 1)))
                } else {
                    Ok(value)
                }
            }
            None => Err(DispatchError::Transport(format!("no script for {}", implementation.id))),
        }
    }
}

/// Registry wrapper counting lookups
pub struct CountingRegistry {
    pub inner: InMemoryRegistry,
    pub lookups: AtomicUsize,
}

impl CountingRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: InMemoryRegistry::new(),
            lookups: AtomicUsize::new(0),
        })
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl Registry for CountingRegistry {
    fn resolve(&self, contract_id: &str, version: &str, scope: Scope) -> Option<Arc<ServiceContract>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.resolve(contract_id, version, scope)
    }
}

/// Registry with `ids` registered as remote implementations of `contract_id` (global scope)
pub fn registry_with(contract_id: &str, ids: &[&str]) -> Arc<InMemoryRegistry> {
    let registry = Arc::new(InMemoryRegistry::new());
    for id in ids {
        registry.global().register(Implementation::remote(contract_id, *id));
    }
    registry
}

pub fn router(registry: Arc<InMemoryRegistry>, dispatcher: Arc<ScriptedDispatcher>) -> Router {
    init_tracing();
    Router::new(registry, dispatcher)
}

pub fn fail(message: &str) -> Script {
    Script::Fail(DispatchError::Remote { code: 500, message: message.to_string() })
}
