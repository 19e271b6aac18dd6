//! Dispatcher - performs the actual call to one implementation
//!
//! The router hands every attempt to a [`Dispatcher`] and never looks at an
//! implementation's locality itself. [`InProcessDispatcher`] runs local
//! implementations through registered handlers and forwards remote ones to
//! an optional transport-backed dispatcher.

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info};

use broker_core::Implementation;

use crate::context::InvocationContext;
use crate::error::DispatchError;

/// Executes a call against a single implementation
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Invoke `implementation` with `args` under `context`
    async fn dispatch(
        &self,
        implementation: &Implementation,
        context: &InvocationContext,
        args: &[Value],
    ) -> Result<Value, DispatchError>;
}

/// In-process handler for a local implementation
pub type LocalHandler = Arc<dyn Fn(Vec<Value>) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync>;

/// Dispatcher for in-process implementations
pub struct InProcessDispatcher {
    handlers: RwLock<HashMap<(String, String), LocalHandler>>,
    remote: Option<Arc<dyn Dispatcher>>,
}

impl InProcessDispatcher {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            remote: None,
        }
    }

    /// Forward remote implementations to `remote`
    pub fn with_remote(remote: Arc<dyn Dispatcher>) -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            remote: Some(remote),
        }
    }

    /// Register the handler run for a local implementation
    pub fn register<F, Fut>(&self, contract_id: &str, implementation_id: &str, handler: F)
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        info!(
            contract_id = %contract_id,
            implementation_id = %implementation_id,
            "Registering local handler"
        );
        let handler: LocalHandler = Arc::new(move |args| handler(args).boxed());
        self.handlers
            .write()
            .insert((contract_id.to_string(), implementation_id.to_string()), handler);
    }

    /// Remove a handler; returns whether one existed
    pub fn unregister(&self, contract_id: &str, implementation_id: &str) -> bool {
        self.handlers
            .write()
            .remove(&(contract_id.to_string(), implementation_id.to_string()))
            .is_some()
    }

    fn handler(&self, implementation: &Implementation) -> Option<LocalHandler> {
        let handlers = self.handlers.read();
        handlers
            .get(&(implementation.contract_id.clone(), implementation.id.clone()))
            .cloned()
    }
}

impl Default for InProcessDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Dispatcher for InProcessDispatcher {
    async fn dispatch(
        &self,
        implementation: &Implementation,
        context: &InvocationContext,
        args: &[Value],
    ) -> Result<Value, DispatchError> {
        if !implementation.is_local() {
            return match &self.remote {
                Some(remote) => remote.dispatch(implementation, context, args).await,
                None => Err(DispatchError::Transport(format!(
                    "no transport configured for remote implementation {}",
                    implementation.id
                ))),
            };
        }

        // Clone the handler out so the lock is released before awaiting
        let handler = self.handler(implementation).ok_or_else(|| {
            DispatchError::Local(format!(
                "no handler registered for {}/{}",
                implementation.contract_id, implementation.id
            ))
        })?;

        debug!(
            invocation_id = %context.invocation_id(),
            implementation_id = %implementation.id,
            "Running local handler"
        );
        handler(args.to_vec())
            .await
            .map_err(|e| DispatchError::Local(format!("{e:#}")))
    }
}
