//! Broker Router - Client-side Call Routing
//!
//! Decides which implementation(s) of a service contract a call reaches,
//! retries and fails over on errors, folds multicast results, and falls back
//! to a degradation default when nothing else is available.
//!
//! # Architecture
//!
//! ```text
//! CallBuilder / Invoker
//!     │  build()
//!     ▼
//! ┌─────────────────────────┐
//! │   InvocationContext     │  Frozen routing directives
//! └───────────┬─────────────┘
//!             │
//!             ▼
//! ┌─────────────────────────┐
//! │        Router           │  Resolve → filter → dispatch → fold
//! │  (Which implementation?)│
//! └───────────┬─────────────┘
//!             │
//!             ▼
//! ┌─────────────────────────┐
//! │      Dispatcher         │  Local handler or remote transport
//! └─────────────────────────┘
//! ```
//!
//! # Candidate Selection
//!
//! - **Environment**: keep implementations tagged with the requested environment
//! - **Fixed ids**: keep only pinned implementations, in pin order
//! - **Selection filters**: conjoined predicates with stable ranking
//!   (`PreferLocal`, `WeightOrder`, `TagMatch`, `ConsistentHash`, or closures)
//!
//! # Example
//!
//! ```rust,ignore
//! use broker_router::{Accumulator, InMemoryRegistry, InProcessDispatcher, Router};
//!
//! let router = Router::new(registry, dispatcher);
//!
//! // Unicast with failover
//! let greeting = router.invoker("greet").retry(1).invoke(&[json!("bob")]).await?;
//!
//! // Multicast, folded in candidate order
//! let total = router
//!     .invoker("count")
//!     .multicast(Accumulator::new(|a, b| json!(a.as_i64()? + b.as_i64()?)))
//!     .invoke(&[])
//!     .await?;
//! ```

// Core modules
mod error;
mod types;
mod context;
mod builder;

// Selection filters
pub mod filter;

// Collaborators
mod registry;
mod dispatcher;

// Router
mod router;
mod invoker;

// Re-exports: Error types
pub use error::{BrokerError, DispatchError};

// Re-exports: Core types
pub use types::{
    Accumulator, CallState, CastMode, CommunicationType, FilterExtensions, Format, Protocol,
    TimeUnit,
};

// Re-exports: Contract model
pub use broker_core::{
    BrokerConfig, Implementation, Locality, MethodSignature, Scope, ServiceContract,
    UniqueImplementationId, DEFAULT_VERSION,
};

// Re-exports: Call configuration
pub use builder::CallBuilder;
pub use context::InvocationContext;

// Re-exports: Filters
pub use filter::{
    filter_fn, ConsistentHash, PreferLocal, Rank, SelectionFilter, TagMatch, Verdict, WeightOrder,
};

// Re-exports: Collaborators
pub use dispatcher::{Dispatcher, InProcessDispatcher, LocalHandler};
pub use registry::{ContractRepository, InMemoryRegistry, Registry};

// Re-exports: Routing
pub use invoker::Invoker;
pub use router::Router;
