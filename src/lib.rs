//! Request gateway library.
//!
//! Resolves a service name to a backend, bounds the call by a per-service
//! timeout from a policy authority, and isolates failing backends behind
//! per-service circuit breakers.

// Core
pub mod dispatch;
pub mod invoker;
pub mod policy;
pub mod routing;

// Cross-cutting concerns
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::GatewayConfig;
pub use dispatch::{DispatchError, Dispatcher, ErrorKind};
pub use http::GatewayServer;
pub use invoker::{InvokeError, Invoker};
pub use lifecycle::{Gateway, Shutdown};
pub use policy::{PolicyError, TimeoutPolicy};
pub use resilience::CallScope;
