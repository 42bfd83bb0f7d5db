//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound call (service name)
//!     → registry.rs (exact name lookup)
//!     → Return: breaker-wrapped Invoker or UnknownService
//!
//! Registry assembly (at startup):
//!     ServiceConfig[]
//!     → one HttpInvoker per service
//!     → wrap each in BreakerInvoker
//!     → Freeze as immutable ServiceRegistry
//! ```
//!
//! # Design Decisions
//! - Registry built at startup, immutable at runtime
//! - Deterministic: a name always resolves to the same invoker

pub mod registry;

pub use registry::{ServiceRegistry, UnknownService};
