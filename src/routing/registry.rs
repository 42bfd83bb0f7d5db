//! Service name lookup.
//!
//! # Responsibilities
//! - Store one breaker-wrapped invoker per service name
//! - Resolve a name to its invoker, or report an explicit miss
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(1) lookup via HashMap
//! - Exact, case-sensitive names: no prefix match, no default service

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::invoker::Invoker;

/// No invoker is registered under this name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown service '{0}'")]
pub struct UnknownService(pub String);

/// Read-only mapping from service name to invoker.
#[derive(Default)]
pub struct ServiceRegistry {
    services: HashMap<String, Arc<dyn Invoker>>,
}

impl ServiceRegistry {
    pub fn new(services: HashMap<String, Arc<dyn Invoker>>) -> Self {
        Self { services }
    }

    /// Resolve `service` to its invoker.
    pub fn get(&self, service: &str) -> Result<&Arc<dyn Invoker>, UnknownService> {
        self.services
            .get(service)
            .ok_or_else(|| UnknownService(service.to_string()))
    }

    pub fn contains(&self, service: &str) -> bool {
        self.services.contains_key(service)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Registered names, sorted.
    pub fn service_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.services.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl FromIterator<(String, Arc<dyn Invoker>)> for ServiceRegistry {
    fn from_iter<T: IntoIterator<Item = (String, Arc<dyn Invoker>)>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("services", &self.service_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoker::{FnInvoker, InvokeError};
    use bytes::Bytes;

    fn stub(reply: &'static str) -> Arc<dyn Invoker> {
        Arc::new(FnInvoker::new(move |_, _| async move {
            Ok::<_, InvokeError>(Bytes::from_static(reply.as_bytes()))
        }))
    }

    #[test]
    fn test_get_known_service() {
        let invoker = stub("ok");
        let registry: ServiceRegistry = [("svc".to_string(), invoker.clone())].into_iter().collect();

        let found = registry.get("svc").unwrap();
        assert!(Arc::ptr_eq(found, &invoker));
    }

    #[test]
    fn test_get_unknown_service() {
        let registry = ServiceRegistry::default();
        let err = registry.get("unknown").err().unwrap();
        assert_eq!(err, UnknownService("unknown".into()));
        assert_eq!(err.to_string(), "unknown service 'unknown'");
    }

    #[test]
    fn test_lookup_is_exact() {
        let registry: ServiceRegistry = [("users".to_string(), stub("u"))].into_iter().collect();

        assert!(registry.get("Users").is_err());
        assert!(registry.get("user").is_err());
        assert!(registry.get("users/").is_err());
        assert!(registry.contains("users"));
    }

    #[test]
    fn test_service_names_sorted() {
        let registry: ServiceRegistry = [
            ("b".to_string(), stub("b")),
            ("a".to_string(), stub("a")),
        ]
        .into_iter()
        .collect();

        assert_eq!(registry.service_names(), vec!["a", "b"]);
        assert_eq!(registry.len(), 2);
        assert!(!registry.is_empty());
    }
}
