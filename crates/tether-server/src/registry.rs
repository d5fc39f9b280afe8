//! Process-wide set of named services.
//!
//! Built once during bootstrap and shared by the HTTP layer. Registration is
//! an atomic check-and-insert on a `DashMap` entry, so concurrent registrations
//! of the same name resolve to exactly one winner.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::info;

use crate::errors::ServiceError;
use crate::service::{Service, ServiceOptions};

/// Name → service map.
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    services: DashMap<String, Arc<Service>>,
}

impl ServiceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and register a service named `name`.
    pub fn register(
        &self,
        name: &str,
        options: ServiceOptions,
    ) -> Result<Arc<Service>, ServiceError> {
        if name.is_empty() {
            return Err(ServiceError::EmptyName);
        }
        match self.services.entry(name.to_string()) {
            Entry::Occupied(_) => Err(ServiceError::AlreadyExists(name.to_string())),
            Entry::Vacant(slot) => {
                let service = Arc::new(Service::new(name, options));
                let _ = slot.insert(service.clone());
                info!(service = name, "service registered");
                Ok(service)
            }
        }
    }

    /// Find a service by name.
    pub fn lookup(&self, name: &str) -> Result<Arc<Service>, ServiceError> {
        self.services
            .get(name)
            .map(|e| e.value().clone())
            .ok_or_else(|| ServiceError::NotFound(name.to_string()))
    }

    /// Registered service names (sorted).
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.services.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Number of registered services.
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Whether no services are registered.
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Live sessions across all services.
    pub fn session_count(&self) -> usize {
        self.services.iter().map(|e| e.value().session_count()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn register_then_lookup() {
        let registry = ServiceRegistry::new();
        let svc = registry.register("rpc", ServiceOptions::default()).unwrap();
        let found = registry.lookup("rpc").unwrap();
        assert!(Arc::ptr_eq(&svc, &found));
        assert_eq!(found.name(), "rpc");
    }

    #[test]
    fn duplicate_name_fails_and_keeps_original() {
        let registry = ServiceRegistry::new();
        let first = registry.register("rpc", ServiceOptions::default()).unwrap();
        assert_matches!(
            registry.register("rpc", ServiceOptions::default()),
            Err(ServiceError::AlreadyExists(name)) if name == "rpc"
        );
        assert!(Arc::ptr_eq(&first, &registry.lookup("rpc").unwrap()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unknown_name_is_not_found() {
        let registry = ServiceRegistry::new();
        assert_matches!(registry.lookup("nope"), Err(ServiceError::NotFound(_)));
    }

    #[test]
    fn empty_name_is_rejected() {
        let registry = ServiceRegistry::new();
        assert_matches!(
            registry.register("", ServiceOptions::default()),
            Err(ServiceError::EmptyName)
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn names_are_sorted() {
        let registry = ServiceRegistry::new();
        for name in ["rpc", "admin", "chat"] {
            let _ = registry.register(name, ServiceOptions::default()).unwrap();
        }
        assert_eq!(registry.names(), vec!["admin", "chat", "rpc"]);
    }

    #[test]
    fn concurrent_registration_has_one_winner() {
        let registry = Arc::new(ServiceRegistry::new());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let r = registry.clone();
                std::thread::spawn(move || r.register("shared", ServiceOptions::default()).is_ok())
            })
            .collect();
        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(wins, 1);
    }
}
