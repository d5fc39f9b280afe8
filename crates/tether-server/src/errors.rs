//! Service-level error types.

use tether_rpc::{RegistryError, TransportError};

/// Errors from the service registry and service operations.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// A service with this name is already registered.
    #[error("service already registered: {0}")]
    AlreadyExists(String),

    /// No service with this name.
    #[error("service not found: {0}")]
    NotFound(String),

    /// The service name is empty.
    #[error("service name must not be empty")]
    EmptyName,

    /// No live session for this connection.
    #[error("no session for connection {0}")]
    UnknownConnection(String),

    /// Handler or middleware registration failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Writing to the connection failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_service() {
        assert_eq!(
            ServiceError::AlreadyExists("rpc".into()).to_string(),
            "service already registered: rpc"
        );
        assert_eq!(
            ServiceError::NotFound("chat".into()).to_string(),
            "service not found: chat"
        );
    }

    #[test]
    fn registry_errors_pass_through() {
        let err: ServiceError = RegistryError::Sealed("login".into()).into();
        assert!(err.to_string().contains("login"));
    }
}
