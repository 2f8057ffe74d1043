use crate::types::RoleName;
use thiserror::Error;

/// Error raised by a [`RoleLoader`](crate::RoleLoader) implementation.
pub type LoaderError = Box<dyn std::error::Error + Send + Sync>;

/// Error raised by an [`IdentityProvider`](crate::IdentityProvider) implementation.
pub type ProviderError = Box<dyn std::error::Error + Send + Sync>;

/// Crate result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Role loader failure. The service stays unloaded.
    #[error("role loader error: {0}")]
    Loader(#[source] LoaderError),
    /// Identity provider failure.
    #[error("identity provider error: {0}")]
    Provider(#[source] ProviderError),
    /// Invalid identifier input.
    #[error("invalid id: {0}")]
    InvalidId(String),
    /// Invalid permission input.
    #[error("invalid permission: {0}")]
    InvalidPermission(String),
    /// Referenced role is absent from the graph.
    #[error("role {role} not found")]
    RoleNotFound { role: RoleName },
    /// Role name is already taken in the graph.
    #[error("role {role} already exists")]
    DuplicateRole { role: RoleName },
    /// Parent role must exist before its children.
    #[error("parent role {parent} of {role} does not exist")]
    UnknownParent { role: RoleName, parent: RoleName },
    /// Parent references form a loop.
    #[error("role cycle detected at role {role}")]
    RoleCycleDetected { role: RoleName },
    /// Assertion could not be resolved to a predicate.
    #[error("invalid assertion: {0}")]
    InvalidAssertion(String),
    /// Identity does not carry usable role names.
    #[error("invalid identity: {0}")]
    InvalidIdentity(String),
}

impl Error {
    pub(crate) fn loader(error: LoaderError) -> Self {
        Self::Loader(error)
    }

    pub(crate) fn provider(error: ProviderError) -> Self {
        Self::Provider(error)
    }
}
