use crate::error::ProviderError;
use async_trait::async_trait;

/// Caller identity carrying directly assigned role names.
///
/// The names are raw strings and are validated by the authorization service;
/// an invalid name is reported as [`Error::InvalidIdentity`](crate::Error::InvalidIdentity).
pub trait Identity: Send + Sync {
    /// Role names assigned to the identity, not expanded through the hierarchy.
    fn roles(&self) -> Vec<String>;
}

/// Resolves the identity of the current caller.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Identity type returned by the provider.
    type Identity: Identity;

    /// Returns the current identity, or `None` for an anonymous caller.
    async fn identity(&self) -> std::result::Result<Option<Self::Identity>, ProviderError>;
}

impl Identity for Vec<String> {
    fn roles(&self) -> Vec<String> {
        self.clone()
    }
}

impl<T> Identity for std::sync::Arc<T>
where
    T: Identity + ?Sized,
{
    fn roles(&self) -> Vec<String> {
        (**self).roles()
    }
}
