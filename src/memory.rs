use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;

use crate::error::{LoaderError, ProviderError};
use crate::identity::{Identity, IdentityProvider};
use crate::loader::{LoadRequest, RoleEntry, RoleLoader, RoleSet};
use crate::permission::Permission;
use crate::types::RoleName;

/// In-memory role loader for tests and demos.
///
/// Clones share the same roles and load counter. In partial mode a load pass
/// only returns the requested roles and their ancestors.
#[derive(Debug, Default, Clone)]
pub struct MemoryRoleLoader {
    inner: Arc<Inner>,
    partial: bool,
}

#[derive(Debug, Default)]
struct Inner {
    roles: RwLock<RoleSet>,
    loads: AtomicUsize,
}

impl MemoryRoleLoader {
    /// Creates an empty loader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a loader serving `roles`.
    pub fn with_roles(roles: RoleSet) -> Self {
        let loader = Self::new();
        *loader.inner.roles.write().unwrap_or_else(PoisonError::into_inner) = roles;
        loader
    }

    /// Serves only the requested roles and their ancestors on each pass.
    pub fn partial(mut self, on: bool) -> Self {
        self.partial = on;
        self
    }

    /// Adds or re-parents a role.
    pub fn add_role(&self, role: RoleName, parent: Option<RoleName>) {
        let mut guard = self.inner.roles.write().unwrap_or_else(PoisonError::into_inner);
        guard.insert(role, parent);
    }

    /// Grants a permission to a role.
    pub fn add_permission(&self, role: RoleName, permission: Permission) {
        let mut guard = self.inner.roles.write().unwrap_or_else(PoisonError::into_inner);
        guard.add_permission(role, permission);
    }

    /// Number of load passes served so far.
    pub fn load_count(&self) -> usize {
        self.inner.loads.load(Ordering::SeqCst)
    }

    fn select(roles: &RoleSet, request: &LoadRequest) -> RoleSet {
        let mut selected = RoleSet::new();
        let mut visited = HashSet::new();
        let mut stack: Vec<&RoleName> = request
            .roles()
            .iter()
            .chain(request.candidates())
            .collect();

        // Satisfaction checks walk downwards, so serve the subtrees too.
        if request.permission().is_none() {
            let roots: HashSet<&str> = stack.iter().copied().map(RoleName::as_str).collect();
            let below: Vec<&RoleName> = roles
                .iter()
                .filter(|(name, _)| Self::descends_from(roles, name, &roots))
                .map(|(name, _)| name)
                .collect();
            stack.extend(below);
        }

        while let Some(name) = stack.pop() {
            if !visited.insert(name) {
                continue;
            }
            let Some(entry) = roles.get(name.as_str()) else {
                continue;
            };
            selected.insert(name.clone(), entry.parent().cloned());
            for permission in entry.permissions() {
                selected.add_permission(name.clone(), permission.clone());
            }
            if let Some(parent) = entry.parent() {
                stack.push(parent);
            }
        }

        selected
    }

    fn descends_from(roles: &RoleSet, name: &RoleName, roots: &HashSet<&str>) -> bool {
        let mut current = roles.get(name.as_str()).and_then(RoleEntry::parent);
        for _ in 0..roles.len() {
            let Some(parent) = current else {
                return false;
            };
            if roots.contains(parent.as_str()) {
                return true;
            }
            current = roles.get(parent.as_str()).and_then(RoleEntry::parent);
        }
        false
    }
}

#[async_trait]
impl RoleLoader for MemoryRoleLoader {
    async fn load_roles(
        &self,
        request: &LoadRequest,
    ) -> std::result::Result<RoleSet, LoaderError> {
        self.inner.loads.fetch_add(1, Ordering::SeqCst);
        let guard = self.inner.roles.read().unwrap_or_else(PoisonError::into_inner);
        if self.partial {
            Ok(Self::select(&guard, request))
        } else {
            Ok(guard.clone())
        }
    }
}

/// Identity holding a fixed list of role names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticIdentity {
    roles: Vec<String>,
}

impl StaticIdentity {
    /// Creates an identity with the given role names.
    pub fn new<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }
}

impl Identity for StaticIdentity {
    fn roles(&self) -> Vec<String> {
        self.roles.clone()
    }
}

/// Identity provider whose current identity is set by hand.
///
/// Clones share the same identity.
#[derive(Debug, Default, Clone)]
pub struct StaticIdentityProvider {
    identity: Arc<RwLock<Option<StaticIdentity>>>,
}

impl StaticIdentityProvider {
    /// Creates a provider with no identity.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Creates a provider signed in as `identity`.
    pub fn signed_in(identity: StaticIdentity) -> Self {
        let provider = Self::default();
        provider.sign_in(identity);
        provider
    }

    /// Replaces the current identity.
    pub fn sign_in(&self, identity: StaticIdentity) {
        *self.identity.write().unwrap_or_else(PoisonError::into_inner) = Some(identity);
    }

    /// Clears the current identity.
    pub fn sign_out(&self) {
        *self.identity.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    type Identity = StaticIdentity;

    async fn identity(&self) -> std::result::Result<Option<StaticIdentity>, ProviderError> {
        Ok(self
            .identity
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }
}
