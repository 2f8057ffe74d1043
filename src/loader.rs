//! Role loading interfaces.
//!
//! A [`RoleLoader`] is invoked by the [`AuthorizationService`](crate::AuthorizationService)
//! when its role graph needs populating. It returns a [`RoleSet`] describing the roles,
//! their parents and their directly granted permissions for one load pass.

use crate::error::LoaderError;
use crate::permission::Permission;
use crate::types::RoleName;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

/// Context handed to a loader for one load pass.
///
/// Loaders backed by large stores can use it to fetch only the part of the
/// role universe relevant to the current check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadRequest {
    roles: Vec<RoleName>,
    permission: Option<Permission>,
    candidates: Vec<RoleName>,
}

impl LoadRequest {
    /// Creates a request for the caller's roles and the permission checked.
    pub fn new(roles: Vec<RoleName>, permission: Option<Permission>) -> Self {
        Self {
            roles,
            permission,
            candidates: Vec::new(),
        }
    }

    /// Adds the roles a satisfaction check compares the caller against.
    pub fn with_candidates(mut self, candidates: Vec<RoleName>) -> Self {
        self.candidates = candidates;
        self
    }

    /// Roles of the caller being evaluated, not yet expanded.
    pub fn roles(&self) -> &[RoleName] {
        &self.roles
    }

    /// Permission being checked, absent for role-satisfaction checks.
    pub fn permission(&self) -> Option<&Permission> {
        self.permission.as_ref()
    }

    /// Roles a satisfaction check needs besides the caller's. Empty for
    /// permission checks.
    ///
    /// Satisfaction compares descendants, so a loader serving a subset
    /// should include the subtrees below both these and [`LoadRequest::roles`].
    pub fn candidates(&self) -> &[RoleName] {
        &self.candidates
    }
}

/// One role of a [`RoleSet`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RoleEntry {
    #[cfg_attr(feature = "serde", serde(default))]
    parent: Option<RoleName>,
    #[cfg_attr(feature = "serde", serde(default))]
    permissions: BTreeSet<Permission>,
}

impl RoleEntry {
    /// Parent role, if any.
    pub fn parent(&self) -> Option<&RoleName> {
        self.parent.as_ref()
    }

    /// Permissions granted directly to the role.
    pub fn permissions(&self) -> impl Iterator<Item = &Permission> {
        self.permissions.iter()
    }
}

/// Roles produced by one load pass: role name to optional parent and permissions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct RoleSet {
    entries: BTreeMap<RoleName, RoleEntry>,
}

impl RoleSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a role without touching an existing parent.
    pub fn role(mut self, name: RoleName) -> Self {
        self.entries.entry(name).or_default();
        self
    }

    /// Adds a role whose parent is `parent`.
    pub fn child_of(mut self, name: RoleName, parent: RoleName) -> Self {
        self.insert(name, Some(parent));
        self
    }

    /// Grants `permission` directly to `name`, adding the role if needed.
    pub fn grant(mut self, name: RoleName, permission: Permission) -> Self {
        self.add_permission(name, permission);
        self
    }

    /// Inserts or re-parents a role.
    pub fn insert(&mut self, name: RoleName, parent: Option<RoleName>) {
        self.entries.entry(name).or_default().parent = parent;
    }

    /// Grants a permission, adding the role if needed.
    pub fn add_permission(&mut self, name: RoleName, permission: Permission) {
        self.entries
            .entry(name)
            .or_default()
            .permissions
            .insert(permission);
    }

    /// Returns the entry for a role.
    pub fn get(&self, name: &str) -> Option<&RoleEntry> {
        self.entries.get(name)
    }

    /// Returns whether the set names the role.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Iterates entries in role-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&RoleName, &RoleEntry)> {
        self.entries.iter()
    }

    /// Number of roles in the set.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Builds a set from heterogeneous storage records.
    ///
    /// Records that are not roles are skipped silently. Role records carrying
    /// an invalid name or parent are skipped with a warning; invalid
    /// permissions are dropped individually.
    pub fn from_records<'a, T>(records: impl IntoIterator<Item = &'a T>) -> Self
    where
        T: RoleRecord + 'a,
    {
        let mut set = Self::new();
        for record in records {
            let Some(view) = record.as_role() else {
                continue;
            };
            let name = match RoleName::new(view.name) {
                Ok(name) => name,
                Err(error) => {
                    warn!(record = view.name, %error, "skipping role record with invalid name");
                    continue;
                }
            };
            let parent = match view.parent.map(RoleName::new).transpose() {
                Ok(parent) => parent,
                Err(error) => {
                    warn!(role = %name, %error, "skipping role record with invalid parent");
                    continue;
                }
            };
            set.insert(name.clone(), parent);
            for raw in view.permissions {
                match Permission::new(raw) {
                    Ok(permission) => set.add_permission(name.clone(), permission),
                    Err(error) => {
                        warn!(role = %name, permission = raw, %error, "dropping invalid permission");
                    }
                }
            }
        }
        set
    }
}

/// Borrowed role shape exposed by a [`RoleRecord`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleView<'a> {
    /// Role name.
    pub name: &'a str,
    /// Parent role name.
    pub parent: Option<&'a str>,
    /// Permissions granted directly to the role.
    pub permissions: Vec<&'a str>,
}

/// Capability of a storage record to act as a role.
pub trait RoleRecord {
    /// Returns the role view, or `None` when the record is not a role.
    fn as_role(&self) -> Option<RoleView<'_>>;
}

/// Source of role definitions for one load pass.
#[async_trait]
pub trait RoleLoader: Send + Sync {
    /// Returns the roles to merge into the graph.
    async fn load_roles(
        &self,
        request: &LoadRequest,
    ) -> std::result::Result<RoleSet, LoaderError>;
}

/// Repository of stored records, some of which may be roles.
#[async_trait]
pub trait RoleRepository: Send + Sync {
    /// Record type returned by the repository.
    type Record: RoleRecord + Send + Sync;

    /// Returns every stored record.
    async fn find_all(&self) -> std::result::Result<Vec<Self::Record>, LoaderError>;
}

/// Loader that reads the whole role universe from a [`RoleRepository`].
///
/// Suited to small role sets, as every record is loaded on each pass.
#[derive(Debug, Clone)]
pub struct RepositoryRoleLoader<R> {
    repository: R,
}

impl<R> RepositoryRoleLoader<R> {
    /// Wraps a repository.
    pub fn new(repository: R) -> Self {
        Self { repository }
    }

    /// Returns the wrapped repository.
    pub fn repository(&self) -> &R {
        &self.repository
    }
}

#[async_trait]
impl<R> RoleLoader for RepositoryRoleLoader<R>
where
    R: RoleRepository,
{
    async fn load_roles(
        &self,
        _request: &LoadRequest,
    ) -> std::result::Result<RoleSet, LoaderError> {
        let records = self.repository.find_all().await?;
        Ok(RoleSet::from_records(&records))
    }
}
