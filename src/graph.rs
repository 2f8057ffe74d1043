//! In-memory role hierarchy.
//!
//! Every role has at most one parent. A role is granted a permission when the
//! permission is assigned to the role itself or to any role on its ancestor
//! chain. Roles can only be attached to parents already in the graph, so the
//! hierarchy is an acyclic forest by construction.

use crate::error::{Error, Result};
use crate::loader::{RoleEntry, RoleSet};
use crate::permission::Permission;
use crate::types::RoleName;
use std::collections::{BTreeSet, HashMap, HashSet};

/// A role stored in a [`RoleGraph`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Role {
    name: RoleName,
    parent: Option<RoleName>,
    children: Vec<RoleName>,
    permissions: BTreeSet<Permission>,
}

impl Role {
    fn new(name: RoleName, parent: Option<RoleName>) -> Self {
        Self {
            name,
            parent,
            children: Vec::new(),
            permissions: BTreeSet::new(),
        }
    }

    /// Role name.
    pub fn name(&self) -> &RoleName {
        &self.name
    }

    /// Parent role name.
    pub fn parent(&self) -> Option<&RoleName> {
        self.parent.as_ref()
    }

    /// Direct children in insertion order.
    pub fn children(&self) -> &[RoleName] {
        &self.children
    }

    /// Returns whether the role has children.
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Permissions assigned directly to this role.
    pub fn permissions(&self) -> impl Iterator<Item = &Permission> {
        self.permissions.iter()
    }

    /// Returns whether the permission is assigned directly, ignoring ancestors.
    pub fn has_permission(&self, permission: &Permission) -> bool {
        self.permissions.contains(permission)
    }
}

/// Role container keyed by role name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct RoleGraph {
    roles: HashMap<RoleName, Role>,
}

impl RoleGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a graph from a role set.
    pub fn from_role_set(set: &RoleSet) -> Result<Self> {
        let mut graph = Self::new();
        graph.apply(set)?;
        Ok(graph)
    }

    /// Number of roles.
    pub fn len(&self) -> usize {
        self.roles.len()
    }

    /// Returns whether the graph holds no roles.
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// Iterates roles in arbitrary order.
    pub fn roles(&self) -> impl Iterator<Item = &Role> {
        self.roles.values()
    }

    /// Inserts a role under an optional parent.
    ///
    /// Fails with [`Error::DuplicateRole`] if the name is taken and with
    /// [`Error::UnknownParent`] if the parent is not in the graph yet.
    pub fn add_role(&mut self, name: RoleName, parent: Option<RoleName>) -> Result<()> {
        if self.roles.contains_key(&name) {
            return Err(Error::DuplicateRole { role: name });
        }
        if let Some(parent_name) = &parent {
            let Some(parent_role) = self.roles.get_mut(parent_name) else {
                return Err(Error::UnknownParent {
                    role: name,
                    parent: parent_name.clone(),
                });
            };
            parent_role.children.push(name.clone());
        }
        self.roles.insert(name.clone(), Role::new(name, parent));
        Ok(())
    }

    /// Assigns a permission directly to a role.
    pub fn grant(&mut self, role: &str, permission: Permission) -> Result<()> {
        let entry = self.roles.get_mut(role).ok_or_else(|| not_found(role))?;
        entry.permissions.insert(permission);
        Ok(())
    }

    /// Returns whether the role exists.
    pub fn has_role(&self, name: &str) -> bool {
        self.roles.contains_key(name)
    }

    /// Returns a role by name.
    pub fn get_role(&self, name: &str) -> Result<&Role> {
        self.roles.get(name).ok_or_else(|| not_found(name))
    }

    /// Returns whether `role` holds `permission` directly or through an ancestor.
    pub fn is_granted(&self, role: &str, permission: &Permission) -> Result<bool> {
        Ok(self
            .ancestors(role)?
            .any(|ancestor| ancestor.has_permission(permission)))
    }

    /// Walks the ancestor chain, starting with the role itself.
    ///
    /// The walk yields at most [`len`](Self::len) roles.
    pub fn ancestors(&self, role: &str) -> Result<Ancestors<'_>> {
        let start = self.get_role(role)?;
        Ok(Ancestors {
            graph: self,
            next: Some(start),
            remaining: self.roles.len(),
        })
    }

    /// Returns every role below `role`, excluding the role itself.
    pub fn descendants(&self, role: &str) -> Result<Vec<&RoleName>> {
        let start = self.get_role(role)?;
        let mut visited: HashSet<&RoleName> = HashSet::from([&start.name]);
        let mut output = Vec::new();
        let mut stack: Vec<&RoleName> = start.children.iter().rev().collect();

        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            output.push(current);
            if let Some(node) = self.roles.get(current) {
                stack.extend(node.children.iter().rev());
            }
        }

        Ok(output)
    }

    /// Expands names to themselves plus all their descendants.
    ///
    /// The result is deduplicated and keeps first-seen order. Names absent
    /// from the graph contribute only themselves.
    pub fn flatten_descendants<'a, I>(&self, names: I) -> Vec<RoleName>
    where
        I: IntoIterator<Item = &'a RoleName>,
    {
        let mut seen = HashSet::new();
        let mut output = Vec::new();
        for name in names {
            if seen.insert(name.clone()) {
                output.push(name.clone());
            }
            let Ok(descendants) = self.descendants(name.as_str()) else {
                continue;
            };
            for descendant in descendants {
                if seen.insert(descendant.clone()) {
                    output.push(descendant.clone());
                }
            }
        }
        output
    }

    /// Merges a role set into the graph in a single pass.
    ///
    /// Parents are inserted before their children regardless of set order.
    /// A role already present with the same parent gains the new permissions;
    /// one present under another parent is a [`Error::DuplicateRole`]. On any
    /// error the graph is left untouched.
    pub fn apply(&mut self, set: &RoleSet) -> Result<()> {
        self.apply_adopting(set, &HashSet::new())
    }

    /// Like [`RoleGraph::apply`], but parentless roles listed in `placeholders`
    /// may take the parent the set gives them.
    pub(crate) fn apply_adopting(
        &mut self,
        set: &RoleSet,
        placeholders: &HashSet<RoleName>,
    ) -> Result<()> {
        let mut staged = self.clone();
        let mut pending: Vec<(&RoleName, &RoleEntry)> = set.iter().collect();

        while !pending.is_empty() {
            let before = pending.len();
            let mut deferred = Vec::new();

            for (name, entry) in pending {
                if let Some(existing) = staged.roles.get(name) {
                    if existing.parent.as_ref() != entry.parent() {
                        let adoptable = existing.parent.is_none() && placeholders.contains(name);
                        let Some(parent) = entry.parent().filter(|_| adoptable) else {
                            return Err(Error::DuplicateRole { role: name.clone() });
                        };
                        if !staged.has_role(parent.as_str()) {
                            deferred.push((name, entry));
                            continue;
                        }
                        staged.attach(name, parent)?;
                    }
                } else if let Some(parent) = entry.parent()
                    && !staged.has_role(parent.as_str())
                {
                    deferred.push((name, entry));
                    continue;
                } else {
                    staged.add_role(name.clone(), entry.parent().cloned())?;
                }
                for permission in entry.permissions() {
                    staged.grant(name.as_str(), permission.clone())?;
                }
            }

            if deferred.len() == before {
                return Err(stalled_error(set, &deferred));
            }
            pending = deferred;
        }

        *self = staged;
        Ok(())
    }

    // Moves a root role under `parent`.
    fn attach(&mut self, name: &RoleName, parent: &RoleName) -> Result<()> {
        if name == parent || self.descendants(name.as_str())?.contains(&parent) {
            return Err(Error::RoleCycleDetected { role: name.clone() });
        }
        if let Some(parent_role) = self.roles.get_mut(parent) {
            parent_role.children.push(name.clone());
        }
        if let Some(role) = self.roles.get_mut(name) {
            role.parent = Some(parent.clone());
        }
        Ok(())
    }
}

fn not_found(role: &str) -> Error {
    Error::RoleNotFound {
        role: RoleName::from_string(role.to_string()),
    }
}

// Entries that cannot be placed either hang off a parent nobody defines, or
// only reference each other through parents.
fn stalled_error(set: &RoleSet, deferred: &[(&RoleName, &RoleEntry)]) -> Error {
    for (name, entry) in deferred {
        if let Some(parent) = entry.parent()
            && !set.contains(parent.as_str())
        {
            return Error::UnknownParent {
                role: (*name).clone(),
                parent: parent.clone(),
            };
        }
    }
    let role = deferred
        .first()
        .map(|(name, _)| (*name).clone())
        .unwrap_or_else(|| RoleName::from_string(String::new()));
    Error::RoleCycleDetected { role }
}

/// Iterator over a role and its ancestors. See [`RoleGraph::ancestors`].
#[derive(Debug, Clone)]
pub struct Ancestors<'a> {
    graph: &'a RoleGraph,
    next: Option<&'a Role>,
    remaining: usize,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a Role;

    fn next(&mut self) -> Option<&'a Role> {
        if self.remaining == 0 {
            return None;
        }
        let current = self.next.take()?;
        self.remaining -= 1;
        self.next = current
            .parent
            .as_ref()
            .and_then(|parent| self.graph.roles.get(parent));
        Some(current)
    }
}
