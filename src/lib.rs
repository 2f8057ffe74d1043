//! Role-based access control with lazily loaded role hierarchies.
//!
//! A [`RoleGraph`] holds roles with at most one parent each; a role is granted
//! every permission assigned to it or to one of its ancestors. The
//! [`AuthorizationService`] resolves the caller's roles through an
//! [`IdentityProvider`], populates the graph through a [`RoleLoader`] on first
//! use (or on every check with force-reload), applies optional runtime
//! [`Assertion`]s and returns a grant decision. The default behavior is
//! deny-by-default.
//!
//! # Examples
//!
//! Checking a permission with the in-memory loader (enable `memory-loader`):
//! ```no_run
//! use rs_rbac::{AuthorizationServiceBuilder, Permission, RoleName, RoleSet};
//! # #[cfg(feature = "memory-loader")]
//! # {
//! use rs_rbac::{MemoryRoleLoader, StaticIdentity, StaticIdentityProvider};
//! let user = RoleName::try_from("user").unwrap();
//! let admin = RoleName::try_from("admin").unwrap();
//! let view = Permission::try_from("view").unwrap();
//! let loader = MemoryRoleLoader::with_roles(
//!     RoleSet::new()
//!         .grant(user.clone(), view.clone())
//!         .child_of(admin, user),
//! );
//! let provider = StaticIdentityProvider::signed_in(StaticIdentity::new(["admin"]));
//! let service = AuthorizationServiceBuilder::new(loader, provider).build();
//! let _ = service.is_granted(&view, None);
//! # }
//! ```
//!
//! Running an assertion on top of the role check:
//! ```no_run
//! # #[cfg(feature = "memory-loader")]
//! # {
//! use rs_rbac::{AssertionRef, AuthorizationServiceBuilder, MemoryRoleLoader, Permission};
//! use rs_rbac::{StaticIdentity, StaticIdentityProvider};
//! let service = AuthorizationServiceBuilder::new(
//!     MemoryRoleLoader::new(),
//!     StaticIdentityProvider::anonymous(),
//! )
//! .assertion("signed_in", |identity: Option<&StaticIdentity>| identity.is_some())
//! .build();
//! let publish = Permission::try_from("post.publish").unwrap();
//! let _ = service.is_granted(&publish, Some(AssertionRef::named("signed_in")));
//! # }
//! ```
#![forbid(unsafe_code)]

mod assertion;
mod error;
mod graph;
mod identity;
mod loader;
mod options;
mod permission;
mod service;
mod types;

#[cfg(feature = "memory-loader")]
mod memory;

pub use crate::assertion::{Assertion, AssertionRef, AssertionRegistry};
pub use crate::error::{Error, LoaderError, ProviderError, Result};
pub use crate::graph::{Ancestors, Role, RoleGraph};
pub use crate::identity::{Identity, IdentityProvider};
pub use crate::loader::{
    LoadRequest, RepositoryRoleLoader, RoleEntry, RoleLoader, RoleRecord, RoleRepository, RoleSet,
    RoleView,
};
pub use crate::options::{
    AssertionTiming, EvaluationMode, RbacOptions, RoleMatch, UnknownRolePolicy,
};
pub use crate::permission::Permission;
pub use crate::service::{AuthorizationService, AuthorizationServiceBuilder, LoadState};
pub use crate::types::RoleName;

#[cfg(feature = "memory-loader")]
pub use crate::memory::{MemoryRoleLoader, StaticIdentity, StaticIdentityProvider};
