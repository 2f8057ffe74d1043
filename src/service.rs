use crate::assertion::{Assertion, AssertionRef, AssertionRegistry};
use crate::error::{Error, Result};
use crate::graph::RoleGraph;
use crate::identity::{Identity, IdentityProvider};
use crate::loader::{LoadRequest, RoleLoader};
use crate::options::{AssertionTiming, EvaluationMode, RbacOptions, RoleMatch, UnknownRolePolicy};
use crate::permission::Permission;
use crate::types::RoleName;
use futures::lock::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

/// Load lifecycle of the service's role graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// The loader has not completed a pass yet.
    Unloaded,
    /// A load pass succeeded. Force-reload keeps the service in this state.
    Loaded,
}

// Guarded by the load lock. Placeholders are guest roles the service inserted
// without a loaded definition; a later load may still give them a parent.
#[derive(Debug)]
struct LoadSession {
    state: LoadState,
    placeholders: HashSet<RoleName>,
}

/// Evaluates permission checks for the current caller against a lazily
/// populated [`RoleGraph`].
pub struct AuthorizationService<L, P: IdentityProvider> {
    loader: L,
    identity_provider: P,
    graph: RwLock<RoleGraph>,
    seed: RoleGraph,
    session: Mutex<LoadSession>,
    force_reload: AtomicBool,
    guest_role: Option<RoleName>,
    role_match: RoleMatch,
    unknown_role_policy: UnknownRolePolicy,
    assertion_timing: AssertionTiming,
    assertions: AssertionRegistry<P::Identity>,
}

/// Builder for [`AuthorizationService`].
pub struct AuthorizationServiceBuilder<L, P: IdentityProvider> {
    loader: L,
    identity_provider: P,
    graph: RoleGraph,
    force_reload: bool,
    guest_role: Option<RoleName>,
    role_match: RoleMatch,
    unknown_role_policy: UnknownRolePolicy,
    assertion_timing: AssertionTiming,
    assertions: AssertionRegistry<P::Identity>,
}

impl<L, P: IdentityProvider> AuthorizationServiceBuilder<L, P> {
    /// Creates a builder with the lenient preset, no guest role and an empty graph.
    pub fn new(loader: L, identity_provider: P) -> Self {
        let mode = EvaluationMode::default();
        Self {
            loader,
            identity_provider,
            graph: RoleGraph::new(),
            force_reload: false,
            guest_role: None,
            role_match: mode.role_match(),
            unknown_role_policy: mode.unknown_role_policy(),
            assertion_timing: mode.assertion_timing(),
            assertions: AssertionRegistry::new(),
        }
    }

    /// Applies a whole options section.
    pub fn options(self, options: RbacOptions) -> Self {
        let builder = self.mode(options.mode).force_reload(options.force_reload);
        match options.guest_role {
            Some(role) => builder.guest_role(role),
            None => builder,
        }
    }

    /// Sets the role used for callers without an identity.
    pub fn guest_role(mut self, role: RoleName) -> Self {
        self.guest_role = Some(role);
        self
    }

    /// Invokes the loader on every check when enabled.
    pub fn force_reload(mut self, on: bool) -> Self {
        self.force_reload = on;
        self
    }

    /// Applies an evaluation preset, overriding the individual knobs.
    pub fn mode(mut self, mode: EvaluationMode) -> Self {
        self.role_match = mode.role_match();
        self.unknown_role_policy = mode.unknown_role_policy();
        self.assertion_timing = mode.assertion_timing();
        self
    }

    /// Sets how roles are combined.
    pub fn role_match(mut self, role_match: RoleMatch) -> Self {
        self.role_match = role_match;
        self
    }

    /// Sets how roles missing from the graph are handled.
    pub fn unknown_role_policy(mut self, policy: UnknownRolePolicy) -> Self {
        self.unknown_role_policy = policy;
        self
    }

    /// Sets when assertions run.
    pub fn assertion_timing(mut self, timing: AssertionTiming) -> Self {
        self.assertion_timing = timing;
        self
    }

    /// Seeds the graph. Loaded roles are merged on top, and
    /// [`AuthorizationService::reset`] returns to this graph.
    pub fn role_graph(mut self, graph: RoleGraph) -> Self {
        self.graph = graph;
        self
    }

    /// Registers a named assertion usable through [`AssertionRef::Named`].
    pub fn assertion(
        mut self,
        name: impl Into<String>,
        assertion: impl Assertion<P::Identity> + 'static,
    ) -> Self {
        self.assertions.register(name, assertion);
        self
    }

    /// Builds the service.
    pub fn build(self) -> AuthorizationService<L, P> {
        AuthorizationService {
            loader: self.loader,
            identity_provider: self.identity_provider,
            graph: RwLock::new(self.graph.clone()),
            seed: self.graph,
            session: Mutex::new(LoadSession {
                state: LoadState::Unloaded,
                placeholders: HashSet::new(),
            }),
            force_reload: AtomicBool::new(self.force_reload),
            guest_role: self.guest_role,
            role_match: self.role_match,
            unknown_role_policy: self.unknown_role_policy,
            assertion_timing: self.assertion_timing,
            assertions: self.assertions,
        }
    }
}

impl<L, P> AuthorizationService<L, P>
where
    L: RoleLoader,
    P: IdentityProvider,
{
    /// Returns whether the current caller is granted `permission`.
    ///
    /// Callers without roles are denied without touching the loader. The
    /// assertion, when given, can only turn a grant into a denial.
    pub async fn is_granted(
        &self,
        permission: &Permission,
        assertion: Option<AssertionRef<'_, P::Identity>>,
    ) -> Result<bool> {
        let identity = self.current_identity().await?;
        let roles = self.roles_of(identity.as_ref())?;
        if roles.is_empty() {
            debug!(%permission, "caller has no roles, denying");
            return Ok(false);
        }

        let request = LoadRequest::new(roles.clone(), Some(permission.clone()));
        self.ensure_loaded(request, identity.is_none()).await?;

        let assertion = assertion
            .as_ref()
            .map(|assertion| self.assertions.resolve(assertion))
            .transpose()?;

        if self.assertion_timing == AssertionTiming::Eager
            && let Some(assertion) = assertion
            && !assertion.assert(identity.as_ref())
        {
            debug!(%permission, "assertion rejected the caller");
            return Ok(false);
        }

        if !self.evaluate_roles(&roles, permission) {
            debug!(%permission, roles = roles.len(), "roles do not grant permission");
            return Ok(false);
        }

        if self.assertion_timing == AssertionTiming::Deferred
            && let Some(assertion) = assertion
            && !assertion.assert(identity.as_ref())
        {
            debug!(%permission, "assertion rejected the caller");
            return Ok(false);
        }

        debug!(%permission, "permission granted");
        Ok(true)
    }

    /// Returns whether the caller's roles overlap `roles`.
    ///
    /// Both sides are expanded with their descendants before intersecting, so
    /// holding a role satisfies any candidate on the same branch below it.
    pub async fn satisfy_identity_roles(&self, roles: &[RoleName]) -> Result<bool> {
        let identity = self.current_identity().await?;
        let identity_roles = self.roles_of(identity.as_ref())?;
        if identity_roles.is_empty() {
            return Ok(false);
        }

        let request = LoadRequest::new(identity_roles.clone(), None).with_candidates(roles.to_vec());
        self.ensure_loaded(request, identity.is_none()).await?;

        let graph = self.read_graph();
        let wanted: HashSet<RoleName> = graph.flatten_descendants(roles).into_iter().collect();
        let satisfied = graph
            .flatten_descendants(&identity_roles)
            .iter()
            .any(|held| wanted.contains(held));
        debug!(candidates = roles.len(), satisfied, "role satisfaction evaluated");
        Ok(satisfied)
    }

    /// Returns the caller's directly assigned roles, or the guest role for an
    /// anonymous caller.
    pub async fn identity_roles(&self) -> Result<Vec<RoleName>> {
        let identity = self.current_identity().await?;
        self.roles_of(identity.as_ref())
    }

    /// Returns the current load state.
    pub async fn load_state(&self) -> LoadState {
        self.session.lock().await.state
    }

    /// Drops loaded roles and returns to [`LoadState::Unloaded`].
    ///
    /// The graph goes back to the one the service was built with.
    pub async fn reset(&self) {
        let mut session = self.session.lock().await;
        *self.write_graph() = self.seed.clone();
        session.placeholders.clear();
        session.state = LoadState::Unloaded;
        debug!("role graph reset");
    }

    async fn current_identity(&self) -> Result<Option<P::Identity>> {
        self.identity_provider
            .identity()
            .await
            .map_err(Error::provider)
    }

    async fn ensure_loaded(&self, request: LoadRequest, guest_fallback: bool) -> Result<()> {
        let mut session = self.session.lock().await;
        let forced = self.force_reload();

        if session.state != LoadState::Loaded || forced {
            let set = self
                .loader
                .load_roles(&request)
                .await
                .map_err(Error::loader)?;

            let mut graph = self.write_graph();
            graph.apply_adopting(&set, &session.placeholders)?;
            session
                .placeholders
                .retain(|name| !set.contains(name.as_str()));
            info!(
                loaded = set.len(),
                total = graph.len(),
                forced,
                "role graph loaded"
            );
            session.state = LoadState::Loaded;
        }

        if guest_fallback
            && let Some(guest) = &self.guest_role
        {
            let mut graph = self.write_graph();
            if !graph.has_role(guest.as_str()) {
                graph.add_role(guest.clone(), None)?;
                session.placeholders.insert(guest.clone());
                debug!(role = %guest, "added guest role without permissions");
            }
        }
        Ok(())
    }

    fn evaluate_roles(&self, roles: &[RoleName], permission: &Permission) -> bool {
        let graph = self.read_graph();
        let mut evaluated = 0usize;

        for role in roles {
            let granted = match graph.is_granted(role.as_str(), permission) {
                Ok(granted) => granted,
                Err(error) => match self.unknown_role_policy {
                    UnknownRolePolicy::Skip => {
                        debug!(%error, "skipping role");
                        continue;
                    }
                    UnknownRolePolicy::Deny => {
                        debug!(%error, "unknown role denies the check");
                        return false;
                    }
                },
            };
            evaluated += 1;

            match self.role_match {
                RoleMatch::Any if granted => return true,
                RoleMatch::All if !granted => return false,
                _ => {}
            }
        }

        match self.role_match {
            RoleMatch::Any => false,
            RoleMatch::All => evaluated > 0,
        }
    }
}

impl<L, P: IdentityProvider> AuthorizationService<L, P> {
    /// Enables or disables loading on every check.
    pub fn set_force_reload(&self, on: bool) {
        self.force_reload.store(on, Ordering::Release);
    }

    /// Returns whether every check reloads the graph.
    pub fn force_reload(&self) -> bool {
        self.force_reload.load(Ordering::Acquire)
    }

    /// Returns the configured guest role.
    pub fn guest_role(&self) -> Option<&RoleName> {
        self.guest_role.as_ref()
    }

    /// Returns a snapshot of the role graph.
    ///
    /// Later loads do not show up in the returned graph.
    pub fn role_graph(&self) -> RoleGraph {
        self.read_graph().clone()
    }

    fn read_graph(&self) -> RwLockReadGuard<'_, RoleGraph> {
        self.graph.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_graph(&self) -> RwLockWriteGuard<'_, RoleGraph> {
        self.graph.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn roles_of(&self, identity: Option<&P::Identity>) -> Result<Vec<RoleName>> {
        let Some(identity) = identity else {
            return Ok(self.guest_role.iter().cloned().collect());
        };
        identity
            .roles()
            .into_iter()
            .map(|raw| {
                RoleName::new(&raw).map_err(|error| {
                    Error::InvalidIdentity(format!("identity role {raw:?} rejected: {error}"))
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LoaderError, ProviderError};
    use crate::loader::RoleSet;
    use async_trait::async_trait;
    use futures::executor::block_on;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    #[derive(Clone, Default)]
    struct TestLoader {
        set: RoleSet,
        fail: bool,
        calls: Arc<AtomicUsize>,
        requests: Arc<std::sync::Mutex<Vec<LoadRequest>>>,
    }

    impl TestLoader {
        fn new(set: RoleSet) -> Self {
            Self {
                set,
                ..Self::default()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RoleLoader for TestLoader {
        async fn load_roles(
            &self,
            request: &LoadRequest,
        ) -> std::result::Result<RoleSet, LoaderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request.clone());
            if self.fail {
                return Err("store unavailable".into());
            }
            Ok(self.set.clone())
        }
    }

    #[derive(Clone, Default)]
    struct TestProvider {
        roles: Option<Vec<String>>,
        fail: bool,
    }

    impl TestProvider {
        fn with_roles(roles: &[&str]) -> Self {
            Self {
                roles: Some(roles.iter().map(|r| r.to_string()).collect()),
                fail: false,
            }
        }

        fn anonymous() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl IdentityProvider for TestProvider {
        type Identity = Vec<String>;

        async fn identity(&self) -> std::result::Result<Option<Vec<String>>, ProviderError> {
            if self.fail {
                return Err("session expired".into());
            }
            Ok(self.roles.clone())
        }
    }

    fn role(value: &str) -> RoleName {
        RoleName::try_from(value).unwrap()
    }

    fn perm(value: &str) -> Permission {
        Permission::try_from(value).unwrap()
    }

    fn blog_roles() -> RoleSet {
        RoleSet::new()
            .grant(role("user"), perm("view"))
            .child_of(role("admin"), role("user"))
            .grant(role("admin"), perm("delete"))
            .child_of(role("editor"), role("user"))
            .grant(role("editor"), perm("publish"))
    }

    #[test]
    fn is_granted_should_allow_inherited_permission() {
        let loader = TestLoader::new(blog_roles());
        let service =
            AuthorizationServiceBuilder::new(loader, TestProvider::with_roles(&["admin"])).build();

        assert!(block_on(service.is_granted(&perm("view"), None)).unwrap());
        assert!(block_on(service.is_granted(&perm("delete"), None)).unwrap());
        assert!(!block_on(service.is_granted(&perm("publish"), None)).unwrap());
    }

    #[test]
    fn is_granted_should_deny_without_roles_and_skip_loading() {
        let loader = TestLoader::new(blog_roles());
        let anonymous =
            AuthorizationServiceBuilder::new(loader.clone(), TestProvider::anonymous()).build();
        let no_roles =
            AuthorizationServiceBuilder::new(loader.clone(), TestProvider::with_roles(&[])).build();

        assert!(!block_on(anonymous.is_granted(&perm("view"), None)).unwrap());
        assert!(!block_on(no_roles.is_granted(&perm("view"), None)).unwrap());
        assert_eq!(loader.calls(), 0);
        assert_eq!(block_on(anonymous.load_state()), LoadState::Unloaded);
    }

    #[test]
    fn lenient_mode_should_skip_unknown_roles() {
        let loader = TestLoader::new(blog_roles());
        let unknown_only =
            AuthorizationServiceBuilder::new(loader.clone(), TestProvider::with_roles(&["ghost"]))
                .build();
        let mixed = AuthorizationServiceBuilder::new(
            loader,
            TestProvider::with_roles(&["ghost", "editor"]),
        )
        .build();

        assert!(!block_on(unknown_only.is_granted(&perm("publish"), None)).unwrap());
        assert!(block_on(mixed.is_granted(&perm("publish"), None)).unwrap());
    }

    #[test]
    fn deny_policy_should_abort_on_unknown_role() {
        let service = AuthorizationServiceBuilder::new(
            TestLoader::new(blog_roles()),
            TestProvider::with_roles(&["ghost", "editor"]),
        )
        .unknown_role_policy(UnknownRolePolicy::Deny)
        .build();

        assert!(!block_on(service.is_granted(&perm("publish"), None)).unwrap());
    }

    #[test]
    fn all_match_should_require_every_role() {
        let both = AuthorizationServiceBuilder::new(
            TestLoader::new(blog_roles()),
            TestProvider::with_roles(&["admin", "editor"]),
        )
        .mode(EvaluationMode::Strict)
        .build();

        assert!(block_on(both.is_granted(&perm("view"), None)).unwrap());
        assert!(!block_on(both.is_granted(&perm("publish"), None)).unwrap());
    }

    #[test]
    fn all_match_with_skip_should_deny_when_nothing_evaluated() {
        let service = AuthorizationServiceBuilder::new(
            TestLoader::new(blog_roles()),
            TestProvider::with_roles(&["ghost"]),
        )
        .role_match(RoleMatch::All)
        .unknown_role_policy(UnknownRolePolicy::Skip)
        .build();

        assert!(!block_on(service.is_granted(&perm("view"), None)).unwrap());
    }

    #[test]
    fn loader_runs_once_without_force_reload() {
        let loader = TestLoader::new(blog_roles());
        let service =
            AuthorizationServiceBuilder::new(loader.clone(), TestProvider::with_roles(&["admin"]))
                .build();

        let first = block_on(service.is_granted(&perm("view"), None)).unwrap();
        let second = block_on(service.is_granted(&perm("view"), None)).unwrap();
        let third = block_on(service.is_granted(&perm("view"), None)).unwrap();

        assert!(first && second && third);
        assert_eq!(loader.calls(), 1);
        assert_eq!(block_on(service.load_state()), LoadState::Loaded);
    }

    #[test]
    fn force_reload_should_load_on_every_check() {
        let loader = TestLoader::new(blog_roles());
        let service =
            AuthorizationServiceBuilder::new(loader.clone(), TestProvider::with_roles(&["admin"]))
                .force_reload(true)
                .build();

        assert!(block_on(service.is_granted(&perm("view"), None)).unwrap());
        assert!(block_on(service.is_granted(&perm("view"), None)).unwrap());

        assert_eq!(loader.calls(), 2);
        assert_eq!(block_on(service.load_state()), LoadState::Loaded);
    }

    #[test]
    fn set_force_reload_should_toggle_at_runtime() {
        let loader = TestLoader::new(blog_roles());
        let service =
            AuthorizationServiceBuilder::new(loader.clone(), TestProvider::with_roles(&["user"]))
                .build();

        block_on(service.is_granted(&perm("view"), None)).unwrap();
        service.set_force_reload(true);
        assert!(service.force_reload());
        block_on(service.is_granted(&perm("view"), None)).unwrap();
        service.set_force_reload(false);
        block_on(service.is_granted(&perm("view"), None)).unwrap();

        assert_eq!(loader.calls(), 2);
    }

    #[test]
    fn loader_should_receive_roles_and_permission() {
        let loader = TestLoader::new(blog_roles());
        let service = AuthorizationServiceBuilder::new(
            loader.clone(),
            TestProvider::with_roles(&["editor", "user"]),
        )
        .build();

        block_on(service.is_granted(&perm("publish"), None)).unwrap();

        let requests = loader.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].roles(), &[role("editor"), role("user")]);
        assert_eq!(requests[0].permission(), Some(&perm("publish")));
    }

    #[test]
    fn guest_role_should_be_added_after_load() {
        let loader = TestLoader::new(blog_roles());
        let service = AuthorizationServiceBuilder::new(loader, TestProvider::anonymous())
            .guest_role(role("guest"))
            .build();

        assert_eq!(block_on(service.identity_roles()).unwrap(), vec![role("guest")]);
        assert!(!block_on(service.is_granted(&perm("view"), None)).unwrap());

        let graph = service.role_graph();
        let guest = graph.get_role("guest").unwrap();
        assert_eq!(guest.parent(), None);
        assert_eq!(guest.permissions().count(), 0);
    }

    #[test]
    fn guest_role_should_keep_loaded_permissions() {
        let loader = TestLoader::new(blog_roles().grant(role("guest"), perm("view")));
        let service = AuthorizationServiceBuilder::new(loader, TestProvider::anonymous())
            .guest_role(role("guest"))
            .build();

        assert!(block_on(service.is_granted(&perm("view"), None)).unwrap());
        assert!(!block_on(service.is_granted(&perm("delete"), None)).unwrap());
    }

    #[test]
    fn eager_assertion_should_veto_before_roles() {
        let calls = AtomicUsize::new(0);
        let reject = |_: Option<&Vec<String>>| {
            calls.fetch_add(1, Ordering::SeqCst);
            false
        };
        let service = AuthorizationServiceBuilder::new(
            TestLoader::new(blog_roles()),
            TestProvider::with_roles(&["user"]),
        )
        .build();

        let granted = block_on(service.is_granted(&perm("view"), Some((&reject).into()))).unwrap();
        let missing =
            block_on(service.is_granted(&perm("delete"), Some((&reject).into()))).unwrap();

        assert!(!granted);
        assert!(!missing);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn deferred_assertion_should_run_only_when_roles_grant() {
        let calls = AtomicUsize::new(0);
        let accept = |identity: Option<&Vec<String>>| {
            calls.fetch_add(1, Ordering::SeqCst);
            identity.is_some()
        };
        let service = AuthorizationServiceBuilder::new(
            TestLoader::new(blog_roles()),
            TestProvider::with_roles(&["user"]),
        )
        .assertion_timing(AssertionTiming::Deferred)
        .build();

        assert!(!block_on(service.is_granted(&perm("delete"), Some((&accept).into()))).unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(block_on(service.is_granted(&perm("view"), Some((&accept).into()))).unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn named_assertions_should_resolve_through_registry() {
        let service = AuthorizationServiceBuilder::new(
            TestLoader::new(blog_roles()),
            TestProvider::with_roles(&["admin"]),
        )
        .assertion("has_admin", |identity: Option<&Vec<String>>| {
            identity.is_some_and(|roles| roles.iter().any(|r| r == "admin"))
        })
        .build();

        let granted =
            block_on(service.is_granted(&perm("view"), Some(AssertionRef::named("has_admin"))))
                .unwrap();
        assert!(granted);

        let result =
            block_on(service.is_granted(&perm("view"), Some(AssertionRef::named("nope"))));
        assert!(matches!(result, Err(Error::InvalidAssertion(_))));
    }

    #[test]
    fn invalid_identity_role_should_surface() {
        let service = AuthorizationServiceBuilder::new(
            TestLoader::new(blog_roles()),
            TestProvider::with_roles(&["user", "not a role"]),
        )
        .build();

        let result = block_on(service.is_granted(&perm("view"), None));

        assert!(matches!(result, Err(Error::InvalidIdentity(_))));
    }

    #[test]
    fn provider_failure_should_surface() {
        let provider = TestProvider {
            roles: None,
            fail: true,
        };
        let service =
            AuthorizationServiceBuilder::new(TestLoader::new(blog_roles()), provider).build();

        let result = block_on(service.is_granted(&perm("view"), None));

        assert!(matches!(result, Err(Error::Provider(_))));
    }

    #[test]
    fn loader_failure_should_keep_service_unloaded() {
        let loader = TestLoader {
            fail: true,
            ..TestLoader::new(blog_roles())
        };
        let service =
            AuthorizationServiceBuilder::new(loader.clone(), TestProvider::with_roles(&["user"]))
                .build();

        let first = block_on(service.is_granted(&perm("view"), None));
        let second = block_on(service.is_granted(&perm("view"), None));

        assert!(matches!(first, Err(Error::Loader(_))));
        assert!(matches!(second, Err(Error::Loader(_))));
        assert_eq!(loader.calls(), 2);
        assert_eq!(block_on(service.load_state()), LoadState::Unloaded);
    }

    #[test]
    fn graph_integrity_errors_should_surface() {
        let cyclic = RoleSet::new()
            .child_of(role("a"), role("b"))
            .child_of(role("b"), role("a"));
        let service = AuthorizationServiceBuilder::new(
            TestLoader::new(cyclic),
            TestProvider::with_roles(&["a"]),
        )
        .build();

        let result = block_on(service.is_granted(&perm("view"), None));

        assert!(matches!(result, Err(Error::RoleCycleDetected { .. })));
        assert!(service.role_graph().is_empty());
    }

    #[test]
    fn satisfy_identity_roles_should_flatten_descendants() {
        let holds_user = AuthorizationServiceBuilder::new(
            TestLoader::new(blog_roles()),
            TestProvider::with_roles(&["user"]),
        )
        .build();
        let holds_admin = AuthorizationServiceBuilder::new(
            TestLoader::new(blog_roles()),
            TestProvider::with_roles(&["admin"]),
        )
        .build();

        assert!(block_on(holds_user.satisfy_identity_roles(&[role("admin")])).unwrap());
        assert!(block_on(holds_admin.satisfy_identity_roles(&[role("user")])).unwrap());
        assert!(!block_on(holds_admin.satisfy_identity_roles(&[role("editor")])).unwrap());
        assert!(!block_on(holds_admin.satisfy_identity_roles(&[])).unwrap());
    }

    #[test]
    fn satisfy_identity_roles_should_send_candidates_to_loader() {
        let loader = TestLoader::new(blog_roles());
        let service =
            AuthorizationServiceBuilder::new(loader.clone(), TestProvider::with_roles(&["user"]))
                .build();

        block_on(service.satisfy_identity_roles(&[role("editor")])).unwrap();

        let requests = loader.requests.lock().unwrap();
        assert_eq!(requests[0].roles(), &[role("user")]);
        assert_eq!(requests[0].candidates(), &[role("editor")]);
        assert_eq!(requests[0].permission(), None);
    }

    #[test]
    fn guest_role_should_not_be_added_for_signed_in_callers() {
        let service = AuthorizationServiceBuilder::new(
            TestLoader::new(blog_roles()),
            TestProvider::with_roles(&["admin"]),
        )
        .guest_role(role("guest"))
        .build();

        assert!(block_on(service.is_granted(&perm("view"), None)).unwrap());
        assert!(!service.role_graph().has_role("guest"));
    }

    #[test]
    fn role_graph_should_be_a_detached_snapshot() {
        let loader = TestLoader::new(blog_roles());
        let service =
            AuthorizationServiceBuilder::new(loader, TestProvider::with_roles(&["admin"])).build();

        let before = service.role_graph();
        block_on(service.is_granted(&perm("view"), None)).unwrap();

        assert!(before.is_empty());
        assert_eq!(service.role_graph().len(), 3);
    }

    #[test]
    fn satisfy_identity_roles_should_deny_anonymous_callers() {
        let loader = TestLoader::new(blog_roles());
        let service =
            AuthorizationServiceBuilder::new(loader.clone(), TestProvider::anonymous()).build();

        assert!(!block_on(service.satisfy_identity_roles(&[role("user")])).unwrap());
        assert_eq!(loader.calls(), 0);
    }

    #[test]
    fn reset_should_restore_seed_graph_and_reload() {
        let mut seed = RoleGraph::new();
        seed.add_role(role("user"), None).unwrap();
        let loader = TestLoader::new(blog_roles());
        let service =
            AuthorizationServiceBuilder::new(loader.clone(), TestProvider::with_roles(&["admin"]))
                .role_graph(seed)
                .build();

        assert!(block_on(service.is_granted(&perm("view"), None)).unwrap());
        assert_eq!(service.role_graph().len(), 3);

        block_on(service.reset());
        assert_eq!(block_on(service.load_state()), LoadState::Unloaded);
        assert_eq!(service.role_graph().len(), 1);

        assert!(block_on(service.is_granted(&perm("view"), None)).unwrap());
        assert_eq!(loader.calls(), 2);
    }

    #[test]
    fn options_should_configure_builder() {
        let options = RbacOptions {
            guest_role: Some(role("guest")),
            force_reload: true,
            mode: EvaluationMode::Strict,
        };
        let service = AuthorizationServiceBuilder::new(
            TestLoader::new(blog_roles()),
            TestProvider::anonymous(),
        )
        .options(options)
        .build();

        assert!(service.force_reload());
        assert_eq!(service.guest_role(), Some(&role("guest")));
        assert_eq!(service.role_match, RoleMatch::All);
        assert_eq!(service.unknown_role_policy, UnknownRolePolicy::Deny);
        assert_eq!(service.assertion_timing, AssertionTiming::Deferred);
    }
}
