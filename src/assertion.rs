//! Runtime assertions that can veto an otherwise granted permission.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Predicate over the caller identity, evaluated on top of the role graph.
///
/// Closures `Fn(Option<&I>) -> bool` implement this trait. The identity is
/// `None` for anonymous callers.
pub trait Assertion<I>: Send + Sync {
    /// Returns `false` to deny access.
    fn assert(&self, identity: Option<&I>) -> bool;
}

impl<I, F> Assertion<I> for F
where
    F: Fn(Option<&I>) -> bool + Send + Sync,
{
    fn assert(&self, identity: Option<&I>) -> bool {
        self(identity)
    }
}

/// Assertion argument of a permission check.
pub enum AssertionRef<'a, I> {
    /// Assertion passed directly by the caller.
    Inline(&'a dyn Assertion<I>),
    /// Assertion looked up by name in the service's [`AssertionRegistry`].
    Named(String),
}

impl<'a, I> AssertionRef<'a, I> {
    /// References a registered assertion by name.
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }
}

impl<'a, I, A> From<&'a A> for AssertionRef<'a, I>
where
    A: Assertion<I> + 'a,
{
    fn from(assertion: &'a A) -> Self {
        Self::Inline(assertion)
    }
}

impl<I> fmt::Debug for AssertionRef<'_, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inline(_) => f.write_str("Inline(..)"),
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
        }
    }
}

/// Named assertions shared by every check of a service.
pub struct AssertionRegistry<I> {
    assertions: HashMap<String, Arc<dyn Assertion<I>>>,
}

impl<I> AssertionRegistry<I> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            assertions: HashMap::new(),
        }
    }

    /// Registers an assertion, replacing any previous one with the same name.
    pub fn register(&mut self, name: impl Into<String>, assertion: impl Assertion<I> + 'static) {
        self.assertions.insert(name.into(), Arc::new(assertion));
    }

    /// Returns whether a name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.assertions.contains_key(name)
    }

    /// Number of registered assertions.
    pub fn len(&self) -> usize {
        self.assertions.len()
    }

    /// Returns whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.assertions.is_empty()
    }

    /// Resolves an assertion argument to a predicate.
    pub(crate) fn resolve<'r>(
        &'r self,
        assertion: &'r AssertionRef<'r, I>,
    ) -> Result<&'r dyn Assertion<I>> {
        match assertion {
            AssertionRef::Inline(inline) => Ok(*inline),
            AssertionRef::Named(name) => self
                .assertions
                .get(name)
                .map(|registered| &**registered)
                .ok_or_else(|| {
                    Error::InvalidAssertion(format!("no assertion registered as {name:?}"))
                }),
        }
    }
}

impl<I> Default for AssertionRegistry<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I> Clone for AssertionRegistry<I> {
    fn clone(&self) -> Self {
        Self {
            assertions: self.assertions.clone(),
        }
    }
}

impl<I> fmt::Debug for AssertionRegistry<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.assertions.keys().collect();
        names.sort();
        f.debug_struct("AssertionRegistry")
            .field("names", &names)
            .finish()
    }
}
