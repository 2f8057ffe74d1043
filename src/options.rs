//! Service configuration.

use crate::types::RoleName;

/// How the caller's roles are combined into one decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RoleMatch {
    /// Granted when any role grants the permission.
    #[default]
    Any,
    /// Granted only when every evaluated role grants the permission.
    All,
}

/// What happens when a caller role is absent from the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum UnknownRolePolicy {
    /// The role is ignored and evaluation continues with the others.
    #[default]
    Skip,
    /// The whole check is denied.
    Deny,
}

/// When the assertion of a check runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum AssertionTiming {
    /// Before any role is evaluated; a rejection short-circuits the check.
    #[default]
    Eager,
    /// Only once the roles would grant the permission.
    Deferred,
}

/// Named evaluation presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum EvaluationMode {
    /// Union of roles, unknown roles skipped, assertion first.
    #[default]
    Lenient,
    /// Every role must grant, any unknown role denies, assertion last.
    Strict,
}

impl EvaluationMode {
    /// Role combination used by the preset.
    pub fn role_match(self) -> RoleMatch {
        match self {
            Self::Lenient => RoleMatch::Any,
            Self::Strict => RoleMatch::All,
        }
    }

    /// Unknown-role handling used by the preset.
    pub fn unknown_role_policy(self) -> UnknownRolePolicy {
        match self {
            Self::Lenient => UnknownRolePolicy::Skip,
            Self::Strict => UnknownRolePolicy::Deny,
        }
    }

    /// Assertion timing used by the preset.
    pub fn assertion_timing(self) -> AssertionTiming {
        match self {
            Self::Lenient => AssertionTiming::Eager,
            Self::Strict => AssertionTiming::Deferred,
        }
    }
}

/// Options of an [`AuthorizationService`](crate::AuthorizationService).
///
/// With the `serde` feature these deserialize from a config section; every
/// field is optional.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RbacOptions {
    /// Role used for callers without an identity.
    pub guest_role: Option<RoleName>,
    /// Invoke the loader on every check instead of once.
    pub force_reload: bool,
    /// Evaluation preset.
    pub mode: EvaluationMode,
}
