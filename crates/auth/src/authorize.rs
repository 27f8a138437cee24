use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::{Permission, PermissionSet, PermissionStore, Principal, Role};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    /// No principal could be resolved for the request.
    #[error("unauthenticated")]
    Unauthenticated,

    /// Principal resolved, but its role or permissions are insufficient.
    #[error("forbidden: {0}")]
    Forbidden(Denial),

    /// A role name outside the closed set was referenced.
    #[error("invalid role '{0}'")]
    InvalidRole(String),

    /// Malformed administrator input; nothing was applied.
    #[error("validation failed: {0}")]
    Validation(String),
}

impl AuthzError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

/// Diagnostic context attached to a [`AuthzError::Forbidden`].
///
/// Names what was required and the caller's role, never the caller's full
/// permission set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Denial {
    Role { allowed: Vec<Role>, actual: Role },
    Permissions { mode: Match, required: Vec<Permission>, role: Role },
}

impl core::fmt::Display for Denial {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Role { allowed, actual } => {
                write!(f, "role '{actual}' is not one of {}", join(allowed))
            }
            Self::Permissions { mode, required, role } => write!(
                f,
                "role '{role}' lacks {} of {}",
                match mode {
                    Match::All => "all",
                    Match::Any => "any",
                },
                join(required)
            ),
        }
    }
}

fn join<T: core::fmt::Display>(items: &[T]) -> String {
    let names: Vec<String> = items.iter().map(|i| i.to_string()).collect();
    format!("[{}]", names.join(", "))
}

/// How a permission list is combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Match {
    /// Logical AND; an empty list is vacuously satisfied.
    All,
    /// Logical OR.
    Any,
}

/// What a route demands of its caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    AnyRole(Vec<Role>),
    AllPermissions(Vec<Permission>),
    AnyPermission(Vec<Permission>),
}

/// Pure policy decision: does `granted` satisfy `required` under `mode`?
///
/// - No IO
/// - No panics
pub fn satisfies(granted: &PermissionSet, required: &[Permission], mode: Match) -> bool {
    match mode {
        Match::All => required.iter().all(|p| granted.contains(p)),
        Match::Any => required.iter().any(|p| granted.contains(p)),
    }
}

/// Request-time gate backed by the live permission store.
///
/// The store is read on every check, so an administrator's edit applies to
/// the very next request.
#[derive(Clone)]
pub struct Authorizer {
    store: Arc<dyn PermissionStore>,
}

impl Authorizer {
    pub fn new(store: Arc<dyn PermissionStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn PermissionStore> {
        &self.store
    }

    /// Allow iff the principal's role is one of `allowed`.
    pub fn require_role(
        &self,
        principal: Option<&Principal>,
        allowed: &[Role],
    ) -> Result<(), AuthzError> {
        let principal = principal.ok_or(AuthzError::Unauthenticated)?;
        if allowed.contains(&principal.role) {
            Ok(())
        } else {
            Err(AuthzError::Forbidden(Denial::Role {
                allowed: allowed.to_vec(),
                actual: principal.role,
            }))
        }
    }

    /// Allow iff the principal's role currently holds every permission in `required`.
    pub fn require_all_permissions(
        &self,
        principal: Option<&Principal>,
        required: &[Permission],
    ) -> Result<(), AuthzError> {
        self.require_permissions(principal, required, Match::All)
    }

    /// Allow iff the principal's role currently holds at least one of `required`.
    pub fn require_any_permission(
        &self,
        principal: Option<&Principal>,
        required: &[Permission],
    ) -> Result<(), AuthzError> {
        self.require_permissions(principal, required, Match::Any)
    }

    pub fn enforce(
        &self,
        principal: Option<&Principal>,
        requirement: &Requirement,
    ) -> Result<(), AuthzError> {
        match requirement {
            Requirement::AnyRole(roles) => self.require_role(principal, roles),
            Requirement::AllPermissions(perms) => self.require_all_permissions(principal, perms),
            Requirement::AnyPermission(perms) => self.require_any_permission(principal, perms),
        }
    }

    fn require_permissions(
        &self,
        principal: Option<&Principal>,
        required: &[Permission],
        mode: Match,
    ) -> Result<(), AuthzError> {
        let principal = principal.ok_or(AuthzError::Unauthenticated)?;
        let snapshot = self.store.snapshot();

        if satisfies(snapshot.get(principal.role), required, mode) {
            Ok(())
        } else {
            Err(AuthzError::Forbidden(Denial::Permissions {
                mode,
                required: required.to_vec(),
                role: principal.role,
            }))
        }
    }

    /// Explain whether `role` currently holds `permission`.
    pub fn explain(&self, role: Role, permission: Permission) -> Explanation {
        let snapshot = self.store.snapshot();
        let granted = snapshot.contains(role, permission);
        let granting_roles = snapshot.roles_granting(permission);

        let reason = if granted {
            format!("role '{role}' currently holds '{permission}'")
        } else if granting_roles.is_empty() {
            format!("no role currently holds '{permission}'")
        } else {
            format!(
                "role '{role}' does not hold '{permission}'; it is granted to {}",
                join(&granting_roles)
            )
        };

        Explanation {
            role,
            permission,
            granted,
            reason,
            granting_roles,
            default_grants: role.default_permissions().contains(&permission),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization Explanation
// ─────────────────────────────────────────────────────────────────────────────

/// Why a role can or cannot use a permission right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Explanation {
    pub role: Role,
    pub permission: Permission,
    pub granted: bool,
    pub reason: String,

    /// Roles whose current set contains the permission.
    pub granting_roles: Vec<Role>,

    /// Whether the compiled-in defaults grant it (i.e. a reset would restore it).
    pub default_grants: bool,
}
