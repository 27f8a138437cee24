//! Administration interface over the permission store.
//!
//! Takes untyped input (path strings, JSON bodies), validates it completely,
//! and only then touches the store. Callers are expected to gate this behind
//! an admin role check; this layer does no authorization of its own.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::table::parse_permission_list;
use crate::{AuthzError, Permission, PermissionSet, PermissionStore, Role, RolePermissionTable};

#[derive(Clone)]
pub struct RbacAdmin {
    store: Arc<dyn PermissionStore>,
}

impl RbacAdmin {
    pub fn new(store: Arc<dyn PermissionStore>) -> Self {
        Self { store }
    }

    pub fn get_all(&self) -> RolePermissionTable {
        self.store.get_all()
    }

    pub fn get_for_role(&self, role: &str) -> Result<PermissionSet, AuthzError> {
        let role: Role = role.parse()?;
        Ok(self.store.get_for_role(role))
    }

    /// Replace the whole table from a `{ "<role>": [...] }` payload.
    pub fn replace_all(&self, payload: &Value) -> Result<RolePermissionTable, AuthzError> {
        let table = RolePermissionTable::from_json(payload).inspect_err(|e| {
            tracing::warn!(error = %e, "rejected role permission table");
        })?;

        self.store.replace_all(table.clone());
        tracing::info!(
            admin = table.get(Role::Admin).len(),
            user = table.get(Role::User).len(),
            guest = table.get(Role::Guest).len(),
            "replaced role permission table"
        );
        Ok(table)
    }

    /// Replace one role's set from a JSON list of permission names.
    pub fn replace_for_role(&self, role: &str, payload: &Value) -> Result<PermissionSet, AuthzError> {
        let role: Role = role.parse()?;
        let perms = parse_permission_list(role, payload).inspect_err(|e| {
            tracing::warn!(%role, error = %e, "rejected role permissions");
        })?;

        self.store.replace_for_role(role, perms.clone());
        tracing::info!(%role, count = perms.len(), "replaced role permissions");
        Ok(perms)
    }

    pub fn reset_to_defaults(&self) -> RolePermissionTable {
        let table = self.store.reset_to_defaults();
        tracing::info!("reset role permission table to defaults");
        table
    }

    /// `false` when the latest edit is live but could not be made durable.
    pub fn persisted(&self) -> bool {
        self.store.persisted()
    }

    pub fn catalog(&self) -> Catalog {
        Catalog {
            roles: Role::ALL
                .into_iter()
                .map(|role| RoleDefinition {
                    name: role,
                    description: role.description(),
                    default_permissions: role.default_permissions(),
                })
                .collect(),
            permissions: Permission::ALL
                .into_iter()
                .map(|permission| PermissionDefinition {
                    name: permission,
                    resource: permission.resource(),
                    action: permission.action(),
                    description: permission.description(),
                })
                .collect(),
        }
    }
}

/// Everything an admin UI needs to render the permission editor.
#[derive(Debug, Clone, Serialize)]
pub struct Catalog {
    pub roles: Vec<RoleDefinition>,
    pub permissions: Vec<PermissionDefinition>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoleDefinition {
    pub name: Role,
    pub description: &'static str,
    pub default_permissions: PermissionSet,
}

#[derive(Debug, Clone, Serialize)]
pub struct PermissionDefinition {
    pub name: Permission,
    pub resource: &'static str,
    pub action: &'static str,
    pub description: String,
}
