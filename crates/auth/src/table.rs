//! The role→permission table: the whole state of the authorization system.

use std::collections::BTreeMap;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::{AuthzError, Permission, PermissionSet, Role};

/// Total mapping from every [`Role`] to its [`PermissionSet`].
///
/// There is no way to build a table with a role missing: construction goes
/// through [`RolePermissionTable::defaults`] or validated parsing, and
/// [`RolePermissionTable::set`] only replaces entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolePermissionTable {
    entries: BTreeMap<Role, PermissionSet>,
}

impl RolePermissionTable {
    /// The compiled-in defaults (startup seed and reset target).
    pub fn defaults() -> Self {
        Self {
            entries: Role::ALL
                .into_iter()
                .map(|role| (role, role.default_permissions()))
                .collect(),
        }
    }

    /// Every role present, every set empty.
    pub fn empty() -> Self {
        Self {
            entries: Role::ALL.into_iter().map(|r| (r, PermissionSet::new())).collect(),
        }
    }

    /// Build a table from explicit entries.
    ///
    /// Roles absent from `entries` get an empty set, so the result is always total.
    pub fn from_entries(entries: impl IntoIterator<Item = (Role, PermissionSet)>) -> Self {
        let mut table = Self::empty();
        for (role, perms) in entries {
            table.set(role, perms);
        }
        table
    }

    pub fn get(&self, role: Role) -> &PermissionSet {
        // Every role is inserted at construction and never removed.
        static EMPTY: PermissionSet = PermissionSet::new();
        self.entries.get(&role).unwrap_or(&EMPTY)
    }

    pub fn set(&mut self, role: Role, permissions: PermissionSet) {
        self.entries.insert(role, permissions);
    }

    pub fn contains(&self, role: Role, permission: Permission) -> bool {
        self.get(role).contains(&permission)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Role, &PermissionSet)> {
        self.entries.iter().map(|(r, p)| (*r, p))
    }

    /// Roles whose current set contains `permission`.
    pub fn roles_granting(&self, permission: Permission) -> Vec<Role> {
        self.iter()
            .filter(|(_, perms)| perms.contains(&permission))
            .map(|(role, _)| role)
            .collect()
    }

    /// Parse and validate an untyped table (`{ "<role>": ["<permission>", ...] }`).
    ///
    /// Fails with [`AuthzError::Validation`] naming the first offending role or
    /// permission when the payload is not an object, names an unknown role,
    /// omits a role, or carries a malformed or unknown permission.
    pub fn from_json(value: &Value) -> Result<Self, AuthzError> {
        let Some(object) = value.as_object() else {
            return Err(AuthzError::validation(
                "permission table must be an object mapping each role to a list of permissions",
            ));
        };

        if let Some(unknown) = object.keys().find(|k| k.parse::<Role>().is_err()) {
            return Err(AuthzError::validation(format!("unknown role '{unknown}'")));
        }

        let mut entries = BTreeMap::new();
        for role in Role::ALL {
            let raw = object.get(role.as_str()).ok_or_else(|| {
                AuthzError::validation(format!("missing permission entry for role '{role}'"))
            })?;
            entries.insert(role, parse_permission_list(role, raw)?);
        }

        Ok(Self { entries })
    }
}

impl Default for RolePermissionTable {
    fn default() -> Self {
        Self::defaults()
    }
}

impl Serialize for RolePermissionTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (role, perms) in &self.entries {
            map.serialize_entry(role.as_str(), perms)?;
        }
        map.end()
    }
}

/// Parse one role's permission list from untyped input.
///
/// Accepts a JSON array of permission strings; duplicates collapse.
pub fn parse_permission_list(role: Role, value: &Value) -> Result<PermissionSet, AuthzError> {
    let Some(items) = value.as_array() else {
        return Err(AuthzError::validation(format!(
            "permissions for role '{role}' must be a list of strings"
        )));
    };

    let mut perms = PermissionSet::new();
    for item in items {
        let Some(name) = item.as_str() else {
            return Err(AuthzError::validation(format!(
                "permissions for role '{role}' must be strings, found {item}"
            )));
        };
        let perm = name.parse::<Permission>().map_err(|_| {
            AuthzError::validation(format!("unknown permission '{name}' for role '{role}'"))
        })?;
        perms.insert(perm);
    }

    Ok(perms)
}
