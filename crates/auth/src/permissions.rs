use std::collections::BTreeSet;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// An ordered set of permissions (order is only used for stable output).
pub type PermissionSet = BTreeSet<Permission>;

/// Permission identifier.
///
/// The catalog is closed: every permission the application checks is a
/// variant here. On the wire a permission is its `"<resource>:<action>"`
/// string (e.g. `"project:create"`, `"note:read:all"`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Permission {
    ProjectCreate,
    ProjectRead,
    ProjectUpdate,
    ProjectDelete,

    NoteCreate,
    NoteRead,
    /// Read every user's notes, not just one's own.
    NoteReadAll,
    NoteUpdate,
    NoteDelete,

    DiaryCreate,
    DiaryRead,
    DiaryReadAll,
    DiaryUpdate,
    DiaryDelete,

    TodoCreate,
    TodoRead,
    TodoReadAll,
    TodoUpdate,
    TodoDelete,

    ResourceCreate,
    ResourceRead,
    ResourceUpdate,
    ResourceDelete,

    UserCreate,
    UserRead,
    UserReadAll,
    UserUpdate,
    UserDelete,

    SettingsRead,
    SettingsUpdate,

    /// Inspect the role→permission table.
    RbacRead,
    /// Edit or reset the role→permission table.
    RbacUpdate,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown permission '{0}'")]
pub struct UnknownPermission(pub String);

impl Permission {
    /// The full catalog, in declaration order.
    pub const ALL: [Permission; 32] = [
        Self::ProjectCreate,
        Self::ProjectRead,
        Self::ProjectUpdate,
        Self::ProjectDelete,
        Self::NoteCreate,
        Self::NoteRead,
        Self::NoteReadAll,
        Self::NoteUpdate,
        Self::NoteDelete,
        Self::DiaryCreate,
        Self::DiaryRead,
        Self::DiaryReadAll,
        Self::DiaryUpdate,
        Self::DiaryDelete,
        Self::TodoCreate,
        Self::TodoRead,
        Self::TodoReadAll,
        Self::TodoUpdate,
        Self::TodoDelete,
        Self::ResourceCreate,
        Self::ResourceRead,
        Self::ResourceUpdate,
        Self::ResourceDelete,
        Self::UserCreate,
        Self::UserRead,
        Self::UserReadAll,
        Self::UserUpdate,
        Self::UserDelete,
        Self::SettingsRead,
        Self::SettingsUpdate,
        Self::RbacRead,
        Self::RbacUpdate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProjectCreate => "project:create",
            Self::ProjectRead => "project:read",
            Self::ProjectUpdate => "project:update",
            Self::ProjectDelete => "project:delete",
            Self::NoteCreate => "note:create",
            Self::NoteRead => "note:read",
            Self::NoteReadAll => "note:read:all",
            Self::NoteUpdate => "note:update",
            Self::NoteDelete => "note:delete",
            Self::DiaryCreate => "diary:create",
            Self::DiaryRead => "diary:read",
            Self::DiaryReadAll => "diary:read:all",
            Self::DiaryUpdate => "diary:update",
            Self::DiaryDelete => "diary:delete",
            Self::TodoCreate => "todo:create",
            Self::TodoRead => "todo:read",
            Self::TodoReadAll => "todo:read:all",
            Self::TodoUpdate => "todo:update",
            Self::TodoDelete => "todo:delete",
            Self::ResourceCreate => "resource:create",
            Self::ResourceRead => "resource:read",
            Self::ResourceUpdate => "resource:update",
            Self::ResourceDelete => "resource:delete",
            Self::UserCreate => "user:create",
            Self::UserRead => "user:read",
            Self::UserReadAll => "user:read:all",
            Self::UserUpdate => "user:update",
            Self::UserDelete => "user:delete",
            Self::SettingsRead => "settings:read",
            Self::SettingsUpdate => "settings:update",
            Self::RbacRead => "rbac:read",
            Self::RbacUpdate => "rbac:update",
        }
    }

    /// Resource kind this permission applies to (`"note"` for `note:read:all`).
    pub fn resource(&self) -> &'static str {
        let s = self.as_str();
        match s.split_once(':') {
            Some((resource, _)) => resource,
            None => s,
        }
    }

    /// Action part of the permission (`"read:all"` for `note:read:all`).
    pub fn action(&self) -> &'static str {
        let s = self.as_str();
        match s.split_once(':') {
            Some((_, action)) => action,
            None => s,
        }
    }

    /// Human-readable description for the admin catalog.
    pub fn description(&self) -> String {
        let resource = self.resource();
        match self.action() {
            "create" => format!("Create {resource} records"),
            "read" => format!("View own {resource} records"),
            "read:all" => format!("View every user's {resource} records"),
            "update" => format!("Edit {resource} records"),
            "delete" => format!("Delete {resource} records"),
            other => format!("{other} {resource}"),
        }
    }
}

impl FromStr for Permission {
    type Err = UnknownPermission;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownPermission(s.to_string()))
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Permission {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Permission {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
