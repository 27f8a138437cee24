use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{AuthzError, Permission, PermissionSet};

/// Role identifier used for RBAC.
///
/// Closed set: every principal carries exactly one of these. What each role
/// may *currently* do lives in the permission store; [`Role::default_permissions`]
/// is only the compiled-in seed and reset target.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    Admin,
    User,
    Guest,
}

impl Role {
    pub const ALL: [Role; 3] = [Self::Admin, Self::User, Self::Guest];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
            Self::Guest => "guest",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Admin => "Full administrator with every permission",
            Self::User => "Standard user managing their own content",
            Self::Guest => "Read-only visitor",
        }
    }

    /// Compiled-in default permission set for this role.
    pub fn default_permissions(&self) -> PermissionSet {
        use Permission::*;

        match self {
            Self::Admin => Permission::ALL.into_iter().collect(),
            Self::User => [
                // Projects
                ProjectCreate,
                ProjectRead,
                ProjectUpdate,
                ProjectDelete,
                // Own notes, diary, todos
                NoteCreate,
                NoteRead,
                NoteUpdate,
                NoteDelete,
                DiaryCreate,
                DiaryRead,
                DiaryUpdate,
                DiaryDelete,
                TodoCreate,
                TodoRead,
                TodoUpdate,
                TodoDelete,
                // Resources
                ResourceCreate,
                ResourceRead,
                ResourceUpdate,
                ResourceDelete,
                // Own profile and settings
                UserRead,
                UserUpdate,
                SettingsRead,
                SettingsUpdate,
            ]
            .into_iter()
            .collect(),
            Self::Guest => [ProjectRead, NoteRead, ResourceRead, UserRead, SettingsRead]
                .into_iter()
                .collect(),
        }
    }
}

impl FromStr for Role {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| AuthzError::InvalidRole(s.to_string()))
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
