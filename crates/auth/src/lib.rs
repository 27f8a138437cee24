//! `folio-auth` — role-based access control for Folio (no HTTP, no storage engine).
//!
//! - [`Permission`] / [`Role`]: the closed catalogs
//! - [`RolePermissionTable`]: the role→permission mapping
//! - [`PermissionStore`]: live, shared, mutable table
//! - [`Authorizer`]: request-time policy checks against the store
//! - [`RbacAdmin`]: validated administration of the store

pub mod admin;
pub mod authorize;
pub mod claims;
pub mod permissions;
pub mod principal;
pub mod roles;
pub mod store;
pub mod table;

pub use admin::{Catalog, RbacAdmin};
pub use authorize::{satisfies, Authorizer, AuthzError, Denial, Explanation, Match, Requirement};
pub use claims::{encode_hs256, validate_claims, Hs256JwtValidator, JwtClaims, JwtValidator, TokenValidationError};
pub use permissions::{Permission, PermissionSet, UnknownPermission};
pub use principal::{Principal, PrincipalId};
pub use roles::Role;
pub use store::{FilePermissionStore, InMemoryPermissionStore, PermissionStore, PersistError};
pub use table::RolePermissionTable;
