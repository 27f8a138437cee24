//! Route-level authorization guards.
//!
//! A [`Guard`] pairs the live [`Authorizer`] with what a group of routes
//! requires, and is applied as a route layer:
//!
//! ```ignore
//! let notes = Router::new()
//!     .route("/notes", post(create_note));
//! let notes = Guard::all_permissions(&authorizer, [Permission::NoteCreate]).apply(notes);
//! ```
//!
//! Denials are routine traffic: they are logged at `debug`, never as errors.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
    Router,
};

use folio_auth::{Authorizer, Permission, Requirement, Role};

use crate::app::errors;
use crate::context::PrincipalContext;

#[derive(Clone)]
pub struct Guard {
    authorizer: Authorizer,
    requirement: Arc<Requirement>,
}

impl Guard {
    pub fn new(authorizer: &Authorizer, requirement: Requirement) -> Self {
        Self {
            authorizer: authorizer.clone(),
            requirement: Arc::new(requirement),
        }
    }

    /// Caller's role must be one of `roles`.
    pub fn role(authorizer: &Authorizer, roles: impl IntoIterator<Item = Role>) -> Self {
        Self::new(authorizer, Requirement::AnyRole(roles.into_iter().collect()))
    }

    /// Any authenticated caller.
    pub fn authenticated(authorizer: &Authorizer) -> Self {
        Self::role(authorizer, Role::ALL)
    }

    /// Caller's role must currently hold every permission listed.
    pub fn all_permissions(
        authorizer: &Authorizer,
        permissions: impl IntoIterator<Item = Permission>,
    ) -> Self {
        Self::new(
            authorizer,
            Requirement::AllPermissions(permissions.into_iter().collect()),
        )
    }

    /// Caller's role must currently hold at least one permission listed.
    pub fn any_permission(
        authorizer: &Authorizer,
        permissions: impl IntoIterator<Item = Permission>,
    ) -> Self {
        Self::new(
            authorizer,
            Requirement::AnyPermission(permissions.into_iter().collect()),
        )
    }

    /// Wrap every route currently in `router` with this guard.
    pub fn apply(self, router: Router) -> Router {
        router.route_layer(axum::middleware::from_fn_with_state(self, enforce))
    }
}

/// Middleware body: allow or reject before the handler runs.
pub async fn enforce(State(guard): State<Guard>, req: Request, next: Next) -> Response {
    let principal = req
        .extensions()
        .get::<PrincipalContext>()
        .and_then(|ctx| ctx.principal().copied());

    match guard.authorizer.enforce(principal.as_ref(), &guard.requirement) {
        Ok(()) => next.run(req).await,
        Err(e) => {
            tracing::debug!(
                principal = ?principal.map(|p| p.id),
                method = %req.method(),
                path = %req.uri().path(),
                error = %e,
                "request denied"
            );
            errors::authz_error_to_response(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, routing::get, Extension};
    use folio_auth::{
        InMemoryPermissionStore, PermissionSet, PermissionStore, Principal, PrincipalId,
    };
    use tower::ServiceExt;

    async fn ok() -> &'static str {
        "ok"
    }

    fn router(guard: Guard, principal: Option<Role>) -> Router {
        let ctx = PrincipalContext::new(principal.map(|r| Principal::new(PrincipalId::new(), r)));
        guard
            .apply(Router::new().route("/", get(ok)))
            .layer(Extension(ctx))
    }

    async fn status(router: Router) -> StatusCode {
        router
            .oneshot(axum::http::Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    fn authorizer() -> (Arc<InMemoryPermissionStore>, Authorizer) {
        let store = Arc::new(InMemoryPermissionStore::new());
        (store.clone(), Authorizer::new(store))
    }

    #[tokio::test]
    async fn anonymous_is_401() {
        let (_, authz) = authorizer();
        assert_eq!(
            status(router(Guard::authenticated(&authz), None)).await,
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn missing_context_fails_closed() {
        let (_, authz) = authorizer();
        let app = Guard::all_permissions(&authz, Vec::new())
            .apply(Router::new().route("/", get(ok)));
        assert_eq!(status(app).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn role_guard() {
        let (_, authz) = authorizer();
        assert_eq!(
            status(router(Guard::role(&authz, [Role::Admin]), Some(Role::Admin))).await,
            StatusCode::OK
        );
        assert_eq!(
            status(router(Guard::role(&authz, [Role::Admin]), Some(Role::User))).await,
            StatusCode::FORBIDDEN
        );
    }

    #[tokio::test]
    async fn permission_guards_follow_live_table() {
        let (store, authz) = authorizer();
        let create = || {
            router(
                Guard::all_permissions(&authz, [Permission::ProjectCreate]),
                Some(Role::User),
            )
        };
        let read_or_create = || {
            router(
                Guard::any_permission(&authz, [Permission::ProjectRead, Permission::ProjectCreate]),
                Some(Role::User),
            )
        };

        assert_eq!(status(create()).await, StatusCode::OK);

        store.replace_for_role(Role::User, PermissionSet::from([Permission::ProjectRead]));
        assert_eq!(status(create()).await, StatusCode::FORBIDDEN);
        assert_eq!(status(read_or_create()).await, StatusCode::OK);

        store.replace_for_role(Role::User, PermissionSet::new());
        assert_eq!(status(read_or_create()).await, StatusCode::FORBIDDEN);
    }
}
