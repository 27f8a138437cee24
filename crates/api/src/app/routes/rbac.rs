//! RBAC administration endpoints.
//!
//! Every route here is gated by the admin role, enforced by the same
//! authorization layer these endpoints configure. The gate is role-based, so
//! editing the admin role's permissions can never lock admins out of this surface.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Extension, Path, Query,
    },
    http::{HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;

use folio_auth::{AuthzError, Authorizer, Permission, RbacAdmin, Role};

use crate::app::errors;
use crate::authz::Guard;
use crate::context::PrincipalContext;

/// Set to `false` on mutation responses whose edit could not be written to disk.
pub const PERSISTED_HEADER: &str = "x-rbac-persisted";

// ─────────────────────────────────────────────────────────────────────────────
// Query Parameters
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ExplainQuery {
    pub role: String,
    pub permission: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

pub fn router(authorizer: &Authorizer) -> Router {
    let routes = Router::new()
        .route("/permissions", get(get_table).put(replace_table))
        .route("/permissions/reset", post(reset_table))
        .route("/permissions/:role", get(get_role).put(replace_role))
        .route("/catalog", get(catalog))
        .route("/explain", get(explain));

    Guard::role(authorizer, [Role::Admin]).apply(routes)
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// GET /admin/rbac/permissions - Current role→permission table
pub async fn get_table(Extension(admin): Extension<RbacAdmin>) -> axum::response::Response {
    (StatusCode::OK, Json(admin.get_all())).into_response()
}

/// PUT /admin/rbac/permissions - Replace the whole table
pub async fn replace_table(
    Extension(admin): Extension<RbacAdmin>,
    Extension(ctx): Extension<PrincipalContext>,
    body: Result<Json<Value>, JsonRejection>,
) -> axum::response::Response {
    let body = match json_body(body) {
        Ok(body) => body,
        Err(e) => return errors::authz_error_to_response(e),
    };

    let result = tracing::info_span!("rbac_admin", actor = %actor(&ctx))
        .in_scope(|| admin.replace_all(&body));

    match result {
        Ok(table) => mutation_response(&admin, Json(table)),
        Err(e) => errors::authz_error_to_response(e),
    }
}

/// GET /admin/rbac/permissions/:role - One role's current permissions
pub async fn get_role(
    Extension(admin): Extension<RbacAdmin>,
    Path(role): Path<String>,
) -> axum::response::Response {
    match admin.get_for_role(&role) {
        Ok(permissions) => (
            StatusCode::OK,
            Json(serde_json::json!({ "role": role, "permissions": permissions })),
        )
            .into_response(),
        Err(e) => errors::authz_error_to_response(e),
    }
}

/// PUT /admin/rbac/permissions/:role - Replace one role's permissions
///
/// Body is either `{"permissions": [...]}` or a bare list.
pub async fn replace_role(
    Extension(admin): Extension<RbacAdmin>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(role): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> axum::response::Response {
    let body = match json_body(body) {
        Ok(body) => body,
        Err(e) => return errors::authz_error_to_response(e),
    };

    let list = match &body {
        Value::Object(fields) => fields.get("permissions").unwrap_or(&Value::Null),
        other => other,
    };

    let result = tracing::info_span!("rbac_admin", actor = %actor(&ctx))
        .in_scope(|| admin.replace_for_role(&role, list));

    match result {
        Ok(permissions) => mutation_response(
            &admin,
            Json(serde_json::json!({ "role": role, "permissions": permissions })),
        ),
        Err(e) => errors::authz_error_to_response(e),
    }
}

/// POST /admin/rbac/permissions/reset - Restore the compiled-in defaults
pub async fn reset_table(
    Extension(admin): Extension<RbacAdmin>,
    Extension(ctx): Extension<PrincipalContext>,
) -> axum::response::Response {
    let table = tracing::info_span!("rbac_admin", actor = %actor(&ctx))
        .in_scope(|| admin.reset_to_defaults());

    mutation_response(&admin, Json(table))
}

/// GET /admin/rbac/catalog - Every role and permission the system knows
pub async fn catalog(Extension(admin): Extension<RbacAdmin>) -> axum::response::Response {
    (StatusCode::OK, Json(admin.catalog())).into_response()
}

/// GET /admin/rbac/explain?role=X&permission=Y - Why a role can/cannot use a permission
pub async fn explain(
    Extension(authorizer): Extension<Authorizer>,
    query: Result<Query<ExplainQuery>, QueryRejection>,
) -> axum::response::Response {
    let query = match query {
        Ok(Query(query)) => query,
        Err(rejection) => {
            return errors::authz_error_to_response(AuthzError::validation(rejection.body_text()))
        }
    };
    let role: Role = match query.role.parse() {
        Ok(r) => r,
        Err(e) => return errors::authz_error_to_response(e),
    };
    let permission: Permission = match query.permission.parse() {
        Ok(p) => p,
        Err(e) => return errors::authz_error_to_response(AuthzError::validation(e.to_string())),
    };

    let explanation = authorizer.explain(role, permission);
    (StatusCode::OK, Json(serde_json::json!({ "explanation": explanation }))).into_response()
}

/// Unparseable or non-JSON admin input is a validation failure like any other.
fn json_body(body: Result<Json<Value>, JsonRejection>) -> Result<Value, AuthzError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| AuthzError::validation(rejection.body_text()))
}

/// 200 with the new state. When the table is file-backed and the last write
/// did not reach disk, the edit is live but not durable: flagged by header.
fn mutation_response(admin: &RbacAdmin, body: impl IntoResponse) -> axum::response::Response {
    let mut response = (StatusCode::OK, body).into_response();
    if !admin.persisted() {
        response
            .headers_mut()
            .insert(PERSISTED_HEADER, HeaderValue::from_static("false"));
    }
    response
}

fn actor(ctx: &PrincipalContext) -> String {
    ctx.principal()
        .map(|p| p.id.to_string())
        .unwrap_or_else(|| "anonymous".to_string())
}
