use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

use folio_auth::{AuthzError, Authorizer, PermissionStore};

use crate::app::errors;
use crate::context::PrincipalContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// GET /whoami - The caller's identity and what their role may currently do
pub async fn whoami(
    Extension(authorizer): Extension<Authorizer>,
    Extension(ctx): Extension<PrincipalContext>,
) -> axum::response::Response {
    let Some(principal) = ctx.principal() else {
        return errors::authz_error_to_response(AuthzError::Unauthenticated);
    };

    Json(serde_json::json!({
        "principal_id": principal.id.to_string(),
        "role": principal.role,
        "permissions": authorizer.store().get_for_role(principal.role),
    }))
    .into_response()
}
