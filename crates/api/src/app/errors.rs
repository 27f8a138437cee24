use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use folio_auth::AuthzError;

/// Map an authorization-layer error onto an HTTP response.
///
/// - `Unauthenticated` → 401
/// - `Forbidden` → 403, with what was required and the caller's role
/// - `InvalidRole` / `Validation` → 400, naming the offending input
pub fn authz_error_to_response(err: AuthzError) -> axum::response::Response {
    match err {
        AuthzError::Unauthenticated => json_error(
            StatusCode::UNAUTHORIZED,
            "unauthenticated",
            "authentication required",
        ),
        AuthzError::Forbidden(denial) => {
            let message = denial.to_string();
            (
                StatusCode::FORBIDDEN,
                axum::Json(json!({
                    "error": "forbidden",
                    "message": message,
                    "details": denial,
                })),
            )
                .into_response()
        }
        AuthzError::InvalidRole(role) => json_error(
            StatusCode::BAD_REQUEST,
            "invalid_role",
            format!("unknown role '{role}'"),
        ),
        AuthzError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
