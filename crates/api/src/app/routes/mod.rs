use axum::{routing::get, Router};

use folio_auth::Authorizer;

use crate::authz::Guard;

pub mod rbac;
pub mod system;

/// Router for all endpoints behind authentication.
pub fn router(authorizer: &Authorizer) -> Router {
    let me = Guard::authenticated(authorizer)
        .apply(Router::new().route("/whoami", get(system::whoami)));

    Router::new()
        .merge(me)
        .nest("/admin/rbac", rbac::router(authorizer))
}
