//! HTTP API application wiring (Axum router + shared state).
//!
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use anyhow::Context;
use axum::{routing::get, Extension, Router};

use folio_auth::{
    Authorizer, FilePermissionStore, Hs256JwtValidator, InMemoryPermissionStore, JwtValidator,
    PermissionStore, RbacAdmin,
};

use crate::config::ApiConfig;
use crate::middleware;

pub mod errors;
pub mod routes;

/// Everything the router shares across requests.
///
/// `authorizer` and `admin` wrap the same permission store.
#[derive(Clone)]
pub struct AppState {
    pub authorizer: Authorizer,
    pub admin: RbacAdmin,
    pub jwt: Arc<dyn JwtValidator>,
}

impl AppState {
    pub fn new(store: Arc<dyn PermissionStore>, jwt: Arc<dyn JwtValidator>) -> Self {
        Self {
            authorizer: Authorizer::new(store.clone()),
            admin: RbacAdmin::new(store),
            jwt,
        }
    }

    /// In-memory permission store seeded from the defaults.
    pub fn in_memory(jwt_secret: &str) -> Self {
        Self::new(
            Arc::new(InMemoryPermissionStore::new()),
            Arc::new(Hs256JwtValidator::new(jwt_secret)),
        )
    }

    pub fn from_config(config: &ApiConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn PermissionStore> = match &config.rbac_table_path {
            Some(path) => {
                let store = FilePermissionStore::open(path)
                    .context("failed to open role permission table")?;
                tracing::info!(path = %store.path().display(), "role permission table is file-backed");
                Arc::new(store)
            }
            None => {
                tracing::info!("role permission table is in-memory; edits reset on restart");
                Arc::new(InMemoryPermissionStore::new())
            }
        };

        Ok(Self::new(
            store,
            Arc::new(Hs256JwtValidator::new(&config.jwt_secret)),
        ))
    }
}

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(state: AppState) -> Router {
    build_app_with(state, Router::new())
}

/// Build the router with additional resource routes mounted behind authentication.
///
/// `resources` should carry its own [`crate::authz::Guard`]s; routes without
/// one are reachable by any caller, including anonymous ones.
pub fn build_app_with(state: AppState, resources: Router) -> Router {
    let auth_state = middleware::AuthState {
        jwt: state.jwt.clone(),
    };

    // Authenticated routes: principal resolved here, guards applied per route group.
    let protected = routes::router(&state.authorizer)
        .merge(resources)
        .layer(Extension(state.authorizer.clone()))
        .layer(Extension(state.admin.clone()))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
}
