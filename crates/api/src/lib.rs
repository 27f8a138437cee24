//! HTTP API: server wiring, authentication, authorization guards, RBAC admin.

pub mod app;
pub mod authz;
pub mod config;
pub mod context;
pub mod middleware;
