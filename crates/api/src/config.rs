//! Process configuration, read once from the environment at startup.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// `FOLIO_BIND_ADDR`
    pub bind_addr: SocketAddr,

    /// `JWT_SECRET` (HS256 shared secret)
    pub jwt_secret: String,

    /// `RBAC_TABLE_PATH`: when set, role permissions survive restarts in this file.
    pub rbac_table_path: Option<PathBuf>,
}

impl ApiConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let bind_addr = lookup("FOLIO_BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse()
            .context("FOLIO_BIND_ADDR must be a socket address like 0.0.0.0:8080")?;

        let jwt_secret = lookup("JWT_SECRET").unwrap_or_else(|| {
            tracing::warn!("JWT_SECRET not set; using insecure dev default");
            DEV_JWT_SECRET.to_string()
        });

        let rbac_table_path = lookup("RBAC_TABLE_PATH")
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            bind_addr,
            jwt_secret,
            rbac_table_path,
        })
    }
}
