use anyhow::{Context, Result};
use serde::Deserialize;
use std::{env, time::Duration};

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Only needed when statements are executed; translation works without it.
    pub database_url: Option<String>,
    pub max_pool_size: u32,
    pub default_limit: u64,
    pub connect_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            max_pool_size: default_pool_size(),
            default_limit: default_limit(),
            connect_timeout: Duration::from_secs(default_connect_timeout_secs()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    condsql_database_url: Option<String>,
    #[serde(default)]
    database_url: Option<String>,
    #[serde(default = "default_pool_size")]
    condsql_max_pool_size: u32,
    #[serde(default = "default_limit")]
    condsql_default_limit: u64,
    #[serde(default = "default_connect_timeout_secs")]
    condsql_connect_timeout_secs: u64,
}

const fn default_pool_size() -> u32 {
    10
}

const fn default_limit() -> u64 {
    20
}

const fn default_connect_timeout_secs() -> u64 {
    30
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let raw: RawConfig =
            envy::from_env().context("failed to parse CONDSQL_* environment variables")?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self> {
        let database_url = raw
            .condsql_database_url
            .or(raw.database_url)
            .or_else(|| env::var("DATABASE_URL").ok())
            .filter(|url| !url.trim().is_empty());

        if raw.condsql_max_pool_size == 0 {
            anyhow::bail!("CONDSQL_MAX_POOL_SIZE must be at least 1");
        }

        Ok(Self {
            database_url,
            max_pool_size: raw.condsql_max_pool_size,
            default_limit: raw.condsql_default_limit.max(1),
            connect_timeout: Duration::from_secs(raw.condsql_connect_timeout_secs.max(1)),
        })
    }
}
