use std::str::FromStr;

use deadpool_postgres::{
    Config, CreatePoolError, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime,
};
use thiserror::Error;
use tokio_postgres::NoTls;

pub type PgPool = Pool;

const DEFAULT_MAX_CONNECTIONS: usize = 16;

#[derive(Debug, Error)]
pub enum DbPoolError {
    #[error("invalid database url: {0}")]
    InvalidConfig(String),
    #[error("failed to create database pool: {0}")]
    PoolCreation(#[from] CreatePoolError),
}

/// `LBB_DB_MAX_CONNECTIONS`, falling back to the default on missing or zero values.
fn max_connections(raw: Option<&str>) -> usize {
    raw.and_then(|raw| raw.trim().parse::<usize>().ok())
        .filter(|size| *size > 0)
        .unwrap_or(DEFAULT_MAX_CONNECTIONS)
}

/// Builds the pool lazily; no connection is opened until first use, so a bad
/// password only shows up at the first query.
pub fn create_pool_from_url(db_url: &str) -> Result<PgPool, DbPoolError> {
    let max_size = max_connections(std::env::var("LBB_DB_MAX_CONNECTIONS").ok().as_deref());
    create_pool(db_url, max_size)
}

pub fn create_pool(db_url: &str, max_size: usize) -> Result<PgPool, DbPoolError> {
    tokio_postgres::Config::from_str(db_url)
        .map_err(|err| DbPoolError::InvalidConfig(err.to_string()))?;

    let cfg = Config {
        url: Some(db_url.to_string()),
        manager: Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        }),
        pool: Some(PoolConfig::new(max_size)),
        ..Config::default()
    };

    Ok(cfg.create_pool(Some(Runtime::Tokio1), NoTls)?)
}
