pub mod connection;

pub use connection::*;

use crate::config::DatabaseConfig;
use crate::error::AppResult;
use crate::store::{MemoryStore, PgStore, Stores};
use std::sync::Arc;

pub const MEMORY_URL: &str = "memory://";

/// Opens the configured backend. `memory://` keeps everything in process;
/// any other URL is treated as PostgreSQL and migrated on connect.
pub async fn connect_stores(config: &DatabaseConfig) -> AppResult<Stores> {
    if config.url == MEMORY_URL {
        log::warn!("Using the in-memory store, data will not survive a restart");
        return Ok(Stores::from_backend(Arc::new(MemoryStore::new())));
    }

    let pool = create_pool(config).await?;
    run_migrations(&pool).await?;
    log::info!("Database connected and migrations applied");
    Ok(Stores::from_backend(Arc::new(PgStore::new(pool))))
}
