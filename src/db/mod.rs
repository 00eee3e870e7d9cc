pub mod pool;

use std::path::Path;

use sqlx::SqlitePool;

use crate::error::Result;

pub use pool::create_pool;

/// Database handle type (the pool is internally reference counted)
pub type Db = SqlitePool;

/// Open or create the ledger database at the given path
///
/// Applies all pending migrations before returning.
pub async fn open_database(path: impl AsRef<Path>) -> Result<Db> {
    let path = path.as_ref();
    tracing::info!("Opening database at: {:?}", path);

    // Create parent directory if it doesn't exist
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| {
                tracing::error!("Failed to create database directory: {}", e);
                sqlx::Error::Io(e)
            })?;
        }
    }

    let pool = create_pool(path).await?;
    run_migrations(&pool).await?;

    tracing::info!("Database initialized successfully");

    Ok(pool)
}

/// Apply the embedded schema migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Migrations complete");
    Ok(())
}
