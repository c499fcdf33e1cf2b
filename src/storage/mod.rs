//! SQLite storage layer -- schema, migrations and the incident store.

pub mod incidents;
pub mod schema;

use std::path::Path;

use anyhow::{Context, Result};
use r2d2::Pool as R2D2Pool;
use r2d2_sqlite::SqliteConnectionManager;

pub use self::incidents::{IncidentStore, StoreError};

/// Connection Pool type
pub type Pool = R2D2Pool<SqliteConnectionManager>;

/// Open (or create) the SQLite database and return a connection pool.
pub fn open_pool(path: &Path) -> Result<Pool> {
    let manager = SqliteConnectionManager::file(path).with_init(|c| {
        c.execute_batch(
            "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA temp_store = MEMORY;
                 PRAGMA foreign_keys = ON;
                 PRAGMA busy_timeout = 5000;",
        )
    });

    let pool = R2D2Pool::new(manager)
        .with_context(|| format!("failed to open database {}", path.display()))?;

    // Run migrations on a single connection
    let conn = pool.get()?;
    schema::migrate(&conn)?;

    Ok(pool)
}

/// Open the pool and optionally seed sample data. Returns the store and
/// the number of seeded rows.
pub fn open_store(path: &Path, seed_when_empty: bool) -> Result<(IncidentStore, usize)> {
    let store = IncidentStore::new(open_pool(path)?);
    let seeded = if seed_when_empty {
        store.seed_if_empty()?
    } else {
        0
    };
    Ok((store, seeded))
}
