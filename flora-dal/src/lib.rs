//! History store (component C9): the sole row-level persistence surface
//! consensus entries and petal/consumer bootstrap state pass through.
//! Grounded on the teacher's `via_verifier_dal` method-on-struct-per-table
//! shape, simplified to a single `SqlitePool` since there is no sharded
//! `Core`/`Verifier` connection-pool split in this system.

mod app_state;
mod consensus_entries;
mod crypto;

pub use app_state::{AppStateDal, AppStateError};
pub use consensus_entries::{ConsensusEntriesDal, HistoryError};
pub use crypto::{CryptoError, SecretCipher};

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Opens the SQLite-backed store and runs pending migrations. `database_url`
/// is typically `sqlite://<path>` or `sqlite::memory:` for tests.
pub async fn connect(database_url: &str) -> Result<SqlitePool, StoreError> {
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}
