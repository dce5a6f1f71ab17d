//! Append-only consensus history (component C9). Entries are immutable
//! once inserted; only the log-tailer metadata columns (`hcs_message`,
//! `consensus_timestamp`, `sequence_number`) are ever filled in afterward,
//! and only once (invariant 9 of §8).

use chrono::{DateTime, Utc};
use flora_types::{AccountId, ConsensusEntry, SourcePrice};
use sqlx::SqlitePool;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("stored row could not be decoded: {0}")]
    Decode(String),
}

#[derive(sqlx::FromRow)]
struct EntryRow {
    epoch: i64,
    state_hash: String,
    price: f64,
    timestamp: String,
    participants: String,
    sources: String,
    hcs_message: Option<String>,
    consensus_timestamp: Option<String>,
    sequence_number: Option<i64>,
}

impl EntryRow {
    fn into_entry(self) -> Result<ConsensusEntry, HistoryError> {
        let timestamp: DateTime<Utc> = self
            .timestamp
            .parse()
            .map_err(|e| HistoryError::Decode(format!("timestamp: {e}")))?;
        let participants: Vec<AccountId> = serde_json::from_str(&self.participants)
            .map_err(|e| HistoryError::Decode(format!("participants: {e}")))?;
        let sources: Vec<SourcePrice> = serde_json::from_str(&self.sources)
            .map_err(|e| HistoryError::Decode(format!("sources: {e}")))?;
        Ok(ConsensusEntry {
            epoch: self.epoch as u64,
            state_hash: self.state_hash,
            price: self.price,
            timestamp,
            participants,
            sources,
            hcs_message: self.hcs_message,
            consensus_timestamp: self.consensus_timestamp,
            sequence_number: self.sequence_number.map(|n| n as u64),
        })
    }
}

pub struct ConsensusEntriesDal {
    pool: SqlitePool,
}

impl ConsensusEntriesDal {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Inserts a freshly-aggregated entry. A row already present for this
    /// epoch is left untouched: epochs are append-only once consensus is
    /// reached, so a re-insert attempt is a no-op rather than an error.
    pub async fn insert(&self, entry: &ConsensusEntry) -> Result<(), HistoryError> {
        let participants = serde_json::to_string(&entry.participants)
            .map_err(|e| HistoryError::Decode(e.to_string()))?;
        let sources =
            serde_json::to_string(&entry.sources).map_err(|e| HistoryError::Decode(e.to_string()))?;

        sqlx::query(
            "INSERT INTO consensus_entries \
                (epoch, state_hash, price, timestamp, participants, sources, \
                 hcs_message, consensus_timestamp, sequence_number) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(epoch) DO NOTHING",
        )
        .bind(entry.epoch as i64)
        .bind(&entry.state_hash)
        .bind(entry.price)
        .bind(entry.timestamp.to_rfc3339())
        .bind(participants)
        .bind(sources)
        .bind(&entry.hcs_message)
        .bind(&entry.consensus_timestamp)
        .bind(entry.sequence_number.map(|n| n as i64))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Fills in log-tailer metadata, but only while the row is still
    /// unstamped. Returns `true` if this call actually applied it.
    pub async fn apply_metadata(
        &self,
        epoch: u64,
        hcs_message: &str,
        consensus_timestamp: &str,
        sequence_number: u64,
    ) -> Result<bool, HistoryError> {
        let result = sqlx::query(
            "UPDATE consensus_entries \
             SET hcs_message = ?, consensus_timestamp = ?, sequence_number = ? \
             WHERE epoch = ? AND consensus_timestamp IS NULL",
        )
        .bind(hcs_message)
        .bind(consensus_timestamp)
        .bind(sequence_number as i64)
        .bind(epoch as i64)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn get(&self, epoch: u64) -> Result<Option<ConsensusEntry>, HistoryError> {
        let row: Option<EntryRow> =
            sqlx::query_as("SELECT * FROM consensus_entries WHERE epoch = ?")
                .bind(epoch as i64)
                .fetch_optional(&self.pool)
                .await?;
        row.map(EntryRow::into_entry).transpose()
    }

    /// The latest entry that has actually been published by the leader
    /// (`consensus_timestamp` stamped), falling back to the latest
    /// aggregated-but-not-yet-published entry if none has been published
    /// yet.
    pub async fn latest(&self) -> Result<Option<ConsensusEntry>, HistoryError> {
        let published: Option<EntryRow> = sqlx::query_as(
            "SELECT * FROM consensus_entries WHERE consensus_timestamp IS NOT NULL \
             ORDER BY epoch DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        if let Some(row) = published {
            return row.into_entry().map(Some);
        }

        let row: Option<EntryRow> =
            sqlx::query_as("SELECT * FROM consensus_entries ORDER BY epoch DESC LIMIT 1")
                .fetch_optional(&self.pool)
                .await?;
        row.map(EntryRow::into_entry).transpose()
    }

    /// All entries in ascending epoch order, used to warm the in-memory
    /// aggregator/leader-publisher state on startup.
    pub async fn load_all_ascending(&self) -> Result<Vec<ConsensusEntry>, HistoryError> {
        let rows: Vec<EntryRow> =
            sqlx::query_as("SELECT * FROM consensus_entries ORDER BY epoch ASC")
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(EntryRow::into_entry).collect()
    }

    /// Page used by `GET /price/history`: newest-first, `offset`/`limit`
    /// already clamped by the HTTP layer. Returns `(total_count, page)`.
    pub async fn page(
        &self,
        offset: u32,
        limit: u32,
    ) -> Result<(u64, Vec<ConsensusEntry>), HistoryError> {
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM consensus_entries")
            .fetch_one(&self.pool)
            .await?;
        let rows: Vec<EntryRow> = sqlx::query_as(
            "SELECT * FROM consensus_entries ORDER BY epoch DESC LIMIT ? OFFSET ?",
        )
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await?;
        let entries = rows.into_iter().map(EntryRow::into_entry).collect::<Result<_, _>>()?;
        Ok((total.0 as u64, entries))
    }
}
