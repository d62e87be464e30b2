use sqlx::SqlitePool;
use uuid::Uuid;

use taskfit_core::Timestamp;

/// Keys in the `meta` table.
const NODE_ID: &str = "node_id";
const LAST_HLC: &str = "last_hlc";
const LAST_SYNC_TIMESTAMP: &str = "last_sync_timestamp";

/// Installation-scoped metadata: node identity, persisted clock state, and
/// the sync checkpoint.
pub struct MetaRepository {
    pool: SqlitePool,
}

impl MetaRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn get(&self, key: &str) -> Result<Option<String>, sqlx::Error> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM meta WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(value,)| value))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO meta (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// This installation's node id, created and persisted on first use.
    ///
    /// The id is never reused across installations: wiping the database
    /// produces a new one, which keeps timestamps from distinct histories
    /// distinguishable.
    pub async fn node_id(&self) -> Result<String, sqlx::Error> {
        if let Some(id) = self.get(NODE_ID).await? {
            return Ok(id);
        }
        let id = Uuid::new_v4().to_string();
        self.set(NODE_ID, &id).await?;
        Ok(id)
    }

    /// The last timestamp this installation issued, if any.
    pub async fn clock_state(&self) -> Result<Option<Timestamp>, sqlx::Error> {
        match self.get(LAST_HLC).await? {
            None => Ok(None),
            Some(raw) => Timestamp::parse(&raw)
                .map(Some)
                .map_err(|e| sqlx::Error::Decode(Box::new(e))),
        }
    }

    pub async fn save_clock(&self, last_issued: &Timestamp) -> Result<(), sqlx::Error> {
        self.set(LAST_HLC, &last_issued.to_string()).await
    }

    /// The highest timestamp pulled from the server so far.
    pub async fn checkpoint(&self) -> Result<Option<Timestamp>, sqlx::Error> {
        match self.get(LAST_SYNC_TIMESTAMP).await? {
            None => Ok(None),
            Some(raw) => Timestamp::parse(&raw)
                .map(Some)
                .map_err(|e| sqlx::Error::Decode(Box::new(e))),
        }
    }

    pub async fn save_checkpoint(&self, checkpoint: &Timestamp) -> Result<(), sqlx::Error> {
        self.set(LAST_SYNC_TIMESTAMP, &checkpoint.to_string()).await
    }
}
