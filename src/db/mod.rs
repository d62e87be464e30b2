mod meta_repo;
mod task_repo;

pub use meta_repo::MetaRepository;
pub use task_repo::TaskRepository;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::PathBuf;
use std::str::FromStr;

use taskfit_core::Clock;

/// Initialize the database connection pool and run migrations
pub async fn init_db(db_path: PathBuf) -> Result<SqlitePool, sqlx::Error> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| sqlx::Error::Io(e))?;
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .foreign_keys(true)
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    // Run migrations
    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

/// Loads this installation's clock, seeded from the last issued timestamp
/// so monotonicity survives restarts. The node id is created and persisted
/// on first use.
pub async fn load_clock(meta: &MetaRepository) -> Result<Clock, sqlx::Error> {
    let node_id = meta.node_id().await?;
    Ok(match meta.clock_state().await? {
        Some(last) => Clock::seeded(node_id, &last),
        None => Clock::new(node_id),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_init_db_creates_tables() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let pool = init_db(db_path).await.unwrap();

        // Verify tables exist
        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' AND name NOT LIKE '_sqlx_%' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();

        let table_names: Vec<&str> = tables.iter().map(|t| t.0.as_str()).collect();
        assert!(table_names.contains(&"tasks"));
        assert!(table_names.contains(&"meta"));
    }

    #[tokio::test]
    async fn test_load_clock_is_stable_across_reloads() {
        let temp_dir = tempdir().unwrap();
        let pool = init_db(temp_dir.path().join("test.db")).await.unwrap();
        let meta = MetaRepository::new(pool);

        let mut clock = load_clock(&meta).await.unwrap();
        let node_id = clock.node_id().to_string();
        let issued = clock.tick();
        meta.save_clock(&clock.last_issued()).await.unwrap();

        // A second load keeps the node id and resumes past the persisted
        // state.
        let mut reloaded = load_clock(&meta).await.unwrap();
        assert_eq!(reloaded.node_id(), node_id);
        assert!(reloaded.tick() > issued);
    }
}
