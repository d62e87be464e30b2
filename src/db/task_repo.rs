use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use taskfit_core::{Task, Timestamp};

/// Local replica of the user's tasks.
///
/// Rows are never physically deleted: tombstoned tasks stay in place so
/// deletion merges like any other write. `pending_sync` marks records
/// modified since the last confirmed push.
pub struct TaskRepository {
    pool: SqlitePool,
}

// Row type for database queries
#[derive(sqlx::FromRow)]
struct TaskRow {
    id: String,
    user_id: String,
    title: String,
    description: Option<String>,
    duration_minutes: i64,
    task_type: String,
    tags: String,
    is_completed: bool,
    due_at: Option<String>,
    timezone_mode: String,
    timezone: String,
    hlc_timestamp: String,
    created_at: String,
    updated_at: String,
    deleted_at: Option<String>,
}

impl TaskRow {
    fn into_task(self) -> Result<Task, sqlx::Error> {
        Ok(Task {
            id: Uuid::parse_str(&self.id).map_err(decode_err)?,
            user_id: self.user_id,
            title: self.title,
            description: self.description,
            duration_minutes: self.duration_minutes as u32,
            task_type: self.task_type.parse().map_err(string_decode_err)?,
            tags: serde_json::from_str(&self.tags).map_err(decode_err)?,
            is_completed: self.is_completed,
            due_at: parse_instant(self.due_at.as_deref())?,
            timezone_mode: self.timezone_mode.parse().map_err(string_decode_err)?,
            timezone: self.timezone,
            hlc_timestamp: Timestamp::parse(&self.hlc_timestamp).map_err(decode_err)?,
            created_at: parse_instant(Some(&self.created_at))?
                .ok_or_else(|| string_decode_err("created_at missing".to_string()))?,
            updated_at: parse_instant(Some(&self.updated_at))?
                .ok_or_else(|| string_decode_err("updated_at missing".to_string()))?,
            deleted_at: parse_instant(self.deleted_at.as_deref())?,
        })
    }
}

fn decode_err<E: std::error::Error + Send + Sync + 'static>(e: E) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(e))
}

fn string_decode_err(e: String) -> sqlx::Error {
    sqlx::Error::Decode(e.into())
}

fn parse_instant(value: Option<&str>) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
    match value {
        None => Ok(None),
        Some(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(decode_err),
    }
}

impl TaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Inserts or replaces a task row.
    ///
    /// `pending_sync` records whether this version still needs to be
    /// pushed: true for local edits, false for records adopted from the
    /// server.
    pub async fn upsert(&self, task: &Task, pending_sync: bool) -> Result<(), sqlx::Error> {
        let tags = serde_json::to_string(&task.tags).unwrap_or_else(|_| "[]".to_string());

        sqlx::query(
            r#"
            INSERT INTO tasks (
                id, user_id, title, description, duration_minutes, task_type,
                tags, is_completed, due_at, timezone_mode, timezone,
                hlc_timestamp, created_at, updated_at, deleted_at, pending_sync
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                user_id = excluded.user_id,
                title = excluded.title,
                description = excluded.description,
                duration_minutes = excluded.duration_minutes,
                task_type = excluded.task_type,
                tags = excluded.tags,
                is_completed = excluded.is_completed,
                due_at = excluded.due_at,
                timezone_mode = excluded.timezone_mode,
                timezone = excluded.timezone,
                hlc_timestamp = excluded.hlc_timestamp,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at,
                deleted_at = excluded.deleted_at,
                pending_sync = excluded.pending_sync
            "#,
        )
        .bind(task.id.to_string())
        .bind(&task.user_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.duration_minutes as i64)
        .bind(task.task_type.to_string())
        .bind(tags)
        .bind(task.is_completed)
        .bind(task.due_at.map(|dt| dt.to_rfc3339()))
        .bind(task.timezone_mode.to_string())
        .bind(&task.timezone)
        .bind(task.hlc_timestamp.to_string())
        .bind(task.created_at.to_rfc3339())
        .bind(task.updated_at.to_rfc3339())
        .bind(task.deleted_at.map(|dt| dt.to_rfc3339()))
        .bind(pending_sync)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Task>, sqlx::Error> {
        let row: Option<TaskRow> = sqlx::query_as("SELECT * FROM tasks WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(TaskRow::into_task).transpose()
    }

    /// Tasks for day-to-day views: tombstones always hidden, completed
    /// ones only with `include_completed`.
    pub async fn list(&self, include_completed: bool) -> Result<Vec<Task>, sqlx::Error> {
        let query = if include_completed {
            "SELECT * FROM tasks WHERE deleted_at IS NULL ORDER BY created_at"
        } else {
            "SELECT * FROM tasks WHERE deleted_at IS NULL AND is_completed = 0 ORDER BY created_at"
        };

        let rows: Vec<TaskRow> = sqlx::query_as(query).fetch_all(&self.pool).await?;
        rows.into_iter().map(TaskRow::into_task).collect()
    }

    /// The whole replica, tombstones included, for merge application.
    pub async fn snapshot(&self) -> Result<Vec<Task>, sqlx::Error> {
        let rows: Vec<TaskRow> = sqlx::query_as("SELECT * FROM tasks ORDER BY created_at")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(TaskRow::into_task).collect()
    }

    /// Records modified since the last confirmed push.
    pub async fn list_pending(&self) -> Result<Vec<Task>, sqlx::Error> {
        let rows: Vec<TaskRow> =
            sqlx::query_as("SELECT * FROM tasks WHERE pending_sync = 1 ORDER BY created_at")
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(TaskRow::into_task).collect()
    }

    /// Clears the pending flag for records the server confirmed.
    pub async fn mark_synced(&self, ids: &[Uuid]) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for id in ids {
            sqlx::query("UPDATE tasks SET pending_sync = 0 WHERE id = ?")
                .bind(id.to_string())
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Non-tombstoned tasks whose id starts with `prefix`.
    pub async fn find_by_prefix(&self, prefix: &str) -> Result<Vec<Task>, sqlx::Error> {
        let pattern = format!("{}%", prefix.to_lowercase());
        let rows: Vec<TaskRow> =
            sqlx::query_as("SELECT * FROM tasks WHERE deleted_at IS NULL AND id LIKE ?")
                .bind(pattern)
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(TaskRow::into_task).collect()
    }
}
