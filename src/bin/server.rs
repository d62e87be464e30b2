//! Taskfit Sync Server
//!
//! Stores each user's task records and lets any number of devices
//! converge on them. Conflicts resolve through the shared merge engine:
//! the version with the greater clock timestamp wins whole-record, so
//! rounds can be retried and re-delivered freely.
//!
//! # Configuration
//!
//! Environment variables:
//! - `TASKFIT_SERVER_PORT`: Port to listen on (default: 8080)
//! - `TASKFIT_SERVER_DB`: SQLite database path (default: ~/.local/share/taskfit-server/tasks.db)
//! - `TASKFIT_SERVER_CONFIG`: Path to config file (default: ~/.config/taskfit-server/config.yaml)
//!
//! # Config File Format
//!
//! ```yaml
//! api_keys:
//!   - key: "your-secret-key-here"
//!     user_id: "user1"
//! ```
//!
//! # Endpoints
//!
//! - `GET /health`: Health check endpoint (no auth required)
//! - `GET /me`: Returns current user info (auth required)
//! - `GET /tasks`: Lists the user's live tasks (auth required)
//! - `POST /tasks`: Pushes a single record (auth required; 409 when stale)
//! - `POST /sync`: Full push/pull round (auth required)

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use taskfit_core::{
    merge, MeResponse, MergeOutcome, PushRecordResult, PushStatus, RawSyncRequest, SyncResponse,
    Task, Timestamp,
};

// ============================================================================
// Configuration
// ============================================================================

/// API key entry in config
#[derive(Debug, Clone, Deserialize)]
struct ApiKeyEntry {
    key: String,
    user_id: String,
}

/// Config file structure
#[derive(Debug, Clone, Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    api_keys: Vec<ApiKeyEntry>,
}

/// Server configuration
#[derive(Debug, Clone)]
struct Config {
    /// Port to listen on
    port: u16,
    /// SQLite database path
    database_path: PathBuf,
    /// Path to config file
    config_path: PathBuf,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Self {
        let port = std::env::var("TASKFIT_SERVER_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let database_path = std::env::var("TASKFIT_SERVER_DB")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::data_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("taskfit-server")
                    .join("tasks.db")
            });

        let config_path = std::env::var("TASKFIT_SERVER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::config_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("taskfit-server")
                    .join("config.yaml")
            });

        Self {
            port,
            database_path,
            config_path,
        }
    }
}

// ============================================================================
// Authentication
// ============================================================================

/// Authenticated user info, added to request extensions after auth
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
}

/// API key store - maps key -> AuthUser
#[derive(Debug, Clone)]
struct ApiKeyStore {
    keys: HashMap<String, AuthUser>,
}

impl ApiKeyStore {
    /// Load API keys from config file
    fn load(config_path: &PathBuf) -> Self {
        let keys = match std::fs::read_to_string(config_path) {
            Ok(contents) => match serde_yaml::from_str::<ConfigFile>(&contents) {
                Ok(config) => {
                    let mut map = HashMap::new();
                    for entry in config.api_keys {
                        map.insert(
                            entry.key,
                            AuthUser {
                                user_id: entry.user_id,
                            },
                        );
                    }
                    tracing::info!("Loaded {} API key(s)", map.len());
                    map
                }
                Err(e) => {
                    tracing::warn!("Failed to parse config file: {}", e);
                    HashMap::new()
                }
            },
            Err(e) => {
                tracing::warn!(
                    "Failed to read config file {}: {}",
                    config_path.display(),
                    e
                );
                tracing::warn!("No API keys loaded - all authenticated requests will fail");
                HashMap::new()
            }
        };

        Self { keys }
    }

    /// Validate an API key and return the associated user
    fn validate(&self, key: &str) -> Option<AuthUser> {
        self.keys.get(key).cloned()
    }
}

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    api_keys: Arc<ApiKeyStore>,
    pool: SqlitePool,
}

/// Auth error response
#[derive(Serialize)]
struct AuthError {
    error: &'static str,
    message: &'static str,
}

/// Authentication middleware
async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    // Extract Authorization header
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let api_key = match auth_header {
        Some(h) if h.starts_with("Bearer ") => &h[7..],
        Some(_) => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(AuthError {
                    error: "invalid_auth",
                    message: "Authorization header must use Bearer scheme",
                }),
            )
                .into_response();
        }
        None => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(AuthError {
                    error: "missing_auth",
                    message: "Authorization header required",
                }),
            )
                .into_response();
        }
    };

    // Validate API key
    match state.api_keys.validate(api_key) {
        Some(user) => {
            // Add user info to request extensions
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        None => (
            StatusCode::UNAUTHORIZED,
            Json(AuthError {
                error: "invalid_key",
                message: "Invalid API key",
            }),
        )
            .into_response(),
    }
}

// ============================================================================
// Storage
// ============================================================================

/// Creates the schema on startup.
///
/// `hlc_timestamp` holds the canonical fixed-width encoding, so the index
/// orders rows exactly like the parsed timestamps and `>` comparisons in
/// SQL match the merge engine's ordering.
async fn init_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tasks (
            id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT,
            duration_minutes INTEGER NOT NULL,
            task_type TEXT NOT NULL DEFAULT 'admin',
            tags TEXT NOT NULL DEFAULT '[]',
            is_completed INTEGER NOT NULL DEFAULT 0,
            due_at TEXT,
            timezone_mode TEXT NOT NULL DEFAULT 'floating',
            timezone TEXT NOT NULL DEFAULT 'UTC',
            hlc_timestamp TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            deleted_at TEXT,
            PRIMARY KEY (user_id, id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_tasks_user_hlc ON tasks(user_id, hlc_timestamp)")
        .execute(pool)
        .await?;

    Ok(())
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
            task_type: self
                .task_type
                .parse()
                .map_err(|e: String| sqlx::Error::Decode(e.into()))?,
            tags: serde_json::from_str(&self.tags).map_err(decode_err)?,
            is_completed: self.is_completed,
            due_at: parse_instant(self.due_at.as_deref())?,
            timezone_mode: self
                .timezone_mode
                .parse()
                .map_err(|e: String| sqlx::Error::Decode(e.into()))?,
            timezone: self.timezone,
            hlc_timestamp: Timestamp::parse(&self.hlc_timestamp).map_err(decode_err)?,
            created_at: parse_instant(Some(&self.created_at))?
                .ok_or_else(|| sqlx::Error::Decode("created_at missing".into()))?,
            updated_at: parse_instant(Some(&self.updated_at))?
                .ok_or_else(|| sqlx::Error::Decode("updated_at missing".into()))?,
            deleted_at: parse_instant(self.deleted_at.as_deref())?,
        })
    }
}

fn decode_err<E: std::error::Error + Send + Sync + 'static>(e: E) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(e))
}

fn parse_instant(
    value: Option<&str>,
) -> Result<Option<chrono::DateTime<chrono::Utc>>, sqlx::Error> {
    match value {
        None => Ok(None),
        Some(s) => chrono::DateTime::parse_from_rfc3339(s)
            .map(|dt| Some(dt.with_timezone(&chrono::Utc)))
            .map_err(decode_err),
    }
}

/// Merges one record against the stored state and persists the winner.
///
/// Read and write happen in one transaction, so two concurrent rounds for
/// the same owner cannot interleave between compare and apply and let an
/// older version overwrite a newer one.
async fn apply_record(
    pool: &SqlitePool,
    user_id: &str,
    mut task: Task,
) -> Result<PushRecordResult, sqlx::Error> {
    // The authenticated key owns the record, whatever the client claimed.
    task.user_id = user_id.to_string();
    let id = task.id;

    let mut tx = pool.begin().await?;

    let row: Option<TaskRow> =
        sqlx::query_as("SELECT * FROM tasks WHERE user_id = ? AND id = ?")
            .bind(user_id)
            .bind(id.to_string())
            .fetch_optional(&mut *tx)
            .await?;
    let existing = row.map(TaskRow::into_task).transpose()?;

    match merge(existing.as_ref(), task) {
        MergeOutcome::Accepted(winner) => {
            let tags = serde_json::to_string(&winner.tags).unwrap_or_else(|_| "[]".to_string());
            sqlx::query(
                r#"
                INSERT INTO tasks (
                    id, user_id, title, description, duration_minutes, task_type,
                    tags, is_completed, due_at, timezone_mode, timezone,
                    hlc_timestamp, created_at, updated_at, deleted_at
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(user_id, id) DO UPDATE SET
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
                    deleted_at = excluded.deleted_at
                "#,
            )
            .bind(winner.id.to_string())
            .bind(&winner.user_id)
            .bind(&winner.title)
            .bind(&winner.description)
            .bind(winner.duration_minutes as i64)
            .bind(winner.task_type.to_string())
            .bind(tags)
            .bind(winner.is_completed)
            .bind(winner.due_at.map(|dt| dt.to_rfc3339()))
            .bind(winner.timezone_mode.to_string())
            .bind(&winner.timezone)
            .bind(winner.hlc_timestamp.to_string())
            .bind(winner.created_at.to_rfc3339())
            .bind(winner.updated_at.to_rfc3339())
            .bind(winner.deleted_at.map(|dt| dt.to_rfc3339()))
            .execute(&mut *tx)
            .await?;
            tx.commit().await?;

            Ok(PushRecordResult::applied(id))
        }
        MergeOutcome::Rejected => {
            tx.commit().await?;
            Ok(PushRecordResult::stale(id))
        }
    }
}

/// All records of a user with a version strictly newer than `since`,
/// tombstones included.
async fn list_since(
    pool: &SqlitePool,
    user_id: &str,
    since: Option<&Timestamp>,
) -> Result<Vec<Task>, sqlx::Error> {
    let rows: Vec<TaskRow> = match since {
        Some(since) => {
            sqlx::query_as(
                "SELECT * FROM tasks WHERE user_id = ? AND hlc_timestamp > ? ORDER BY hlc_timestamp",
            )
            .bind(user_id)
            .bind(since.to_string())
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as("SELECT * FROM tasks WHERE user_id = ? ORDER BY hlc_timestamp")
                .bind(user_id)
                .fetch_all(pool)
                .await?
        }
    };

    rows.into_iter().map(TaskRow::into_task).collect()
}

/// Live (non-tombstoned) tasks of a user, for plain listing.
async fn list_active(pool: &SqlitePool, user_id: &str) -> Result<Vec<Task>, sqlx::Error> {
    let rows: Vec<TaskRow> = sqlx::query_as(
        "SELECT * FROM tasks WHERE user_id = ? AND deleted_at IS NULL ORDER BY created_at",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(TaskRow::into_task).collect()
}

// ============================================================================
// Sync
// ============================================================================

/// Applies a pushed batch record by record.
///
/// A record that fails to decode or validate is reported and skipped; the
/// rest of the batch still goes through.
async fn apply_push(
    pool: &SqlitePool,
    user_id: &str,
    records: Vec<serde_json::Value>,
) -> Result<Vec<PushRecordResult>, sqlx::Error> {
    let mut results = Vec::with_capacity(records.len());

    for value in records {
        let task: Task = match serde_json::from_value(value.clone()) {
            Ok(task) => task,
            Err(e) => {
                tracing::debug!("skipping undecodable record: {}", e);
                results.push(PushRecordResult::invalid(value_id(&value), e.to_string()));
                continue;
            }
        };

        if let Err(e) = task.validate() {
            tracing::debug!(id = %task.id, "skipping invalid record: {}", e);
            results.push(PushRecordResult::invalid(Some(task.id), e.to_string()));
            continue;
        }

        results.push(apply_record(pool, user_id, task).await?);
    }

    Ok(results)
}

/// Best-effort id extraction from a record that failed to decode.
fn value_id(value: &serde_json::Value) -> Option<Uuid> {
    value
        .get("id")
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok())
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Health check endpoint (no auth required)
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Get current user info (auth required)
async fn me(Extension(user): Extension<AuthUser>) -> Json<MeResponse> {
    Json(MeResponse {
        user_id: user.user_id,
    })
}

fn internal_error(e: sqlx::Error) -> (StatusCode, String) {
    tracing::error!("storage error: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal error".to_string(),
    )
}

/// List the user's live tasks (auth required)
async fn tasks_index(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Task>>, (StatusCode, String)> {
    let tasks = list_active(&state.pool, &user.user_id)
        .await
        .map_err(internal_error)?;
    Ok(Json(tasks))
}

/// Push a single record (auth required)
///
/// Returns 409 when the stored version is equal or newer, 422 when the
/// record is malformed.
async fn tasks_push(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(value): Json<serde_json::Value>,
) -> Result<Json<PushRecordResult>, Response> {
    let mut results = apply_push(&state.pool, &user.user_id, vec![value])
        .await
        .map_err(|e| internal_error(e).into_response())?;
    let result = results.remove(0);

    match result.status {
        PushStatus::Applied => Ok(Json(result)),
        PushStatus::Stale => Err((StatusCode::CONFLICT, Json(result)).into_response()),
        PushStatus::Invalid => {
            Err((StatusCode::UNPROCESSABLE_ENTITY, Json(result)).into_response())
        }
    }
}

/// Full push/pull round (auth required)
async fn sync(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<RawSyncRequest>,
) -> Result<Json<SyncResponse>, (StatusCode, String)> {
    tracing::debug!(
        user = %user.user_id,
        pushed = request.client_tasks.len(),
        since = ?request.last_sync_timestamp,
        "sync round"
    );

    let results = apply_push(&state.pool, &user.user_id, request.client_tasks)
        .await
        .map_err(internal_error)?;

    let server_updates = list_since(
        &state.pool,
        &user.user_id,
        request.last_sync_timestamp.as_ref(),
    )
    .await
    .map_err(internal_error)?;

    Ok(Json(SyncResponse {
        results,
        server_updates,
    }))
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taskfit_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env();

    // Ensure data directory exists
    if let Some(parent) = config.database_path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            tracing::error!("Failed to create data directory: {}", e);
            std::process::exit(1);
        }
    }

    tracing::info!("Database: {}", config.database_path.display());
    tracing::info!("Config file: {}", config.config_path.display());

    // Open the database and create the schema
    let db_url = format!("sqlite:{}?mode=rwc", config.database_path.display());
    let options = match SqliteConnectOptions::from_str(&db_url) {
        Ok(options) => options.create_if_missing(true),
        Err(e) => {
            tracing::error!("Invalid database path: {}", e);
            std::process::exit(1);
        }
    };
    let pool = match SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
    {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("Failed to open database: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = init_schema(&pool).await {
        tracing::error!("Failed to initialize schema: {}", e);
        std::process::exit(1);
    }

    // Load API keys
    let api_keys = Arc::new(ApiKeyStore::load(&config.config_path));

    // Build app state
    let state = AppState { api_keys, pool };

    // Build router
    // Public routes (no auth)
    let public_routes = Router::new().route("/health", get(health));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/me", get(me))
        .route("/tasks", get(tasks_index).post(tasks_push))
        .route("/sync", post(sync))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Starting server on {}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskfit_core::{Clock, PushStatus};
    use tempfile::TempDir;

    async fn setup() -> (SqlitePool, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_url = format!(
            "sqlite:{}?mode=rwc",
            temp_dir.path().join("test.db").display()
        );
        let options = SqliteConnectOptions::from_str(&db_url)
            .unwrap()
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .unwrap();
        init_schema(&pool).await.unwrap();
        (pool, temp_dir)
    }

    fn task_with(clock: &mut Clock, title: &str) -> Task {
        Task::new("ignored-client-claim", title, 20, clock.tick())
    }

    #[tokio::test]
    async fn test_apply_record_new_then_stale_then_newer() {
        let (pool, _tmp) = setup().await;
        let mut clock = Clock::new("device-1");
        let task = task_with(&mut clock, "First");

        let first = apply_record(&pool, "user1", task.clone()).await.unwrap();
        assert_eq!(first.status, PushStatus::Applied);

        // Exact re-delivery of the same version is stale, not an error.
        let replay = apply_record(&pool, "user1", task.clone()).await.unwrap();
        assert_eq!(replay.status, PushStatus::Stale);

        // A genuinely newer version wins and replaces the stored record.
        let mut newer = task.clone();
        newer.title = "Second".to_string();
        newer.stamp(clock.tick());
        let second = apply_record(&pool, "user1", newer.clone()).await.unwrap();
        assert_eq!(second.status, PushStatus::Applied);

        let stored = list_since(&pool, "user1", None).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].title, "Second");

        // The older version arriving late changes nothing.
        let late = apply_record(&pool, "user1", task).await.unwrap();
        assert_eq!(late.status, PushStatus::Stale);
        let stored = list_since(&pool, "user1", None).await.unwrap();
        assert_eq!(stored[0].title, "Second");
    }

    #[tokio::test]
    async fn test_apply_record_assigns_authenticated_owner() {
        let (pool, _tmp) = setup().await;
        let mut clock = Clock::new("device-1");
        let task = task_with(&mut clock, "Mine");

        apply_record(&pool, "user1", task).await.unwrap();
        let stored = list_since(&pool, "user1", None).await.unwrap();
        assert_eq!(stored[0].user_id, "user1");
    }

    #[tokio::test]
    async fn test_apply_push_skips_invalid_records_individually() {
        let (pool, _tmp) = setup().await;
        let mut clock = Clock::new("device-1");

        let good = serde_json::to_value(task_with(&mut clock, "Good")).unwrap();
        let undecodable = serde_json::json!({"id": "not-a-task"});
        let mut bad_schema = task_with(&mut clock, "Bad");
        bad_schema.duration_minutes = 0;
        let bad_schema_value = serde_json::to_value(&bad_schema).unwrap();

        let results = apply_push(
            &pool,
            "user1",
            vec![undecodable, good, bad_schema_value],
        )
        .await
        .unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].status, PushStatus::Invalid);
        assert!(results[0].id.is_none());
        assert_eq!(results[1].status, PushStatus::Applied);
        assert_eq!(results[2].status, PushStatus::Invalid);
        assert_eq!(results[2].id, Some(bad_schema.id));

        // Only the good record landed.
        let stored = list_since(&pool, "user1", None).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].title, "Good");
    }

    #[tokio::test]
    async fn test_list_since_is_strictly_greater_and_scoped() {
        let (pool, _tmp) = setup().await;
        let mut clock = Clock::new("device-1");

        let t1 = task_with(&mut clock, "One");
        let t2 = task_with(&mut clock, "Two");
        let other = task_with(&mut clock, "Other user");

        apply_record(&pool, "user1", t1.clone()).await.unwrap();
        apply_record(&pool, "user1", t2.clone()).await.unwrap();
        apply_record(&pool, "user2", other).await.unwrap();

        // No checkpoint pulls everything the user owns.
        let all = list_since(&pool, "user1", None).await.unwrap();
        assert_eq!(all.len(), 2);

        // The checkpoint itself is excluded; only newer versions come back.
        let newer = list_since(&pool, "user1", Some(&t1.hlc_timestamp))
            .await
            .unwrap();
        assert_eq!(newer.len(), 1);
        assert_eq!(newer[0].title, "Two");

        let none = list_since(&pool, "user1", Some(&t2.hlc_timestamp))
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_list_since_includes_tombstones() {
        let (pool, _tmp) = setup().await;
        let mut clock = Clock::new("device-1");

        let mut task = task_with(&mut clock, "Doomed");
        apply_record(&pool, "user1", task.clone()).await.unwrap();
        let checkpoint = task.hlc_timestamp.clone();

        task.tombstone(clock.tick());
        apply_record(&pool, "user1", task).await.unwrap();

        // The deletion must flow to other devices like any write.
        let updates = list_since(&pool, "user1", Some(&checkpoint)).await.unwrap();
        assert_eq!(updates.len(), 1);
        assert!(updates[0].deleted_at.is_some());

        // But it is gone from the live listing.
        let live = list_active(&pool, "user1").await.unwrap();
        assert!(live.is_empty());
    }

    #[tokio::test]
    async fn test_stored_order_matches_timestamp_order() {
        let (pool, _tmp) = setup().await;

        // Insert out of order; the TEXT index must give timestamp order.
        let t1 = Task::new("u", "Early", 5, Timestamp::new(1_000, 0, "zzz"));
        let t2 = Task::new("u", "Middle", 5, Timestamp::new(2_000, 0, "aaa"));
        let t3 = Task::new("u", "Late", 5, Timestamp::new(2_000, 1, "aaa"));

        for t in [&t3, &t1, &t2] {
            apply_record(&pool, "user1", (*t).clone()).await.unwrap();
        }

        let stored = list_since(&pool, "user1", None).await.unwrap();
        let titles: Vec<&str> = stored.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, ["Early", "Middle", "Late"]);
    }
}
