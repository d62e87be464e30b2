//! Wire types for the sync exchange.
//!
//! One round is a single POST: the client sends its locally modified
//! records plus the checkpoint from the previous round, the server answers
//! with a per-record result for each pushed record and every record it
//! holds with a version newer than the checkpoint. The format is
//! transport-agnostic JSON; any request/response channel works.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::hlc::Timestamp;
use crate::models::Task;

/// Push batch plus pull checkpoint, client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRequest {
    pub client_tasks: Vec<Task>,
    /// Highest timestamp received from this server so far; absent on the
    /// first round, which pulls everything.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_timestamp: Option<Timestamp>,
}

/// Lenient server-side view of [`SyncRequest`].
///
/// Each record decodes individually, so one malformed record is skipped
/// and reported instead of failing the whole batch.
#[derive(Debug, Deserialize)]
pub struct RawSyncRequest {
    pub client_tasks: Vec<serde_json::Value>,
    #[serde(default)]
    pub last_sync_timestamp: Option<Timestamp>,
}

/// Per-record results and newer server records, server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResponse {
    pub results: Vec<PushRecordResult>,
    pub server_updates: Vec<Task>,
}

/// Lenient client-side view of [`SyncResponse`].
///
/// Mirrors [`RawSyncRequest`]: pulled records decode individually, so one
/// bad record is skipped and reported instead of aborting the round.
#[derive(Debug, Deserialize)]
pub struct RawSyncResponse {
    pub results: Vec<PushRecordResult>,
    pub server_updates: Vec<serde_json::Value>,
}

/// What happened to one pushed record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushRecordResult {
    /// Absent only when the record was too malformed to carry an id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub status: PushStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl PushRecordResult {
    pub fn applied(id: Uuid) -> Self {
        Self {
            id: Some(id),
            status: PushStatus::Applied,
            detail: None,
        }
    }

    pub fn stale(id: Uuid) -> Self {
        Self {
            id: Some(id),
            status: PushStatus::Stale,
            detail: None,
        }
    }

    pub fn invalid(id: Option<Uuid>, detail: impl Into<String>) -> Self {
        Self {
            id,
            status: PushStatus::Invalid,
            detail: Some(detail.into()),
        }
    }
}

/// Outcome category for a pushed record.
///
/// `Stale` is an expected, successful outcome: the peer already holds an
/// equal-or-newer version, which is the converged state. Only `Invalid`
/// means the record itself was unusable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PushStatus {
    Applied,
    Stale,
    Invalid,
}

/// Response from the /me endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeResponse {
    pub user_id: String,
}
