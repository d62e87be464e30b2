//! HTTP sync client.
//!
//! Runs one push/pull round against the sync server: locally modified
//! records go up, records newer than the checkpoint come back, and the
//! pulled batch is applied through the merge engine. Rounds are atomic per
//! record, not globally — a round that dies mid-flight is simply re-run,
//! and merge idempotence makes the re-delivery harmless.

use std::collections::HashMap;
use std::time::Duration;

use uuid::Uuid;

use super::error::SyncError;
use super::protocol::{MeResponse, PushRecordResult, RawSyncResponse, SyncRequest};
use super::session::{apply_remote_batch, PullOutcome};
use crate::hlc::{Clock, Timestamp};
use crate::models::Task;

/// How long to wait for any single request before abandoning the round.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Identity information obtained from the /me endpoint.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: String,
}

/// Result of one full sync round.
#[derive(Debug, Clone)]
pub struct SyncReport {
    /// Per-record outcomes for everything pushed, as the server saw them.
    pub pushed: Vec<PushRecordResult>,
    /// What the pulled batch did locally.
    pub pull: PullOutcome,
    /// Pulled records that could not be decoded, skipped individually.
    pub pull_invalid: Vec<String>,
}

/// Client for the Taskfit sync server.
#[derive(Debug)]
pub struct SyncClient {
    server_url: String,
    api_key: String,
    /// Cached identity from the /me endpoint.
    identity: Option<Identity>,
}

impl SyncClient {
    pub fn new(server_url: String, api_key: String) -> Self {
        Self {
            server_url,
            api_key,
            identity: None,
        }
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.server_url.trim_end_matches('/'), path)
    }

    /// Fetches identity from the /me endpoint.
    ///
    /// Results are cached for subsequent calls.
    pub async fn fetch_identity(&mut self) -> Result<&Identity, SyncError> {
        if self.identity.is_some() {
            return Ok(self.identity.as_ref().unwrap());
        }

        let response = http_client()?
            .get(self.endpoint("/me"))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(SyncError::Unauthorized);
        }
        if !response.status().is_success() {
            return Err(SyncError::ServerStatus(response.status().as_u16()));
        }

        let me: MeResponse = response.json().await?;
        self.identity = Some(Identity {
            user_id: me.user_id,
        });

        Ok(self.identity.as_ref().unwrap())
    }

    /// Runs one push/pull round.
    ///
    /// `local` is a snapshot of the full local store (tombstones included)
    /// keyed by id, `dirty` the records modified since the last confirmed
    /// push, and `checkpoint` the highest timestamp pulled so far. The
    /// caller persists `report.pull.accepted` and `report.pull.checkpoint`
    /// and clears dirty flags for pushed records whose status is `applied`
    /// or `stale` — both mean the server has converged past that version.
    pub async fn sync_round(
        &mut self,
        clock: &mut Clock,
        local: &HashMap<Uuid, Task>,
        dirty: Vec<Task>,
        checkpoint: Option<Timestamp>,
    ) -> Result<SyncReport, SyncError> {
        self.fetch_identity().await?;

        let request = SyncRequest {
            client_tasks: dirty,
            last_sync_timestamp: checkpoint.clone(),
        };

        let response = http_client()?
            .post(self.endpoint("/sync"))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(SyncError::Unauthorized);
        }
        if !response.status().is_success() {
            return Err(SyncError::ServerStatus(response.status().as_u16()));
        }

        let body: RawSyncResponse = response.json().await?;

        // Decode pulled records one by one; a bad record is reported and
        // skipped, the rest of the batch still applies.
        let mut updates = Vec::with_capacity(body.server_updates.len());
        let mut pull_invalid = Vec::new();
        for value in body.server_updates {
            match serde_json::from_value::<Task>(value) {
                Ok(task) => updates.push(task),
                Err(e) => pull_invalid.push(e.to_string()),
            }
        }

        let pull = apply_remote_batch(clock, local, updates, checkpoint);

        Ok(SyncReport {
            pushed: body.results,
            pull,
            pull_invalid,
        })
    }
}

fn http_client() -> Result<reqwest::Client, SyncError> {
    Ok(reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_paths() {
        let client = SyncClient::new("https://sync.example.com".to_string(), "key".to_string());
        assert_eq!(client.endpoint("/me"), "https://sync.example.com/me");

        let trailing = SyncClient::new("https://sync.example.com/".to_string(), "key".to_string());
        assert_eq!(trailing.endpoint("/sync"), "https://sync.example.com/sync");
    }
}
