//! Sync CLI command: one push/pull round against the configured server.

use std::collections::HashMap;

use clap::Args;
use uuid::Uuid;

use taskfit_core::{PushStatus, SyncClient, SyncError, Task};

use crate::config::Config;
use crate::db::{load_clock, MetaRepository, TaskRepository};

#[derive(Args)]
pub struct SyncCommand {}

impl SyncCommand {
    pub async fn run(
        &self,
        repo: &TaskRepository,
        meta: &MetaRepository,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let (server_url, api_key) = match (&config.server_url, &config.api_key) {
            (Some(url), Some(key)) => (url.clone(), key.clone()),
            _ => return Err(Box::new(SyncError::NotConfigured)),
        };

        let mut clock = load_clock(meta).await?;
        let checkpoint = meta.checkpoint().await?;
        let dirty = repo.list_pending().await?;
        let local: HashMap<Uuid, Task> = repo
            .snapshot()
            .await?
            .into_iter()
            .map(|t| (t.id, t))
            .collect();

        tracing::debug!(pending = dirty.len(), ?checkpoint, "starting sync round");

        let mut client = SyncClient::new(server_url, api_key);
        let report = client
            .sync_round(&mut clock, &local, dirty, checkpoint)
            .await?;

        // Both applied and stale mean the server has converged past our
        // version; only invalid records stay pending.
        let confirmed: Vec<Uuid> = report
            .pushed
            .iter()
            .filter(|r| matches!(r.status, PushStatus::Applied | PushStatus::Stale))
            .filter_map(|r| r.id)
            .collect();
        repo.mark_synced(&confirmed).await?;

        for task in &report.pull.accepted {
            repo.upsert(task, false).await?;
        }
        if let Some(checkpoint) = &report.pull.checkpoint {
            meta.save_checkpoint(checkpoint).await?;
        }
        meta.save_clock(&clock.last_issued()).await?;

        let applied = report
            .pushed
            .iter()
            .filter(|r| r.status == PushStatus::Applied)
            .count();
        let stale = report
            .pushed
            .iter()
            .filter(|r| r.status == PushStatus::Stale)
            .count();
        let invalid: Vec<_> = report
            .pushed
            .iter()
            .filter(|r| r.status == PushStatus::Invalid)
            .collect();

        println!(
            "Pushed {} task(s): {} applied, {} already up to date, {} invalid.",
            report.pushed.len(),
            applied,
            stale,
            invalid.len()
        );
        for result in &invalid {
            let id = result
                .id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "<no id>".to_string());
            println!(
                "  invalid {}: {}",
                id,
                result.detail.as_deref().unwrap_or("rejected by server")
            );
        }
        println!(
            "Pulled {} update(s), {} already known.",
            report.pull.accepted.len(),
            report.pull.stale
        );
        for detail in &report.pull_invalid {
            tracing::warn!("skipped undecodable record from server: {}", detail);
        }
        if !report.pull_invalid.is_empty() {
            println!(
                "Skipped {} record(s) the server sent in an unreadable form.",
                report.pull_invalid.len()
            );
        }

        Ok(())
    }
}
