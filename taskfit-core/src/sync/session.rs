//! Client-side application of a pulled batch.
//!
//! The server never writes into a client's store; it only ships records.
//! Everything the client persists goes through the merge engine here, and
//! the checkpoint for the next round is derived from what was actually
//! received — never from the wall clock, which under skew would let the
//! server hold records the client silently skips forever.

use std::collections::HashMap;

use uuid::Uuid;

use crate::hlc::{Clock, Timestamp};
use crate::merge::{merge, MergeOutcome};
use crate::models::Task;

/// What a pulled batch did to local state.
#[derive(Debug, Clone, Default)]
pub struct PullOutcome {
    /// Winning records the caller must persist, in arrival order.
    pub accepted: Vec<Task>,
    /// Records the local store already superseded.
    pub stale: usize,
    /// Checkpoint for the next round: the highest timestamp observed in
    /// the batch (stale records included), or the prior checkpoint when
    /// the batch had nothing newer.
    pub checkpoint: Option<Timestamp>,
}

/// Runs every record of a pulled batch through the merge engine.
///
/// `local` is a snapshot of the client's store keyed by record id. Each
/// remote timestamp is folded into `clock` so timestamps issued afterwards
/// are causally ahead of everything seen. Records are applied in order,
/// and later records in the same batch merge against earlier winners, so
/// a batch carrying several versions of one id converges the same way
/// separate deliveries would. Re-delivering an already-applied batch
/// leaves everything unchanged.
pub fn apply_remote_batch(
    clock: &mut Clock,
    local: &HashMap<Uuid, Task>,
    incoming: Vec<Task>,
    prior_checkpoint: Option<Timestamp>,
) -> PullOutcome {
    let mut winners: HashMap<Uuid, Task> = HashMap::new();
    let mut order: Vec<Uuid> = Vec::new();
    let mut stale = 0usize;
    let mut checkpoint = prior_checkpoint;

    for task in incoming {
        clock.receive(&task.hlc_timestamp);

        if checkpoint
            .as_ref()
            .map_or(true, |c| task.hlc_timestamp > *c)
        {
            checkpoint = Some(task.hlc_timestamp.clone());
        }

        let id = task.id;
        let current = winners.get(&id).or_else(|| local.get(&id));
        match merge(current, task) {
            MergeOutcome::Accepted(winner) => {
                if !winners.contains_key(&id) {
                    order.push(id);
                }
                winners.insert(id, winner);
            }
            MergeOutcome::Rejected => stale += 1,
        }
    }

    PullOutcome {
        accepted: order
            .into_iter()
            .filter_map(|id| winners.remove(&id))
            .collect(),
        stale,
        checkpoint,
    }
}
