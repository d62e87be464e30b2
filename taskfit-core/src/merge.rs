//! Last-writer-wins merge for task records.
//!
//! Conflict resolution is whole-record: the version with the greater
//! clock timestamp fully replaces the other, fields are never combined.
//! The function is pure and idempotent, so any delivery order with any
//! amount of duplication converges to the same state — the property the
//! whole sync protocol leans on.

use std::cmp::Ordering;

use crate::models::Task;

/// Decision for one incoming record.
///
/// `Rejected` covers both a strictly older incoming version and an exact
/// re-delivery of the version already held; neither may touch the store.
#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    /// The incoming record wins; the caller persists it as-is.
    Accepted(Task),
    /// The local record stands; the incoming one is discarded.
    Rejected,
}

impl MergeOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, MergeOutcome::Accepted(_))
    }
}

/// Decides between the locally stored record (if any) and an incoming one.
///
/// The caller is responsible for persisting an `Accepted` outcome; nothing
/// is written here.
pub fn merge(local: Option<&Task>, incoming: Task) -> MergeOutcome {
    match local {
        None => MergeOutcome::Accepted(incoming),
        Some(local) => match incoming.hlc_timestamp.cmp(&local.hlc_timestamp) {
            Ordering::Greater => MergeOutcome::Accepted(incoming),
            Ordering::Less | Ordering::Equal => MergeOutcome::Rejected,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hlc::Timestamp;
    use crate::models::Task;

    fn version(task: &Task, physical: i64, counter: u64, node: &str, title: &str) -> Task {
        let mut v = task.clone();
        v.title = title.to_string();
        v.hlc_timestamp = Timestamp::new(physical, counter, node);
        v
    }

    fn base_task() -> Task {
        Task::new(
            "user-1",
            "Original",
            15,
            Timestamp::new(1_740_000_000_000, 0, "node-a"),
        )
    }

    #[test]
    fn test_absent_local_accepts_unconditionally() {
        let incoming = base_task();
        assert_eq!(
            merge(None, incoming.clone()),
            MergeOutcome::Accepted(incoming)
        );
    }

    #[test]
    fn test_newer_incoming_replaces_whole_record() {
        let local = base_task();
        let incoming = version(&local, 1_740_000_000_001, 0, "node-b", "Edited");

        match merge(Some(&local), incoming.clone()) {
            MergeOutcome::Accepted(winner) => assert_eq!(winner, incoming),
            MergeOutcome::Rejected => panic!("newer incoming must be accepted"),
        }
    }

    #[test]
    fn test_older_incoming_is_rejected() {
        let local = base_task();
        let incoming = version(&local, 1_739_999_999_999, 5, "node-b", "Stale edit");
        assert_eq!(merge(Some(&local), incoming), MergeOutcome::Rejected);
    }

    #[test]
    fn test_equal_version_redelivery_is_a_no_op() {
        let local = base_task();
        let incoming = local.clone();
        assert_eq!(merge(Some(&local), incoming), MergeOutcome::Rejected);
    }

    #[test]
    fn test_node_id_breaks_full_ties() {
        let local = base_task(); // node-a
        let incoming = version(&local, 1_740_000_000_000, 0, "node-b", "Tied");
        // node-b > node-a under the fixed tie-break, so it wins.
        assert!(merge(Some(&local), incoming).is_accepted());
    }

    #[test]
    fn test_idempotence() {
        let incoming = base_task();

        let mut stored: Option<Task> = None;
        if let MergeOutcome::Accepted(t) = merge(stored.as_ref(), incoming.clone()) {
            stored = Some(t);
        }
        let after_first = stored.clone();

        // Re-applying the same version must change nothing.
        assert_eq!(merge(stored.as_ref(), incoming), MergeOutcome::Rejected);
        assert_eq!(stored, after_first);
    }

    #[test]
    fn test_commutativity_over_delivery_order() {
        let base = base_task();
        let a = version(&base, 1_740_000_000_010, 0, "node-a", "From A");
        let b = version(&base, 1_740_000_000_020, 0, "node-b", "From B");

        let apply = |store: &mut Option<Task>, incoming: &Task| {
            if let MergeOutcome::Accepted(t) = merge(store.as_ref(), incoming.clone()) {
                *store = Some(t);
            }
        };

        let mut first_a_then_b = None;
        apply(&mut first_a_then_b, &a);
        apply(&mut first_a_then_b, &b);

        let mut first_b_then_a = None;
        apply(&mut first_b_then_a, &b);
        apply(&mut first_b_then_a, &a);

        assert_eq!(first_a_then_b, first_b_then_a);
        assert_eq!(first_a_then_b.unwrap().title, "From B");
    }

    #[test]
    fn test_convergence_under_duplicates_and_any_order() {
        let base = base_task();
        let versions = [
            version(&base, 1_740_000_000_010, 0, "node-a", "v1"),
            version(&base, 1_740_000_000_010, 1, "node-b", "v2"),
            version(&base, 1_740_000_000_020, 0, "node-c", "v3"),
        ];

        // Several delivery schedules, with duplicates mixed in.
        let schedules: [&[usize]; 4] = [
            &[0, 1, 2],
            &[2, 1, 0],
            &[1, 0, 2, 2, 1, 0],
            &[2, 2, 2, 0, 1],
        ];

        let mut finals = Vec::new();
        for schedule in schedules {
            let mut store: Option<Task> = None;
            for &i in schedule {
                if let MergeOutcome::Accepted(t) = merge(store.as_ref(), versions[i].clone()) {
                    store = Some(t);
                }
            }
            finals.push(store.unwrap());
        }

        for f in &finals {
            assert_eq!(f.title, "v3");
            assert_eq!(f, &finals[0]);
        }
    }

    #[test]
    fn test_tombstone_wins_when_newer() {
        let local = base_task();
        let mut incoming = version(&local, 1_740_000_000_030, 0, "node-b", "Original");
        incoming.deleted_at = Some(chrono::Utc::now());

        match merge(Some(&local), incoming) {
            MergeOutcome::Accepted(winner) => assert!(winner.deleted_at.is_some()),
            MergeOutcome::Rejected => panic!("newer tombstone must be accepted"),
        }
    }

    #[test]
    fn test_stale_update_does_not_resurrect_tombstone() {
        let mut local = base_task();
        local.deleted_at = Some(chrono::Utc::now());
        local.hlc_timestamp = Timestamp::new(1_740_000_000_050, 0, "node-a");

        let incoming = version(&local, 1_740_000_000_010, 0, "node-b", "Late edit");
        assert_eq!(merge(Some(&local), incoming), MergeOutcome::Rejected);
        assert!(local.deleted_at.is_some());
    }

    #[test]
    fn test_same_id_different_content_implies_different_version() {
        // A sanity check on the versioning invariant the merge relies on:
        // edits always restamp, so content differences imply timestamp
        // differences.
        let mut clock = crate::hlc::Clock::new("node-a");
        let mut task = Task::new("user-1", "One", 10, clock.tick());
        let v1 = task.clone();
        task.title = "Two".to_string();
        task.stamp(clock.tick());
        assert_ne!(task.hlc_timestamp, v1.hlc_timestamp);
        assert_eq!(task.id, v1.id);
    }
}
