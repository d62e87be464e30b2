//! Taskfit Core Library
//!
//! Shared types and logic for Taskfit applications: the hybrid logical
//! clock, task and user models, last-writer-wins merge, task selection,
//! the task-string parser, and the sync client.

pub mod hlc;
pub mod merge;
pub mod models;
pub mod parser;
pub mod selection;
pub mod sync;

pub use hlc::{Clock, MalformedTimestamp, Timestamp};
pub use merge::{merge, MergeOutcome};
pub use models::{InvalidRecord, Task, TaskType, TimezoneMode, User, MAX_TAGS};
pub use parser::{parse_due_string, parse_duration, parse_task_string, ParseTaskError, ParsedTask};
pub use selection::{find_fitting_tasks, is_in_quiet_hours, SelectionError};
pub use sync::{
    apply_remote_batch, Identity, MeResponse, PullOutcome, PushRecordResult, PushStatus,
    RawSyncRequest, RawSyncResponse, SyncClient, SyncError, SyncReport, SyncRequest, SyncResponse,
};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
