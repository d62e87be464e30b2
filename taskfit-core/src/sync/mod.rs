//! Sync engine: wire protocol, merge application, and the HTTP client.
//!
//! ## Protocol
//!
//! One round is a single authenticated POST to `/sync`:
//! 1. The client sends every locally modified record plus the checkpoint
//!    from its previous round.
//! 2. The server merges each pushed record and reports `applied`,
//!    `stale`, or `invalid` per record; malformed records never abort the
//!    batch.
//! 3. The server returns all records of the same owner with a version
//!    newer than the checkpoint; the client merges them locally and
//!    advances its checkpoint to the highest version it saw.

mod client;
mod error;
mod protocol;
mod session;

pub use client::{Identity, SyncClient, SyncReport};
pub use error::SyncError;
pub use protocol::{
    MeResponse, PushRecordResult, PushStatus, RawSyncRequest, RawSyncResponse, SyncRequest,
    SyncResponse,
};
pub use session::{apply_remote_batch, PullOutcome};
