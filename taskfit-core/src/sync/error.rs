//! Sync error types.

use thiserror::Error;

/// Errors that abort a sync round.
///
/// All of these are round-level: local state is untouched when they fire,
/// and the round can simply be re-run later. Record-level problems are not
/// errors here — they come back as per-record results in the round report.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Sync is not configured.
    #[error("Sync not configured. Add server_url and api_key to the config.")]
    NotConfigured,

    /// The server rejected our credentials before processing anything.
    #[error("Authentication rejected by the server. Check the api_key.")]
    Unauthorized,

    /// The server answered with an unexpected status.
    #[error("Server returned status {0}")]
    ServerStatus(u16),

    /// Transport-level failure (connect, send, or decode).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
