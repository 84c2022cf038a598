//! Crate-wide error taxonomy: errors that abort the current command outright,
//! errors that abort only the current change batch, and errors from a single
//! ParkTable operation. Leaf error enums are `thiserror`-derived so callers
//! can match on kind; wiring code attaches context with `anyhow`.

use thiserror::Error;

/// Errors that abort the whole command (`init`/`daemon`/`config`) immediately.
#[derive(Debug, Error)]
pub enum FatalError {
    #[error("sync root {path} already exists and is not empty")]
    SyncRootAlreadyExists { path: String },

    #[error("durable state could not be persisted: {0}")]
    StatePersist(#[source] anyhow::Error),

    #[error("could not rename staging directory into sync root: {0}")]
    StagingRename(#[source] std::io::Error),

    #[error("credential provider failed: {0}")]
    Credentials(#[source] anyhow::Error),
}

/// Errors that abort only the current change batch; the daemon loop continues
/// and retries the same batch on its next tick.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("failed to fetch change list: {0}")]
    FetchChanges(#[source] anyhow::Error),

    #[error("failed to apply change for file {file_id}: {source}")]
    ApplyChange {
        file_id: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Errors belonging to a single ParkTable operation.
#[derive(Debug, Error)]
pub enum ParkTableError {
    #[error("file id {0} already present in park table")]
    AlreadyExists(String),

    #[error("file id {0} not found in park table")]
    NotFound(String),

    #[error("park table record malformed: {0}")]
    Malformed(String),

    #[error("io error operating on park table: {0}")]
    Io(#[source] std::io::Error),

    #[error("attempted to persist an uninitialized park table")]
    Uninitialized,
}

impl From<std::io::Error> for ParkTableError {
    fn from(err: std::io::Error) -> Self {
        ParkTableError::Io(err)
    }
}
