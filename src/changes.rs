//! Polls the remote change stream and applies it to the ParkTable, advancing
//! the cursor only after every change in the batch has been applied
//! successfully.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

use crate::config;
use crate::error::BatchError;
use crate::parktable::ParkTable;
use crate::remote::{Change, FileId, RemoteClient, FOLDER_MIME_TYPE};

const SHARED_DRIVE_CHANGE_TYPE: &str = "drive";

/// Fetch and apply one batch of changes. Preconditions: the ParkTable is
/// already initialized. `state_dir` holds the durable cursor/parkTable files.
/// Returns the number of changes actually applied (ignored entries do not
/// count).
pub async fn apply(
    client: &Arc<dyn RemoteClient>,
    table: &ParkTable,
    state_dir: &Path,
) -> Result<usize, BatchError> {
    let cursor = match config::load_cursor_from(state_dir).map_err(BatchError::FetchChanges)? {
        Some(cursor) => cursor,
        None => {
            // First poll after initialization: there is no prior cursor yet,
            // so fetch a fresh start-cursor and treat the batch as empty.
            let fresh = client
                .start_page_token()
                .await
                .map_err(BatchError::FetchChanges)?;
            config::persist_cursor_to(state_dir, &fresh).map_err(BatchError::FetchChanges)?;
            return Ok(0);
        }
    };

    let response = client
        .changes(&cursor)
        .await
        .map_err(BatchError::FetchChanges)?;

    let mut applied = 0usize;
    for change in &response.items {
        if apply_one(client, table, change).await? {
            applied += 1;
        }
    }

    table
        .persist(&config::park_table_path_in(state_dir))
        .map_err(|e| BatchError::ApplyChange {
            file_id: "<batch>".to_string(),
            source: e,
        })?;
    config::persist_cursor_to(state_dir, &response.new_start_page_token)
        .map_err(BatchError::FetchChanges)?;

    tracing::debug!(
        target: "changes",
        applied,
        cursor = %response.new_start_page_token,
        "Applied change batch"
    );
    Ok(applied)
}

/// Apply a single change. Returns `Ok(true)` if it resulted in a mutation,
/// `Ok(false)` if it was ignored per spec classification rules.
async fn apply_one(
    client: &Arc<dyn RemoteClient>,
    table: &ParkTable,
    change: &Change,
) -> Result<bool, BatchError> {
    if change.change_type == SHARED_DRIVE_CHANGE_TYPE {
        return Ok(false);
    }

    if let Some(file) = &change.file {
        if file.mime_type == FOLDER_MIME_TYPE {
            // Folder topology is intentionally not tracked incrementally.
            return Ok(false);
        }
    }

    let removed = change.removed || change.file.as_ref().is_some_and(|f| f.trashed);
    if removed {
        table
            .remove(&change.file_id)
            .map_err(|e| BatchError::ApplyChange {
                file_id: change.file_id.to_string(),
                source: e.into(),
            })?;
        return Ok(true);
    }

    apply_create_or_update(client, table, &change.file_id).await?;
    Ok(true)
}

async fn apply_create_or_update(
    client: &Arc<dyn RemoteClient>,
    table: &ParkTable,
    file_id: &FileId,
) -> Result<(), BatchError> {
    let known = table.exists(file_id);

    let stream = client
        .download_body(file_id)
        .await
        .map_err(|e| BatchError::ApplyChange {
            file_id: file_id.to_string(),
            source: e,
        })?;

    if known {
        table
            .update(file_id, stream)
            .await
            .map_err(|e| BatchError::ApplyChange {
                file_id: file_id.to_string(),
                source: e.into(),
            })
    } else {
        let entry = client
            .get_metadata(file_id)
            .await
            .with_context(|| format!("fetching metadata for {file_id}"))
            .map_err(|e| BatchError::ApplyChange {
                file_id: file_id.to_string(),
                source: e,
            })?;

        table
            .create(file_id.clone(), &entry.name, stream)
            .await
            .map_err(|e| BatchError::ApplyChange {
                file_id: file_id.to_string(),
                source: e.into(),
            })
    }
}
