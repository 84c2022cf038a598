//! Runs the local watcher in the background while the main task periodically
//! invokes the change applier, until cancelled. Watcher events are logged but
//! not otherwise acted on; the change applier is what actually mutates local
//! state.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use crate::changes;
use crate::config::Config;
use crate::parktable::ParkTable;
use crate::remote::RemoteClient;
use crate::watcher::LocalWatcher;

/// Run the daemon loop until `cancel` fires. On cancellation, waits for any
/// in-flight change batch to finish, closes the watcher, and returns.
pub async fn run(
    client: Arc<dyn RemoteClient>,
    config: Config,
    state_dir: PathBuf,
    table: Arc<ParkTable>,
    cancel: CancellationToken,
) -> Result<()> {
    let mut watcher = LocalWatcher::new(config.local_dir.clone())
        .context("could not start local watcher")?;

    let watcher_cancel = cancel.clone();
    let watcher_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = watcher_cancel.cancelled() => break,
                event = watcher.recv() => {
                    match event {
                        Some(event) => tracing::debug!(
                            target: "daemon",
                            path = %event.path.display(),
                            op = ?event.op,
                            "received local watcher event"
                        ),
                        None => break,
                    }
                }
            }
        }
        watcher.close();
    });

    let interval = config.sync_interval();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {
                if let Err(e) = changes::apply(&client, &table, &state_dir).await {
                    tracing::warn!(
                        target: "daemon",
                        error = %e,
                        "change batch failed; will retry next interval"
                    );
                }
            }
        }
    }

    watcher_task
        .await
        .context("local watcher task panicked")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config;
    use crate::remote::fake::FakeRemoteClient;
    use std::time::Duration;
    use tempfile::tempdir;

    #[tokio::test]
    async fn daemon_applies_changes_until_cancelled() {
        let tmp = tempdir().unwrap();
        let state_dir = tmp.path().join("state");
        let sync_root = tmp.path().join("sync-root");
        std::fs::create_dir_all(&sync_root).unwrap();

        let fake = Arc::new(FakeRemoteClient::new());
        fake.set_start_token("cursor-0");
        config::persist_cursor_to(&state_dir, "cursor-0").unwrap();

        let mut config = Config::default_for_home().unwrap();
        config.local_dir = sync_root;
        config.sync_interval_secs = 0;

        let table = Arc::new(ParkTable::new_empty(config.local_dir.clone()));
        let cancel = CancellationToken::new();
        let cancel_clone = cancel.clone();

        let client: Arc<dyn RemoteClient> = fake;
        let daemon = tokio::spawn(run(client, config, state_dir.clone(), table, cancel));

        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel_clone.cancel();
        daemon.await.unwrap().unwrap();

        assert!(config::load_cursor_from(&state_dir).unwrap().is_some());
    }
}
