//! Runs the one-time initial sync: walks the remote namespace, downloads
//! everything into a staging area, then swaps it into place. Durable state
//! (the ParkTable, the change cursor, the "initialized" flag) is only
//! committed once the staging directory has successfully replaced the sync
//! root.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::{self, Config};
use crate::download::{self, DownloadPoolConfig};
use crate::error::FatalError;
use crate::namespace::NamespaceSnapshot;
use crate::parktable::{ParkFile, ParkTable};
use crate::remote::RemoteClient;
use crate::walker;

#[cfg(unix)]
fn create_dir_0755(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::create_dir_all(path)?;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn create_dir_0755(path: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(path)
}

/// Run the initial sync exactly once. Refuses to run against a sync root
/// that already exists and is non-empty. `state_dir` holds the durable
/// `parkTable`/`page_token`/`config.toml` files.
pub async fn run(client: Arc<dyn RemoteClient>, config: &Config, state_dir: &Path) -> Result<()> {
    let sync_root = &config.local_dir;
    if config::dir_is_nonempty(sync_root)? {
        return Err(FatalError::SyncRootAlreadyExists {
            path: sync_root.display().to_string(),
        }
        .into());
    }

    // Step 1: capture the cursor before listing so nothing mutated during
    // the walk is missed by the subsequent change stream.
    let cursor = client
        .start_page_token()
        .await
        .context("failed to capture starting change cursor")?;

    // Step 2: fresh staging directory, on the same volume, outside the
    // sync root.
    let staging_parent = sync_root
        .parent()
        .context("sync root has no parent directory")?;
    std::fs::create_dir_all(staging_parent)
        .with_context(|| format!("failed to create {}", staging_parent.display()))?;
    let staging = tempfile::Builder::new()
        .prefix(".park-staging-")
        .tempdir_in(staging_parent)
        .context("failed to create staging directory")?;

    let park_table = build_staged_table(client.clone(), staging.path(), sync_root).await?;
    // On error above, the staging directory is removed by `staging`'s Drop
    // impl (best effort); persisted state remains uninitialized.

    // Steps 6-8 form a single logical transaction: persist the table (with
    // paths already rewritten to their final location), rename staging into
    // place, then persist the cursor and flip "initialized".
    park_table
        .persist(&config::park_table_path_in(state_dir))
        .map_err(FatalError::StatePersist)?;

    std::fs::rename(staging.path(), sync_root).map_err(FatalError::StagingRename)?;

    config::persist_cursor_to(state_dir, &cursor).map_err(FatalError::StatePersist)?;

    let mut updated = config.clone();
    updated.is_initialized = true;
    updated.persist(state_dir).map_err(FatalError::StatePersist)?;

    tracing::info!(target: "orchestrator", root = %sync_root.display(), "Initial sync complete");
    Ok(())
}

async fn build_staged_table(
    client: Arc<dyn RemoteClient>,
    staging_root: &Path,
    final_root: &Path,
) -> Result<ParkTable> {
    // Step 3: walk + resolve.
    let snapshot: NamespaceSnapshot = walker::walk(client.as_ref())
        .await
        .context("walking remote namespace")?;

    // Step 4: materialize the empty folder skeleton.
    for folder in snapshot.folders() {
        if let Some(relative) = snapshot.resolve_path(&folder.id) {
            let path = staging_root.join(relative);
            create_dir_0755(&path)
                .with_context(|| format!("failed to create directory {}", path.display()))?;
        }
    }

    // Step 5: run the download pool against the staging root.
    let downloaded = download::run(client, &snapshot, staging_root, DownloadPoolConfig::default())
        .await
        .context("running download pool")?;

    // Step 6 (partial): rewrite each entry's path to its final location.
    let table = ParkTable::new_empty(final_root.to_path_buf());
    for (id, park_file) in downloaded {
        let relative = park_file
            .local_path
            .strip_prefix(staging_root)
            .context("downloaded path was not under the staging root")?
            .to_path_buf();
        table.insert_ready(ParkFile {
            file_id: id,
            local_path: final_root.join(relative),
            content_hash: park_file.content_hash,
        });
    }

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::fake::FakeRemoteClient;
    use crate::remote::{FileId, RemoteEntry};

    fn folder(id: &str, name: &str, parent: &str) -> RemoteEntry {
        RemoteEntry {
            id: FileId::new(id),
            name: name.to_string(),
            mime_type: "folder".to_string(),
            parents: vec![FileId::new(parent)],
            shortcut_target: None,
            drive_id: None,
            trashed: false,
        }
    }

    fn file(id: &str, name: &str, parent: &str) -> RemoteEntry {
        RemoteEntry {
            id: FileId::new(id),
            name: name.to_string(),
            mime_type: "file".to_string(),
            parents: vec![FileId::new(parent)],
            shortcut_target: None,
            drive_id: None,
            trashed: false,
        }
    }

    #[tokio::test]
    async fn initial_sync_populates_sync_root() {
        let fake = Arc::new(FakeRemoteClient::new());
        fake.insert_entry(folder("folder-a", "a", "root"));
        fake.insert_entry(file("f1", "hello.txt", "folder-a"));
        fake.set_body(FileId::new("f1"), b"hello".to_vec());
        fake.set_start_token("cursor-0");

        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default_for_home().unwrap();
        config.local_dir = dir.path().join("sync-root");

        // Exercises the staged-table construction helper in isolation, ahead
        // of the rename into the final sync root; see
        // `run_performs_full_initial_sync` below for the end-to-end path
        // through the public entry point.
        let staging = tempfile::tempdir().unwrap();
        let client: Arc<dyn RemoteClient> = fake;
        let table = build_staged_table(client, staging.path(), &config.local_dir)
            .await
            .unwrap();

        assert_eq!(table.len(), 1);
        let entry = table.get(&FileId::new("f1")).unwrap();
        assert_eq!(entry.local_path, config.local_dir.join("a").join("hello.txt"));
    }

    #[tokio::test]
    async fn refuses_when_sync_root_nonempty() {
        let fake = Arc::new(FakeRemoteClient::new());
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("sync-root");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("existing.txt"), b"x").unwrap();

        let mut config = Config::default_for_home().unwrap();
        config.local_dir = root;
        let state_dir = dir.path().join("state");

        let err = run(fake, &config, &state_dir).await.unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[tokio::test]
    async fn run_performs_full_initial_sync() {
        let fake = Arc::new(FakeRemoteClient::new());
        fake.insert_entry(folder("folder-a", "a", "root"));
        fake.insert_entry(file("f1", "hello.txt", "folder-a"));
        fake.set_body(FileId::new("f1"), b"hello".to_vec());
        fake.set_start_token("cursor-0");

        let dir = tempfile::tempdir().unwrap();
        let state_dir = dir.path().join("state");
        let mut config = Config::default_for_home().unwrap();
        config.local_dir = dir.path().join("sync-root");

        let client: Arc<dyn RemoteClient> = fake;
        run(client, &config, &state_dir).await.unwrap();

        // The sync root was populated with the downloaded file at its
        // resolved path.
        assert_eq!(
            std::fs::read(config.local_dir.join("a").join("hello.txt")).unwrap(),
            b"hello"
        );

        // The ParkTable was persisted with the file entry pointing at its
        // final (post-rename) location.
        let table = ParkTable::load(
            config.local_dir.clone(),
            &config::park_table_path_in(&state_dir),
        )
        .unwrap();
        assert_eq!(table.len(), 1);
        let entry = table.get(&FileId::new("f1")).unwrap();
        assert_eq!(
            entry.local_path,
            config.local_dir.join("a").join("hello.txt")
        );

        // The cursor captured before the walk was persisted, and the config
        // was rewritten with `is_initialized = true`.
        assert_eq!(
            config::load_cursor_from(&state_dir).unwrap().as_deref(),
            Some("cursor-0")
        );
        let updated_config = Config::load(&state_dir).unwrap();
        assert!(updated_config.is_initialized);
    }
}
