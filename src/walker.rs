//! Paginated depth-first enumeration of the remote namespace, applying the
//! namespace resolver's shortcut-rewriting rules as it goes: shared-drive
//! entries are skipped, and shortcuts are resolved to their targets rather
//! than recorded as themselves.

use anyhow::{Context, Result};

use crate::namespace::{NamespaceSnapshot, VisitedSet};
use crate::remote::{root_id, FileId, RemoteClient, RemoteEntry, FOLDER_MIME_TYPE};

/// Walk the whole remote namespace from the synthetic root and return the
/// accumulated `NamespaceSnapshot`. Does no disk I/O and never touches the
/// ParkTable.
pub async fn walk(client: &dyn RemoteClient) -> Result<NamespaceSnapshot> {
    let mut snapshot = NamespaceSnapshot::new();
    let mut visited = VisitedSet::new();
    walk_folder(client, &root_id(), &mut snapshot, &mut visited).await?;
    Ok(snapshot)
}

fn walk_folder<'a>(
    client: &'a dyn RemoteClient,
    folder_id: &'a FileId,
    snapshot: &'a mut NamespaceSnapshot,
    visited: &'a mut VisitedSet,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>> {
    Box::pin(async move {
        let mut page_token: Option<String> = None;
        loop {
            let page = client
                .list_children(folder_id, page_token.as_deref())
                .await
                .with_context(|| format!("listing children of {folder_id}"))?;

            for child in page.items {
                let child_name = child.name.clone();
                if let Err(e) = handle_child(client, folder_id, child, snapshot, visited).await {
                    tracing::warn!(target: "walker", file = %child_name, error = %e, "skipping entry");
                }
            }

            page_token = page.next_page_token;
            if page_token.is_none() {
                break;
            }
        }
        Ok(())
    })
}

async fn handle_child(
    client: &dyn RemoteClient,
    folder_id: &FileId,
    child: RemoteEntry,
    snapshot: &mut NamespaceSnapshot,
    visited: &mut VisitedSet,
) -> Result<()> {
    if child.is_shared_drive() {
        return Ok(());
    }

    if child.is_folder() {
        if !visited.insert(child.id.clone()) {
            return Ok(());
        }
        let child_id = child.id.clone();
        walk_folder(client, &child_id, snapshot, visited).await?;
        snapshot.record(folder_id.clone(), child);
        return Ok(());
    }

    if child.is_shortcut() {
        let target = child
            .shortcut_target
            .clone()
            .context("shortcut entry missing target details")?;

        if !visited.insert(target.id.clone()) {
            return Ok(());
        }

        if target.mime_type == FOLDER_MIME_TYPE {
            walk_folder(client, &target.id, snapshot, visited).await?;
        }

        let target_entry = client
            .get_metadata(&target.id)
            .await
            .with_context(|| format!("fetching shortcut target {}", target.id))?;
        snapshot.record(folder_id.clone(), target_entry);
        return Ok(());
    }

    // REGULAR file.
    if !visited.insert(child.id.clone()) {
        return Ok(());
    }
    snapshot.record(folder_id.clone(), child);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::fake::FakeRemoteClient;
    use crate::remote::{RemoteEntry, ShortcutTarget};

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
    async fn walks_nested_folders() {
        let fake = FakeRemoteClient::new();
        fake.insert_entry(folder("folder-a", "a", "root"));
        fake.insert_entry(file("file-b", "b.txt", "folder-a"));

        let snapshot = walk(&fake).await.unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(
            snapshot.resolve_path(&FileId::new("file-b")).unwrap(),
            std::path::PathBuf::from("a").join("b.txt")
        );
    }

    #[tokio::test]
    async fn skips_shared_drive_entries() {
        let fake = FakeRemoteClient::new();
        let mut shared = file("shared-1", "shared.txt", "root");
        shared.drive_id = Some("drive-x".to_string());
        fake.insert_entry(shared);

        let snapshot = walk(&fake).await.unwrap();
        assert!(snapshot.is_empty());
    }

    #[tokio::test]
    async fn rewrites_shortcut_to_regular_file() {
        let fake = FakeRemoteClient::new();
        fake.insert_entry(file("target-1", "real.txt", "some-other-folder"));

        let mut shortcut = file("shortcut-1", "link.txt", "root");
        shortcut.mime_type = "shortcut".to_string();
        shortcut.shortcut_target = Some(ShortcutTarget {
            id: FileId::new("target-1"),
            mime_type: "file".to_string(),
        });
        fake.insert_entry(shortcut);

        let snapshot = walk(&fake).await.unwrap();
        // The shortcut itself is never recorded; the target is, under the
        // shortcut's parent.
        assert!(!snapshot.contains(&FileId::new("shortcut-1")));
        let entry = snapshot.get(&FileId::new("target-1")).unwrap();
        assert_eq!(entry.name, "real.txt");
        assert_eq!(
            snapshot.resolve_path(&FileId::new("target-1")).unwrap(),
            std::path::PathBuf::from("real.txt")
        );
    }

    #[tokio::test]
    async fn shortcut_target_visited_once() {
        let fake = FakeRemoteClient::new();
        fake.insert_entry(file("target-1", "real.txt", "elsewhere"));

        let mut shortcut_a = file("shortcut-a", "link-a.txt", "root");
        shortcut_a.mime_type = "shortcut".to_string();
        shortcut_a.shortcut_target = Some(ShortcutTarget {
            id: FileId::new("target-1"),
            mime_type: "file".to_string(),
        });
        fake.insert_entry(shortcut_a);

        let mut shortcut_b = file("shortcut-b", "link-b.txt", "root");
        shortcut_b.mime_type = "shortcut".to_string();
        shortcut_b.shortcut_target = Some(ShortcutTarget {
            id: FileId::new("target-1"),
            mime_type: "file".to_string(),
        });
        fake.insert_entry(shortcut_b);

        let snapshot = walk(&fake).await.unwrap();
        // Only one copy of the target is recorded despite two shortcuts.
        assert_eq!(snapshot.len(), 1);
    }

    #[tokio::test]
    async fn shortcut_to_folder_target_recurses_and_is_recorded_once() {
        let fake = FakeRemoteClient::new();
        fake.insert_entry(folder("target-folder", "shared-folder", "elsewhere"));
        fake.insert_entry(file("child-1", "child.txt", "target-folder"));

        let mut shortcut = file("shortcut-1", "link", "root");
        shortcut.mime_type = "shortcut".to_string();
        shortcut.shortcut_target = Some(ShortcutTarget {
            id: FileId::new("target-folder"),
            mime_type: FOLDER_MIME_TYPE.to_string(),
        });
        fake.insert_entry(shortcut);

        let snapshot = walk(&fake).await.unwrap();

        // The shortcut itself is never recorded; its target folder and the
        // folder's own child are, each exactly once.
        assert!(!snapshot.contains(&FileId::new("shortcut-1")));
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.contains(&FileId::new("target-folder")));
        assert!(snapshot.contains(&FileId::new("child-1")));

        assert_eq!(
            snapshot.resolve_path(&FileId::new("child-1")).unwrap(),
            std::path::PathBuf::from("shared-folder").join("child.txt")
        );
    }
}
