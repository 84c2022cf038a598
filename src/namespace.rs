//! Turns the flat `{entries, parentOf}` maps the walker accumulates into
//! relative filesystem paths, and hosts the `VisitedSet` bookkeeping the
//! walker uses to keep shortcut targets from being walked or downloaded more
//! than once.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use crate::remote::{EntryMap, FileId, RemoteEntry};

/// Ids already visited as a shortcut target, so a file reachable through both
/// its real location and a shortcut is only walked/downloaded once (spec
/// §4.2, last sentence).
pub type VisitedSet = HashSet<FileId>;

/// The accumulated result of a walk: every folder/file entry the walker
/// decided to keep, plus the parent link used to reconstruct paths.
#[derive(Debug, Default, Clone)]
pub struct NamespaceSnapshot {
    entries: EntryMap,
    parent_of: HashMap<FileId, FileId>,
}

impl NamespaceSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `entry` as living under `parent`. Called by the walker for
    /// every FOLDER and REGULAR entry it keeps (shortcuts are rewritten to
    /// their target's id before this is called).
    pub fn record(&mut self, parent: FileId, entry: RemoteEntry) {
        let id = entry.id.clone();
        self.parent_of.insert(id.clone(), parent);
        self.entries.insert(id, entry);
    }

    pub fn entries(&self) -> &EntryMap {
        &self.entries
    }

    pub fn get(&self, id: &FileId) -> Option<&RemoteEntry> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &FileId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn folders(&self) -> impl Iterator<Item = &RemoteEntry> {
        self.entries.values().filter(|e| e.is_folder())
    }

    pub fn non_folders(&self) -> impl Iterator<Item = &RemoteEntry> {
        self.entries.values().filter(|e| !e.is_folder())
    }

    /// Resolve the relative filesystem path for `id` by walking parent links
    /// to the root: start with `name(id)`, prepend `name(parentOf[id])` while
    /// the parent is a known entry, and stop at the first missing parent.
    pub fn resolve_path(&self, id: &FileId) -> Option<PathBuf> {
        let entry = self.entries.get(id)?;
        let mut components = vec![entry.name.clone()];

        let mut current = id.clone();
        while let Some(parent_id) = self.parent_of.get(&current) {
            match self.entries.get(parent_id) {
                Some(parent_entry) => {
                    components.push(parent_entry.name.clone());
                    current = parent_id.clone();
                }
                None => break,
            }
        }

        components.reverse();
        Some(components.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, name: &str, mime_type: &str, parents: Vec<&str>) -> RemoteEntry {
        RemoteEntry {
            id: FileId::new(id),
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            parents: parents.into_iter().map(FileId::new).collect(),
            shortcut_target: None,
            drive_id: None,
            trashed: false,
        }
    }

    #[test]
    fn resolves_nested_path() {
        let mut snapshot = NamespaceSnapshot::new();
        snapshot.record(
            FileId::new("root"),
            entry("folder-a", "a", "folder", vec!["root"]),
        );
        snapshot.record(
            FileId::new("folder-a"),
            entry("file-b", "b.txt", "file", vec!["folder-a"]),
        );

        let path = snapshot.resolve_path(&FileId::new("file-b")).unwrap();
        assert_eq!(path, PathBuf::from("a").join("b.txt"));
    }

    #[test]
    fn stops_at_first_missing_parent() {
        let mut snapshot = NamespaceSnapshot::new();
        // "root" is never itself recorded as an entry: it's the synthetic
        // root, so the walk up the parent chain should stop there.
        snapshot.record(
            FileId::new("root"),
            entry("folder-a", "a", "folder", vec!["root"]),
        );

        let path = snapshot.resolve_path(&FileId::new("folder-a")).unwrap();
        assert_eq!(path, PathBuf::from("a"));
    }

    #[test]
    fn unknown_id_resolves_to_none() {
        let snapshot = NamespaceSnapshot::new();
        assert!(snapshot.resolve_path(&FileId::new("missing")).is_none());
    }

    #[test]
    fn folders_and_non_folders_partition_entries() {
        let mut snapshot = NamespaceSnapshot::new();
        snapshot.record(
            FileId::new("root"),
            entry("folder-a", "a", "folder", vec!["root"]),
        );
        snapshot.record(
            FileId::new("folder-a"),
            entry("file-b", "b.txt", "file", vec!["folder-a"]),
        );

        assert_eq!(snapshot.folders().count(), 1);
        assert_eq!(snapshot.non_folders().count(), 1);
    }
}
