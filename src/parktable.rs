//! ParkTable: the durable `FileId -> {local_path, content_hash}` mapping
//! backing the sync root. Stored as a colon-delimited flat file
//! (`path:fileId:base64(hash)`, one record per line) and rewritten
//! atomically on every persist. The in-memory map is guarded by a single
//! mutex; the filesystem writes themselves need no lock, since the paths
//! involved are disjoint by construction.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use base64::Engine;
use futures::StreamExt;
use sha3::{Digest, Sha3_256};
use tokio::io::AsyncWriteExt;

use crate::error::ParkTableError;
use crate::remote::{ByteStream, FileId};

pub type ContentHash = [u8; 32];

/// A single durable record: a remote file, the local path it was
/// materialized to, and the hash of the bytes actually on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParkFile {
    pub file_id: FileId,
    pub local_path: PathBuf,
    pub content_hash: ContentHash,
}

impl ParkFile {
    fn serialize(&self) -> String {
        let encoded = base64::engine::general_purpose::STANDARD.encode(self.content_hash);
        format!("{}:{}:{}", self.local_path.display(), self.file_id, encoded)
    }

    fn deserialize(line: &str) -> Result<Self, ParkTableError> {
        let mut parts = line.splitn(3, ':');
        let path = parts
            .next()
            .ok_or_else(|| ParkTableError::Malformed(line.to_string()))?;
        let file_id = parts
            .next()
            .ok_or_else(|| ParkTableError::Malformed(line.to_string()))?;
        let hash_b64 = parts
            .next()
            .ok_or_else(|| ParkTableError::Malformed(line.to_string()))?;

        let content_hash = if hash_b64.is_empty() {
            [0u8; 32]
        } else {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(hash_b64)
                .map_err(|e| ParkTableError::Malformed(format!("bad hash in {line:?}: {e}")))?;
            bytes
                .try_into()
                .map_err(|_| ParkTableError::Malformed(format!("wrong hash length in {line:?}")))?
        };

        Ok(ParkFile {
            file_id: FileId::new(file_id),
            local_path: PathBuf::from(path),
            content_hash,
        })
    }
}

/// The durable `FileId -> ParkFile` mapping, plus the sync root it is
/// anchored to (invariant 1: every `local_path` lies strictly beneath it).
pub struct ParkTable {
    root: PathBuf,
    files: Mutex<HashMap<FileId, ParkFile>>,
}

impl ParkTable {
    /// A fresh, empty table anchored at `root`. Used by the initial sync
    /// orchestrator when building the table from scratch.
    pub fn new_empty(root: PathBuf) -> Self {
        Self {
            root,
            files: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Load the serialized form from `<root>/../.config/park/parkTable`-style
    /// location. A missing file is not an error — it means "uninitialized"
    /// and is handled by the orchestrator, not here.
    pub fn load(root: PathBuf, table_path: &Path) -> anyhow::Result<Self> {
        if !table_path.exists() {
            return Ok(Self::new_empty(root));
        }

        let content = std::fs::read_to_string(table_path)?;
        let mut files = HashMap::new();
        for line in content.lines() {
            if line.is_empty() {
                continue;
            }
            let park_file = ParkFile::deserialize(line)?;
            files.insert(park_file.file_id.clone(), park_file);
        }

        Ok(Self {
            root,
            files: Mutex::new(files),
        })
    }

    /// Write the whole table atomically: sibling temp file, fsync, rename.
    pub fn persist(&self, table_path: &Path) -> anyhow::Result<()> {
        let files = self.files.lock().unwrap();
        let mut body = String::new();
        for file in files.values() {
            body.push_str(&file.serialize());
            body.push('\n');
        }
        drop(files);

        if let Some(parent) = table_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp_path = table_path.with_extension("tmp");
        let mut tmp = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;
        use std::io::Write;
        tmp.write_all(body.as_bytes())?;
        tmp.sync_all()?;
        drop(tmp);
        std::fs::rename(&tmp_path, table_path)?;

        tracing::debug!(target: "parktable", entries = self.len(), path = %table_path.display(), "Persisted park table");
        Ok(())
    }

    pub fn exists(&self, id: &FileId) -> bool {
        self.files.lock().unwrap().contains_key(id)
    }

    pub fn get(&self, id: &FileId) -> Option<ParkFile> {
        self.files.lock().unwrap().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.files.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<ParkFile> {
        self.files.lock().unwrap().values().cloned().collect()
    }

    /// Insert an already-materialized `ParkFile` directly, bypassing the
    /// streaming write. Used by the Download Pool / Initial Sync
    /// Orchestrator, which already wrote and hashed the bytes themselves.
    pub fn insert_ready(&self, file: ParkFile) {
        self.files.lock().unwrap().insert(file.file_id.clone(), file);
    }

    /// Write `stream` to `root/name`, hashing while copying, then insert a
    /// new entry. Fails if `id` is already present. Closes the stream on
    /// every exit path (by virtue of dropping it once consumed or on error).
    pub async fn create(
        &self,
        id: FileId,
        name: &str,
        stream: ByteStream,
    ) -> Result<(), ParkTableError> {
        if self.exists(&id) {
            return Err(ParkTableError::AlreadyExists(id.to_string()));
        }

        let local_path = self.root.join(name);
        let hash = write_stream_to_file(&local_path, stream).await?;

        self.files.lock().unwrap().insert(
            id.clone(),
            ParkFile {
                file_id: id,
                local_path,
                content_hash: hash,
            },
        );
        Ok(())
    }

    /// Truncate and rewrite the existing file at the stored path,
    /// recomputing the hash. Fails if `id` is absent.
    pub async fn update(&self, id: &FileId, stream: ByteStream) -> Result<(), ParkTableError> {
        let local_path = {
            let files = self.files.lock().unwrap();
            files
                .get(id)
                .map(|f| f.local_path.clone())
                .ok_or_else(|| ParkTableError::NotFound(id.to_string()))?
        };

        let hash = write_stream_to_file(&local_path, stream).await?;

        self.files.lock().unwrap().insert(
            id.clone(),
            ParkFile {
                file_id: id.clone(),
                local_path,
                content_hash: hash,
            },
        );
        Ok(())
    }

    /// Delete the file from disk and the entry from the map. Idempotent:
    /// removing an absent id is a no-op.
    pub fn remove(&self, id: &FileId) -> Result<(), ParkTableError> {
        let removed = self.files.lock().unwrap().remove(id);
        if let Some(file) = removed {
            match std::fs::remove_file(&file.local_path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(ParkTableError::Io(e)),
            }
        }
        Ok(())
    }
}

pub(crate) async fn write_stream_to_file(
    path: &Path,
    mut stream: ByteStream,
) -> Result<ContentHash, ParkTableError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .await?;

    let mut hasher = Sha3_256::new();
    while let Some(chunk) = stream.next().await {
        let bytes = chunk?;
        hasher.update(&bytes);
        file.write_all(&bytes).await?;
    }
    file.flush().await?;
    file.sync_all().await?;

    Ok(hasher.finalize().into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn make_stream(content: &'static [u8]) -> ByteStream {
        Box::pin(stream::once(async move { Ok(bytes::Bytes::from(content)) }))
    }

    #[test]
    fn serialize_round_trips() {
        let file = ParkFile {
            file_id: FileId::new("abc"),
            local_path: PathBuf::from("/home/user/park-drive/a.txt"),
            content_hash: [7u8; 32],
        };
        let line = file.serialize();
        let parsed = ParkFile::deserialize(&line).unwrap();
        assert_eq!(parsed, file);
    }

    #[test]
    fn deserialize_empty_hash_segment() {
        let line = "/home/user/park-drive/a.txt:abc:";
        let parsed = ParkFile::deserialize(line).unwrap();
        assert_eq!(parsed.content_hash, [0u8; 32]);
    }

    #[tokio::test]
    async fn create_then_persist_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("sync-root");
        std::fs::create_dir_all(&root).unwrap();
        let table_path = dir.path().join("state").join("parkTable");

        let table = ParkTable::new_empty(root.clone());
        table
            .create(FileId::new("f1"), "a.txt", make_stream(b"hello"))
            .await
            .unwrap();
        table.persist(&table_path).unwrap();

        let loaded = ParkTable::load(root, &table_path).unwrap();
        assert_eq!(loaded.len(), 1);
        let entry = loaded.get(&FileId::new("f1")).unwrap();
        assert_eq!(std::fs::read(&entry.local_path).unwrap(), b"hello");

        let mut hasher = Sha3_256::new();
        hasher.update(b"hello");
        let expected: ContentHash = hasher.finalize().into();
        assert_eq!(entry.content_hash, expected);
    }

    #[tokio::test]
    async fn create_twice_fails() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let table = ParkTable::new_empty(root);
        table
            .create(FileId::new("f1"), "a.txt", make_stream(b"hello"))
            .await
            .unwrap();
        let err = table
            .create(FileId::new("f1"), "a.txt", make_stream(b"again"))
            .await
            .unwrap_err();
        assert!(matches!(err, ParkTableError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn update_missing_fails() {
        let dir = tempfile::tempdir().unwrap();
        let table = ParkTable::new_empty(dir.path().to_path_buf());
        let err = table
            .update(&FileId::new("missing"), make_stream(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, ParkTableError::NotFound(_)));
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let table = ParkTable::new_empty(root);
        table
            .create(FileId::new("f1"), "a.txt", make_stream(b"hello"))
            .await
            .unwrap();

        table.remove(&FileId::new("f1")).unwrap();
        assert!(!table.exists(&FileId::new("f1")));
        // Second removal of the same id is a no-op, not an error.
        table.remove(&FileId::new("f1")).unwrap();
    }

    #[tokio::test]
    async fn update_rewrites_content_and_hash() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let table = ParkTable::new_empty(root);
        table
            .create(FileId::new("f1"), "a.txt", make_stream(b"hello"))
            .await
            .unwrap();
        table
            .update(&FileId::new("f1"), make_stream(b"goodbye"))
            .await
            .unwrap();

        let entry = table.get(&FileId::new("f1")).unwrap();
        assert_eq!(std::fs::read(&entry.local_path).unwrap(), b"goodbye");
    }
}
