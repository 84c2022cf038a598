//! The remote API transport contract: described here only at its interface,
//! so the rest of the crate never depends on a concrete vendor's wire shape.
//! Production wiring uses [`client::HttpRemoteClient`]; tests substitute
//! [`fake::FakeRemoteClient`].

pub mod client;
#[cfg(any(test, feature = "test-util"))]
pub mod fake;

use std::collections::HashMap;
use std::fmt;
use std::pin::Pin;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use serde::{Deserialize, Serialize};

/// Opaque, remote-issued file identifier. Stable across renames/moves.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileId(pub String);

impl FileId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for FileId {
    fn from(value: &str) -> Self {
        FileId(value.to_string())
    }
}

impl From<String> for FileId {
    fn from(value: String) -> Self {
        FileId(value)
    }
}

/// The synthetic root of the remote namespace. Never listed as a child of
/// anything; walker recursion starts here.
pub const ROOT_FOLDER_ID: &str = "root";

pub fn root_id() -> FileId {
    FileId(ROOT_FOLDER_ID.to_string())
}

pub const FOLDER_MIME_TYPE: &str = "folder";
pub const SHORTCUT_MIME_TYPE: &str = "shortcut";

/// A shortcut's reference to its target entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortcutTarget {
    pub id: FileId,
    pub mime_type: String,
}

/// A single node in the remote namespace, as listed by `listChildren` or
/// fetched by `getMetadata`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEntry {
    pub id: FileId,
    pub name: String,
    pub mime_type: String,
    pub parents: Vec<FileId>,
    pub shortcut_target: Option<ShortcutTarget>,
    pub drive_id: Option<String>,
    pub trashed: bool,
}

impl RemoteEntry {
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }

    pub fn is_shortcut(&self) -> bool {
        self.mime_type == SHORTCUT_MIME_TYPE && self.shortcut_target.is_some()
    }

    /// Entries belonging to a shared drive are out of scope and must be
    /// filtered out at the walker boundary.
    pub fn is_shared_drive(&self) -> bool {
        self.drive_id.as_deref().is_some_and(|id| !id.is_empty())
    }
}

/// Result of `listChildren`: one page of a folder's children.
#[derive(Debug, Clone)]
pub struct ListChildrenResponse {
    pub items: Vec<RemoteEntry>,
    pub next_page_token: Option<String>,
}

/// A single entry in a `changes()` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    pub change_type: String,
    pub file_id: FileId,
    pub file: Option<ChangeFile>,
    pub removed: bool,
}

/// The subset of file metadata carried on a change record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeFile {
    pub name: String,
    pub mime_type: String,
    pub trashed: bool,
}

/// Result of `changes()`: a batch of changes plus the cursor to resume from.
#[derive(Debug, Clone)]
pub struct ChangesResponse {
    pub items: Vec<Change>,
    pub new_start_page_token: String,
}

/// A streamed, fallible sequence of body bytes.
pub type ByteStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;

/// The four verbs the sync core needs from the remote. The real transport,
/// request marshalling, and authentication are out of scope here; implementors
/// own all of that.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    async fn list_children(
        &self,
        folder_id: &FileId,
        page_token: Option<&str>,
    ) -> Result<ListChildrenResponse>;

    async fn get_metadata(&self, file_id: &FileId) -> Result<RemoteEntry>;

    async fn download_body(&self, file_id: &FileId) -> Result<ByteStream>;

    async fn changes(&self, page_token: &str) -> Result<ChangesResponse>;

    async fn start_page_token(&self) -> Result<String>;
}

/// Helper used by walker/resolver: index entries and parent links by id.
pub type EntryMap = HashMap<FileId, RemoteEntry>;
