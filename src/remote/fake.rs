//! An in-memory, scriptable fake implementing [`RemoteClient`] for tests:
//! serves canned listings and byte streams, with injectable failures and a
//! queue of change batches.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;

use super::{
    ByteStream, Change, ChangesResponse, FileId, ListChildrenResponse, RemoteClient, RemoteEntry,
};

const PAGE_SIZE: usize = 2;

/// A scriptable remote namespace: entries plus bodies, plus a queue of change
/// batches to hand back from successive `changes()` calls.
#[derive(Default)]
pub struct FakeRemoteClient {
    entries: Mutex<HashMap<FileId, RemoteEntry>>,
    bodies: Mutex<HashMap<FileId, Vec<u8>>>,
    pending_changes: Mutex<VecDeque<ChangesResponse>>,
    start_token: Mutex<String>,
    fail_metadata_for: Mutex<Vec<FileId>>,
    fail_download_for: Mutex<Vec<FileId>>,
}

impl FakeRemoteClient {
    pub fn new() -> Self {
        Self {
            start_token: Mutex::new("start-0".to_string()),
            ..Default::default()
        }
    }

    pub fn insert_entry(&self, entry: RemoteEntry) {
        self.entries
            .lock()
            .unwrap()
            .insert(entry.id.clone(), entry);
    }

    pub fn set_body(&self, id: FileId, content: impl Into<Vec<u8>>) {
        self.bodies.lock().unwrap().insert(id, content.into());
    }

    pub fn remove_entry(&self, id: &FileId) {
        self.entries.lock().unwrap().remove(id);
    }

    pub fn set_start_token(&self, token: impl Into<String>) {
        *self.start_token.lock().unwrap() = token.into();
    }

    /// Queue a batch of changes to be returned by the next `changes()` call.
    pub fn push_change_batch(&self, changes: Vec<Change>, new_start_page_token: impl Into<String>) {
        self.pending_changes
            .lock()
            .unwrap()
            .push_back(ChangesResponse {
                items: changes,
                new_start_page_token: new_start_page_token.into(),
            });
    }

    pub fn fail_metadata_for(&self, id: FileId) {
        self.fail_metadata_for.lock().unwrap().push(id);
    }

    pub fn fail_download_for(&self, id: FileId) {
        self.fail_download_for.lock().unwrap().push(id);
    }
}

#[async_trait]
impl RemoteClient for FakeRemoteClient {
    async fn list_children(
        &self,
        folder_id: &FileId,
        page_token: Option<&str>,
    ) -> Result<ListChildrenResponse> {
        let entries = self.entries.lock().unwrap();
        let mut children: Vec<RemoteEntry> = entries
            .values()
            .filter(|e| e.parents.contains(folder_id) && !e.trashed)
            .cloned()
            .collect();
        children.sort_by(|a, b| a.id.cmp(&b.id));

        let offset: usize = page_token.and_then(|t| t.parse().ok()).unwrap_or(0);
        let page: Vec<RemoteEntry> = children
            .iter()
            .skip(offset)
            .take(PAGE_SIZE)
            .cloned()
            .collect();
        let next_offset = offset + page.len();
        let next_page_token = if next_offset < children.len() {
            Some(next_offset.to_string())
        } else {
            None
        };

        Ok(ListChildrenResponse {
            items: page,
            next_page_token,
        })
    }

    async fn get_metadata(&self, file_id: &FileId) -> Result<RemoteEntry> {
        if self.fail_metadata_for.lock().unwrap().contains(file_id) {
            return Err(anyhow!("simulated metadata failure for {file_id}"));
        }
        self.entries
            .lock()
            .unwrap()
            .get(file_id)
            .cloned()
            .ok_or_else(|| anyhow!("no such file id: {file_id}"))
    }

    async fn download_body(&self, file_id: &FileId) -> Result<ByteStream> {
        if self.fail_download_for.lock().unwrap().contains(file_id) {
            return Err(anyhow!("simulated download failure for {file_id}"));
        }
        let content = self
            .bodies
            .lock()
            .unwrap()
            .get(file_id)
            .cloned()
            .ok_or_else(|| anyhow!("no body registered for {file_id}"))?;
        let stream = stream::once(async move { Ok(Bytes::from(content)) });
        Ok(Box::pin(stream))
    }

    async fn changes(&self, _page_token: &str) -> Result<ChangesResponse> {
        let mut pending = self.pending_changes.lock().unwrap();
        if let Some(batch) = pending.pop_front() {
            Ok(batch)
        } else {
            let token = self.start_token.lock().unwrap().clone();
            Ok(ChangesResponse {
                items: Vec::new(),
                new_start_page_token: token,
            })
        }
    }

    async fn start_page_token(&self) -> Result<String> {
        Ok(self.start_token.lock().unwrap().clone())
    }
}
