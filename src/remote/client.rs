//! `RemoteClient` implementation backed by `reqwest`: a thin HTTP transport
//! that attaches bearer auth to each of the four generic verbs and decodes
//! JSON responses into the shared wire types.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;

use crate::credentials::CredentialProvider;

use super::{
    ByteStream, ChangesResponse, FileId, ListChildrenResponse, RemoteClient, RemoteEntry,
};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }
}

pub struct HttpRemoteClient {
    http: reqwest::Client,
    config: ClientConfig,
    credentials: Arc<dyn CredentialProvider>,
}

impl HttpRemoteClient {
    pub fn new(config: ClientConfig, credentials: Arc<dyn CredentialProvider>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            http,
            config,
            credentials,
        })
    }

    async fn authed(&self, url: impl reqwest::IntoUrl) -> Result<reqwest::RequestBuilder> {
        let token = self.credentials.token().await?;
        Ok(self.http.get(url).bearer_auth(token))
    }
}

#[derive(Deserialize)]
struct ListChildrenWire {
    items: Vec<RemoteEntry>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct ChangesWire {
    changes: Vec<super::Change>,
    #[serde(rename = "newStartPageToken")]
    new_start_page_token: String,
}

#[derive(Deserialize)]
struct StartPageTokenWire {
    #[serde(rename = "startPageToken")]
    start_page_token: String,
}

#[async_trait]
impl RemoteClient for HttpRemoteClient {
    async fn list_children(
        &self,
        folder_id: &FileId,
        page_token: Option<&str>,
    ) -> Result<ListChildrenResponse> {
        let url = format!("{}/files", self.config.base_url);
        let mut request = self
            .authed(url)
            .await?
            .query(&[("parent", folder_id.as_str()), ("pageSize", "1000")]);
        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }

        let wire: ListChildrenWire = request
            .send()
            .await
            .context("listChildren request failed")?
            .error_for_status()
            .context("listChildren returned an error status")?
            .json()
            .await
            .context("failed to decode listChildren response")?;

        Ok(ListChildrenResponse {
            items: wire.items,
            next_page_token: wire.next_page_token,
        })
    }

    async fn get_metadata(&self, file_id: &FileId) -> Result<RemoteEntry> {
        let url = format!("{}/files/{}", self.config.base_url, file_id.as_str());
        self.authed(url)
            .await?
            .send()
            .await
            .context("getMetadata request failed")?
            .error_for_status()
            .context("getMetadata returned an error status")?
            .json()
            .await
            .context("failed to decode getMetadata response")
    }

    async fn download_body(&self, file_id: &FileId) -> Result<ByteStream> {
        let url = format!(
            "{}/files/{}/content",
            self.config.base_url,
            file_id.as_str()
        );
        let response = self
            .authed(url)
            .await?
            .send()
            .await
            .context("downloadBody request failed")?
            .error_for_status()
            .context("downloadBody returned an error status")?;

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err)));
        Ok(Box::pin(stream))
    }

    async fn changes(&self, page_token: &str) -> Result<ChangesResponse> {
        let url = format!("{}/changes", self.config.base_url);
        let wire: ChangesWire = self
            .authed(url)
            .await?
            .query(&[("pageToken", page_token)])
            .send()
            .await
            .context("changes request failed")?
            .error_for_status()
            .context("changes returned an error status")?
            .json()
            .await
            .context("failed to decode changes response")?;

        Ok(ChangesResponse {
            items: wire.changes,
            new_start_page_token: wire.new_start_page_token,
        })
    }

    async fn start_page_token(&self) -> Result<String> {
        let url = format!("{}/changes/startPageToken", self.config.base_url);
        let wire: StartPageTokenWire = self
            .authed(url)
            .await?
            .send()
            .await
            .context("startPageToken request failed")?
            .error_for_status()
            .context("startPageToken returned an error status")?
            .json()
            .await
            .context("failed to decode startPageToken response")?;
        Ok(wire.start_page_token)
    }
}
