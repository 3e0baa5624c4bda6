//! Blob store backed by a remote HTTP blob API.
//!
//! Speaks the Vercel Blob REST dialect: `PUT {base}/{pathname}` stores a
//! blob and answers with its metadata, `GET {base}` lists blobs page by page,
//! and blob URLs are publicly readable.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{header, Client};
use serde::Deserialize;

use super::{BlobInfo, BlobStore, StorageError};
use crate::config::{ApiKey, StorageConfig};

/// Page size requested when listing.
const LIST_LIMIT: u32 = 1000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListPage {
    #[serde(default)]
    blobs: Vec<BlobInfo>,
    #[serde(default)]
    has_more: bool,
    cursor: Option<String>,
}

/// HTTP blob store client.
#[derive(Debug, Clone)]
pub struct HttpBlobStore {
    client: Client,
    base_url: String,
    token: Option<ApiKey>,
}

impl HttpBlobStore {
    pub fn new(client: Client, config: &StorageConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        }
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, StorageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StorageError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn put(&self, pathname: &str, body: Bytes) -> Result<BlobInfo, StorageError> {
        let url = format!("{}/{}", self.base_url, pathname);
        let request = self
            .client
            .put(&url)
            .header("x-add-random-suffix", "0")
            .header("x-content-type", "application/json")
            .header(header::CONTENT_TYPE, "application/json")
            .body(body);

        let response = ensure_success(self.authorized(request).send().await?).await?;
        let info: BlobInfo = response.json().await?;
        tracing::debug!(pathname = %info.pathname, "Blob stored");
        Ok(info)
    }

    async fn list(&self) -> Result<Vec<BlobInfo>, StorageError> {
        let mut blobs = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(&self.base_url)
                .query(&[("limit", LIST_LIMIT.to_string())]);
            if let Some(cursor) = &cursor {
                request = request.query(&[("cursor", cursor)]);
            }

            let response = ensure_success(self.authorized(request).send().await?).await?;
            let page: ListPage = response.json().await?;
            blobs.extend(page.blobs);

            match page.cursor {
                Some(next) if page.has_more => cursor = Some(next),
                _ => break,
            }
        }

        Ok(blobs)
    }

    async fn fetch(&self, url: &str) -> Result<Bytes, StorageError> {
        let response = ensure_success(self.client.get(url).send().await?).await?;
        Ok(response.bytes().await?)
    }
}
