//! In-process blob store.

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use super::{BlobInfo, BlobStore, StorageError};

const URL_PREFIX: &str = "memory://";

/// Blob store backed by a concurrent map. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: DashMap<String, Bytes>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn url_for(pathname: &str) -> String {
        format!("{}{}", URL_PREFIX, pathname)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, pathname: &str, body: Bytes) -> Result<BlobInfo, StorageError> {
        self.blobs.insert(pathname.to_string(), body);
        Ok(BlobInfo {
            pathname: pathname.to_string(),
            url: Self::url_for(pathname),
        })
    }

    async fn list(&self) -> Result<Vec<BlobInfo>, StorageError> {
        let mut blobs: Vec<BlobInfo> = self
            .blobs
            .iter()
            .map(|entry| BlobInfo {
                pathname: entry.key().clone(),
                url: Self::url_for(entry.key()),
            })
            .collect();
        blobs.sort_by(|a, b| a.pathname.cmp(&b.pathname));
        Ok(blobs)
    }

    async fn fetch(&self, url: &str) -> Result<Bytes, StorageError> {
        let pathname = url.strip_prefix(URL_PREFIX).unwrap_or(url);
        self.blobs
            .get(pathname)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StorageError::NotFound(url.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_list_fetch() {
        let store = MemoryBlobStore::new();
        let saved = store
            .put("b@x.io.json", Bytes::from_static(b"{\"n\":1}"))
            .await
            .unwrap();
        store
            .put("a@x.io.json", Bytes::from_static(b"{}"))
            .await
            .unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].pathname, "a@x.io.json");

        let body = store.fetch(&saved.url).await.unwrap();
        assert_eq!(&body[..], b"{\"n\":1}");
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let store = MemoryBlobStore::new();
        store.put("k.json", Bytes::from_static(b"1")).await.unwrap();
        let info = store.put("k.json", Bytes::from_static(b"2")).await.unwrap();

        assert_eq!(store.list().await.unwrap().len(), 1);
        assert_eq!(&store.fetch(&info.url).await.unwrap()[..], b"2");
    }

    #[tokio::test]
    async fn test_fetch_missing() {
        let store = MemoryBlobStore::new();
        let err = store.fetch("memory://nope.json").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }
}
