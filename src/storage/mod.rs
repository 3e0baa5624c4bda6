//! Blob storage for per-user JSON documents.
//!
//! One document per user, stored under a key derived from the email
//! address. The store itself is an external collaborator behind
//! [`BlobStore`]; [`HttpBlobStore`] talks to a remote blob API and
//! [`MemoryBlobStore`] keeps everything in process.

mod memory;
mod remote;

pub use memory::MemoryBlobStore;
pub use remote::HttpBlobStore;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A stored blob as reported by the store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BlobInfo {
    pub pathname: String,
    pub url: String,
}

/// Storage errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Blob store request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Blob store returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Invalid document: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Key-value blob store.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `body` under `pathname`, replacing any previous content.
    async fn put(&self, pathname: &str, body: Bytes) -> Result<BlobInfo, StorageError>;

    /// List every stored blob.
    async fn list(&self) -> Result<Vec<BlobInfo>, StorageError>;

    /// Fetch a blob's content by its URL.
    async fn fetch(&self, url: &str) -> Result<Bytes, StorageError>;
}

/// Storage key for a user's document.
///
/// Every character outside `[a-zA-Z0-9@.]` becomes `_`, then `.json` is
/// appended: `"a+b@x.io"` -> `"a_b@x.io.json"`.
pub fn blob_key(email: &str) -> String {
    let mut key: String = email
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '@' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();
    key.push_str(".json");
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_key_keeps_safe_chars() {
        assert_eq!(blob_key("alice@example.com"), "alice@example.com.json");
        assert_eq!(blob_key("Bob.99@Mail.IO"), "Bob.99@Mail.IO.json");
    }

    #[test]
    fn test_blob_key_replaces_everything_else() {
        assert_eq!(blob_key("a+b@x.io"), "a_b@x.io.json");
        assert_eq!(blob_key("first last@x/y"), "first_last@x_y.json");
        assert_eq!(blob_key("ü@x.io"), "_@x.io.json");
    }
}
