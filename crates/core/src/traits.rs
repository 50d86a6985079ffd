//! Storage trait definitions
//!
//! These traits describe the S3-compatible operations the library needs.
//! They keep the coordinator and the CLI decoupled from the SDK, and can be
//! mocked for testing.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::multipart::{CompletedUpload, PartRecord};

/// Metadata for an object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInfo {
    /// Object key
    pub key: String,

    /// Size in bytes
    pub size_bytes: i64,

    /// Human-readable size
    pub size_human: String,

    /// Last modified timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<Timestamp>,

    /// ETag (usually MD5 for single-part uploads)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,

    /// Content type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    /// Storage class
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,
}

impl ObjectInfo {
    pub fn new(key: impl Into<String>, size: i64) -> Self {
        Self {
            key: key.into(),
            size_bytes: size,
            size_human: humansize::format_size(size.max(0) as u64, humansize::BINARY),
            last_modified: None,
            etag: None,
            content_type: None,
            storage_class: None,
        }
    }
}

/// Trait for S3-compatible object and bucket operations
///
/// This trait is implemented by the S3 adapter and can be mocked for testing.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Create a bucket
    async fn create_bucket(&self, bucket: &str) -> Result<()>;

    /// Check if a bucket exists
    async fn bucket_exists(&self, bucket: &str) -> Result<bool>;

    /// Enable default server-side encryption (AES256) on a bucket
    async fn set_bucket_encryption(&self, bucket: &str) -> Result<()>;

    /// Enable or suspend versioning on a bucket
    async fn set_bucket_versioning(&self, bucket: &str, enabled: bool) -> Result<()>;

    /// Stream an object to a local file, returning the number of bytes written
    async fn download_object(&self, bucket: &str, key: &str, local_path: &Path) -> Result<u64>;

    /// Get object content as bytes
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;

    /// Server-side copy within the store
    ///
    /// Sources above the single-copy ceiling are rejected; there is no chunked
    /// fallback.
    async fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> Result<ObjectInfo>;

    /// Presigned GET URL valid for `expires_in`
    async fn presigned_get_url(&self, bucket: &str, key: &str, expires_in: Duration)
    -> Result<String>;

    /// Delete an object
    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()>;

    /// Get object metadata
    async fn stat_object(&self, bucket: &str, key: &str) -> Result<ObjectInfo>;
}

/// The store-side half of the multipart protocol
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MultipartStore: Send + Sync {
    /// Initiate a multipart upload; the store assigns a fresh id on every call
    async fn create_multipart_upload(&self, bucket: &str, key: &str) -> Result<String>;

    /// Presigned PUT URL scoped to one (bucket, key, upload id, part number)
    async fn presign_upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        expires_in: Duration,
    ) -> Result<String>;

    /// Combine the given parts, in the given order, into the final object
    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[PartRecord],
    ) -> Result<CompletedUpload>;

    /// Discard an in-progress upload and the parts stored for it
    async fn abort_multipart_upload(&self, bucket: &str, key: &str, upload_id: &str)
    -> Result<()>;
}

/// Response of a raw binary transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferResponse {
    pub status: u16,
    /// ETag header, exactly as sent by the store
    pub etag: Option<String>,
    pub body: String,
}

impl TransferResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends part content to a presigned URL, bypassing the signed client
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PartTransport: Send + Sync {
    async fn put(&self, url: &str, content: Vec<u8>) -> Result<TransferResponse>;
}
