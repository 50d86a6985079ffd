//! S3 client implementation
//!
//! Wraps aws-sdk-s3 and implements the ObjectStore and MultipartStore traits
//! from stowage-core.

use std::path::Path;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::types::{
    BucketVersioningStatus, CompletedMultipartUpload, CompletedPart, ServerSideEncryption,
    ServerSideEncryptionByDefault, ServerSideEncryptionConfiguration, ServerSideEncryptionRule,
    VersioningConfiguration,
};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use tokio::io::AsyncWriteExt;

use stowage_core::{
    CompletedUpload, CredentialSet, Error, MultipartStore, ObjectInfo, ObjectStore, PartRecord,
    Profile, Result,
};

/// Largest object a single server-side copy accepts: 5 GiB
pub const MAX_SINGLE_COPY_SIZE: i64 = 5 * 1024 * 1024 * 1024;

/// Characters escaped in the copy source; slashes separate key segments
const COPY_SOURCE_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

/// S3 client wrapper
#[derive(Clone)]
pub struct S3Client {
    inner: aws_sdk_s3::Client,
}

impl S3Client {
    /// Create a client for the profile's endpoint with the given credentials
    pub async fn new(profile: &Profile, credentials: &CredentialSet) -> Result<Self> {
        let endpoint = profile.validate()?;
        let timeouts = profile.timeout_config();

        let sdk_credentials = aws_credential_types::Credentials::new(
            credentials.access_key(),
            credentials.secret_key(),
            credentials.session_token().map(str::to_string),
            credentials.expiry().map(SystemTime::from),
            "stowage",
        );

        let timeout_config = aws_config::timeout::TimeoutConfig::builder()
            .connect_timeout(timeouts.connect())
            .read_timeout(timeouts.read())
            .build();

        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .credentials_provider(sdk_credentials)
            .region(aws_config::Region::new(profile.region.clone()))
            .endpoint_url(endpoint.as_str().trim_end_matches('/'))
            .timeout_config(timeout_config)
            .load()
            .await;

        // Path-style addressing for S3-compatible stores
        let s3_config = aws_sdk_s3::config::Builder::from(&config)
            .force_path_style(true)
            .build();

        Ok(Self {
            inner: aws_sdk_s3::Client::from_conf(s3_config),
        })
    }

    /// Get the underlying aws-sdk-s3 client
    pub fn inner(&self) -> &aws_sdk_s3::Client {
        &self.inner
    }
}

/// Map an SDK failure onto the stowage error taxonomy
fn map_sdk_error<E>(err: SdkError<E>, resource: &str) -> Error
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let message = DisplayErrorContext(&err).to_string();
    let code = err.as_service_error().and_then(|e| e.code());
    let status = err.raw_response().map(|r| r.status().as_u16());

    match (code, status) {
        (Some("NoSuchKey" | "NoSuchBucket" | "NoSuchUpload" | "NotFound"), _) | (_, Some(404)) => {
            Error::NotFound(resource.to_string())
        }
        (
            Some(
                "AccessDenied" | "InvalidAccessKeyId" | "SignatureDoesNotMatch" | "ExpiredToken"
                | "InvalidToken",
            ),
            _,
        )
        | (_, Some(401 | 403)) => Error::Auth(message),
        (Some("BucketAlreadyExists" | "BucketAlreadyOwnedByYou"), _) | (_, Some(409)) => {
            Error::Conflict(message)
        }
        (Some("InvalidPart" | "InvalidPartOrder" | "EntityTooSmall"), _) => {
            Error::InvalidParts(message)
        }
        _ => match &err {
            SdkError::TimeoutError(_) => Error::Timeout(message),
            SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => Error::Network(message),
            _ => Error::General(message),
        },
    }
}

fn timestamp(value: &aws_smithy_types::DateTime) -> Option<jiff::Timestamp> {
    jiff::Timestamp::from_second(value.secs()).ok()
}

fn unquote(etag: &str) -> String {
    etag.trim_matches('"').to_string()
}

#[async_trait]
impl ObjectStore for S3Client {
    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        self.inner
            .create_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, bucket))?;

        tracing::info!(bucket, "Created bucket");
        Ok(())
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        match self.inner.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(e) => match map_sdk_error(e, bucket) {
                Error::NotFound(_) => Ok(false),
                other => Err(other),
            },
        }
    }

    async fn set_bucket_encryption(&self, bucket: &str) -> Result<()> {
        let by_default = ServerSideEncryptionByDefault::builder()
            .sse_algorithm(ServerSideEncryption::Aes256)
            .build()
            .map_err(|e| Error::General(e.to_string()))?;
        let rule = ServerSideEncryptionRule::builder()
            .apply_server_side_encryption_by_default(by_default)
            .build();
        let configuration = ServerSideEncryptionConfiguration::builder()
            .rules(rule)
            .build()
            .map_err(|e| Error::General(e.to_string()))?;

        self.inner
            .put_bucket_encryption()
            .bucket(bucket)
            .server_side_encryption_configuration(configuration)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, bucket))?;

        tracing::info!(bucket, "Enabled default bucket encryption");
        Ok(())
    }

    async fn set_bucket_versioning(&self, bucket: &str, enabled: bool) -> Result<()> {
        let status = if enabled {
            BucketVersioningStatus::Enabled
        } else {
            BucketVersioningStatus::Suspended
        };

        self.inner
            .put_bucket_versioning()
            .bucket(bucket)
            .versioning_configuration(VersioningConfiguration::builder().status(status).build())
            .send()
            .await
            .map_err(|e| map_sdk_error(e, bucket))?;

        tracing::info!(bucket, enabled, "Set bucket versioning");
        Ok(())
    }

    async fn download_object(&self, bucket: &str, key: &str, local_path: &Path) -> Result<u64> {
        let resource = format!("{bucket}/{key}");
        let mut response = self
            .inner
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &resource))?;

        if let Some(parent) = local_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut file = tokio::fs::File::create(local_path).await?;
        let mut written = 0u64;
        while let Some(chunk) = response
            .body
            .try_next()
            .await
            .map_err(|e| Error::Network(e.to_string()))?
        {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        tracing::debug!(bucket, key, bytes = written, path = %local_path.display(), "Downloaded object");
        Ok(written)
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let resource = format!("{bucket}/{key}");
        let response = self
            .inner
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &resource))?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| Error::Network(e.to_string()))?
            .into_bytes()
            .to_vec();

        Ok(data)
    }

    async fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> Result<ObjectInfo> {
        let source = self.stat_object(src_bucket, src_key).await?;
        if source.size_bytes > MAX_SINGLE_COPY_SIZE {
            return Err(Error::UnsupportedFeature(format!(
                "{src_bucket}/{src_key} is {} bytes; server-side copy is limited to {MAX_SINGLE_COPY_SIZE} bytes",
                source.size_bytes
            )));
        }

        let copy_source = format!(
            "{src_bucket}/{}",
            utf8_percent_encode(src_key, COPY_SOURCE_ENCODE_SET)
        );

        let response = self
            .inner
            .copy_object()
            .copy_source(&copy_source)
            .bucket(dst_bucket)
            .key(dst_key)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &format!("{src_bucket}/{src_key}")))?;

        let mut info = self.stat_object(dst_bucket, dst_key).await?;
        if let Some(etag) = response.copy_object_result().and_then(|r| r.e_tag()) {
            info.etag = Some(unquote(etag));
        }

        tracing::info!(
            source = %format!("{src_bucket}/{src_key}"),
            target = %format!("{dst_bucket}/{dst_key}"),
            "Copied object"
        );
        Ok(info)
    }

    async fn presigned_get_url(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> Result<String> {
        let config = PresigningConfig::expires_in(expires_in)
            .map_err(|e| Error::Config(format!("Invalid presign expiry: {e}")))?;

        let request = self
            .inner
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(config)
            .await
            .map_err(|e| map_sdk_error(e, &format!("{bucket}/{key}")))?;

        Ok(request.uri().to_string())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        self.inner
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &format!("{bucket}/{key}")))?;

        tracing::info!(bucket, key, "Deleted object");
        Ok(())
    }

    async fn stat_object(&self, bucket: &str, key: &str) -> Result<ObjectInfo> {
        let response = self
            .inner
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &format!("{bucket}/{key}")))?;

        let mut info = ObjectInfo::new(key, response.content_length().unwrap_or(0));
        info.last_modified = response.last_modified().and_then(timestamp);
        info.etag = response.e_tag().map(unquote);
        info.content_type = response.content_type().map(str::to_string);
        info.storage_class = response.storage_class().map(|sc| sc.as_str().to_string());

        Ok(info)
    }
}

#[async_trait]
impl MultipartStore for S3Client {
    async fn create_multipart_upload(&self, bucket: &str, key: &str) -> Result<String> {
        let response = self
            .inner
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &format!("{bucket}/{key}")))?;

        response
            .upload_id()
            .map(str::to_string)
            .ok_or_else(|| Error::InvalidResponse("Store returned no upload id".into()))
    }

    async fn presign_upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        expires_in: Duration,
    ) -> Result<String> {
        let config = PresigningConfig::expires_in(expires_in)
            .map_err(|e| Error::Config(format!("Invalid presign expiry: {e}")))?;

        let request = self
            .inner
            .upload_part()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .presigned(config)
            .await
            .map_err(|e| map_sdk_error(e, &format!("{bucket}/{key}")))?;

        tracing::debug!(bucket, key, upload_id, part_number, "Presigned part upload");
        Ok(request.uri().to_string())
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[PartRecord],
    ) -> Result<CompletedUpload> {
        let response = self
            .inner
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(completed_multipart_upload(parts))
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &format!("{bucket}/{key}")))?;

        Ok(CompletedUpload {
            bucket: response.bucket().unwrap_or(bucket).to_string(),
            key: response.key().unwrap_or(key).to_string(),
            location: response.location().map(str::to_string),
            etag: response.e_tag().map(unquote),
        })
    }

    async fn abort_multipart_upload(&self, bucket: &str, key: &str, upload_id: &str) -> Result<()> {
        self.inner
            .abort_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &format!("{bucket}/{key}")))?;
        Ok(())
    }
}

/// Part list for the combine call, in the order given
pub fn completed_multipart_upload(parts: &[PartRecord]) -> CompletedMultipartUpload {
    let parts = parts
        .iter()
        .map(|p| {
            CompletedPart::builder()
                .part_number(p.part_number)
                .e_tag(&p.etag)
                .build()
        })
        .collect::<Vec<_>>();

    CompletedMultipartUpload::builder()
        .set_parts(Some(parts))
        .build()
}
