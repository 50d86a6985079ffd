//! Multipart upload coordinator
//!
//! Drives the three-phase protocol: initiate, upload parts, complete. Each part
//! goes through its own presigned URL straight to the store, so parts of one
//! upload can be sent concurrently without shared state. Bounding the number of
//! parts in flight is left to the caller.

use std::sync::Arc;
use std::time::Duration;

use futures::future::try_join_all;

use crate::error::{Error, Result};
use crate::multipart::{
    check_part_number, validate_part_sequence, CompletedUpload, PartRecord, UploadSession,
};
use crate::profile::DEFAULT_PRESIGN_EXPIRY_SECS;
use crate::traits::{MultipartStore, PartTransport};

/// Sequences multipart uploads over a store and a part transport
pub struct MultipartCoordinator<S, T> {
    store: Arc<S>,
    transport: Arc<T>,
    presign_expiry: Duration,
}

impl<S, T> Clone for MultipartCoordinator<S, T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            transport: Arc::clone(&self.transport),
            presign_expiry: self.presign_expiry,
        }
    }
}

impl<S: MultipartStore, T: PartTransport> MultipartCoordinator<S, T> {
    pub fn new(store: S, transport: T) -> Self {
        Self::from_shared(Arc::new(store), Arc::new(transport))
    }

    pub fn from_shared(store: Arc<S>, transport: Arc<T>) -> Self {
        Self {
            store,
            transport,
            presign_expiry: Duration::from_secs(DEFAULT_PRESIGN_EXPIRY_SECS),
        }
    }

    /// Lifetime of the presigned URL issued for each part
    pub fn with_presign_expiry(mut self, expiry: Duration) -> Self {
        self.presign_expiry = expiry;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Initiate an upload and return the id the store assigned
    ///
    /// Every call starts an independent upload; nothing is deduplicated.
    pub async fn prepare_upload(&self, bucket: &str, key: &str) -> Result<String> {
        let upload_id = self.store.create_multipart_upload(bucket, key).await?;
        tracing::info!(bucket, key, upload_id = %upload_id, "Initiated multipart upload");
        Ok(upload_id)
    }

    /// Initiate one upload per key, concurrently
    ///
    /// Fails as a whole if any initiation fails. Uploads already initiated are
    /// not aborted.
    pub async fn prepare_uploads(
        &self,
        bucket: &str,
        keys: &[String],
    ) -> Result<Vec<(String, String)>> {
        try_join_all(keys.iter().map(|key| async move {
            let upload_id = self.prepare_upload(bucket, key).await?;
            Ok::<_, Error>((key.clone(), upload_id))
        }))
        .await
    }

    /// Upload one part and return its record
    ///
    /// A failed part can be retried with the same part number; presigned URLs
    /// are not single-use.
    pub async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        content: Vec<u8>,
    ) -> Result<PartRecord> {
        check_part_number(part_number)?;

        let url = self
            .store
            .presign_upload_part(bucket, key, upload_id, part_number, self.presign_expiry)
            .await?;
        tracing::debug!(bucket, key, part_number, size = content.len(), "Uploading part");

        let response = self.transport.put(&url, content).await?;
        if !response.is_success() {
            tracing::warn!(
                bucket,
                key,
                part_number,
                status = response.status,
                "Part upload rejected"
            );
            return Err(Error::PartUpload {
                part_number,
                status: response.status,
                body: response.body,
            });
        }

        let etag = response.etag.ok_or_else(|| {
            Error::InvalidResponse(format!("No ETag returned for part {part_number}"))
        })?;

        Ok(PartRecord::new(part_number, etag.trim_matches('"')))
    }

    /// Combine the parts into the final object
    ///
    /// The parts are submitted exactly as given. Ordering and contiguity are
    /// the caller's responsibility; the store rejects sequences it does not
    /// accept. See [`Self::complete_upload_checked`] for a validating variant.
    pub async fn complete_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[PartRecord],
    ) -> Result<CompletedUpload> {
        let completed = self
            .store
            .complete_multipart_upload(bucket, key, upload_id, parts)
            .await?;
        tracing::info!(
            bucket,
            key,
            upload_id,
            parts = parts.len(),
            "Completed multipart upload"
        );
        Ok(completed)
    }

    /// Like [`Self::complete_upload`], but first requires the parts to be
    /// numbered 1..=n in ascending order with no gaps or duplicates
    pub async fn complete_upload_checked(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[PartRecord],
    ) -> Result<CompletedUpload> {
        validate_part_sequence(parts)?;
        self.complete_upload(bucket, key, upload_id, parts).await
    }

    /// Cancel an upload and let the store discard its parts
    pub async fn abort_upload(&self, bucket: &str, key: &str, upload_id: &str) -> Result<()> {
        self.store
            .abort_multipart_upload(bucket, key, upload_id)
            .await?;
        tracing::info!(bucket, key, upload_id, "Aborted multipart upload");
        Ok(())
    }

    /// Initiate an upload and track it in a session
    pub async fn begin(&self, bucket: &str, key: &str) -> Result<UploadSession> {
        let mut session = UploadSession::new(bucket, key);
        let upload_id = self.prepare_upload(bucket, key).await?;
        session.start(upload_id)?;
        Ok(session)
    }

    /// Upload a part of a tracked session and record it
    pub async fn upload_session_part(
        &self,
        session: &mut UploadSession,
        part_number: i32,
        content: Vec<u8>,
    ) -> Result<PartRecord> {
        let upload_id = session.active_upload_id()?.to_string();
        let part = self
            .upload_part(&session.bucket, &session.key, &upload_id, part_number, content)
            .await?;
        session.record_part(part.clone())?;
        Ok(part)
    }

    /// Complete a tracked session with its recorded parts
    pub async fn finish(&self, session: &mut UploadSession) -> Result<CompletedUpload> {
        let upload_id = session.active_upload_id()?.to_string();
        let manifest = session.manifest();
        if manifest.is_empty() {
            return Err(Error::InvalidParts(format!(
                "Upload {upload_id} has no recorded parts"
            )));
        }

        let completed = self
            .complete_upload(&session.bucket, &session.key, &upload_id, &manifest)
            .await?;
        session.mark_completed()?;
        Ok(completed)
    }

    /// Abort a tracked session
    pub async fn abandon(&self, session: &mut UploadSession) -> Result<()> {
        let upload_id = session.active_upload_id()?.to_string();
        self.abort_upload(&session.bucket, &session.key, &upload_id)
            .await?;
        session.mark_aborted()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multipart::UploadState;
    use crate::traits::{MockMultipartStore, MockPartTransport, TransferResponse};
    use mockall::Sequence;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ok_response(etag: &str) -> TransferResponse {
        TransferResponse {
            status: 200,
            etag: Some(etag.to_string()),
            body: String::new(),
        }
    }

    fn presigning_store() -> MockMultipartStore {
        let mut store = MockMultipartStore::new();
        store
            .expect_presign_upload_part()
            .returning(|_, _, upload_id, n, _| Ok(format!("https://store/{upload_id}/{n}")));
        store
    }

    fn completed(bucket: &str, key: &str) -> CompletedUpload {
        CompletedUpload {
            bucket: bucket.to_string(),
            key: key.to_string(),
            location: Some(format!("https://store/{bucket}{key}")),
            etag: Some("final-3".to_string()),
        }
    }

    #[tokio::test]
    async fn test_upload_part_strips_quotes() {
        let store = presigning_store();
        let mut transport = MockPartTransport::new();
        transport
            .expect_put()
            .times(3)
            .returning(|_, _| Ok(ok_response("\"abc\"")));

        let coordinator = MultipartCoordinator::new(store, transport);
        for n in 1..=3 {
            let part = coordinator
                .upload_part("data", "k", "X", n, b"bytes".to_vec())
                .await
                .unwrap();
            assert_eq!(part, PartRecord::new(n, "abc"));
        }
    }

    #[tokio::test]
    async fn test_upload_part_presigns_exact_tuple() {
        let mut store = MockMultipartStore::new();
        store
            .expect_presign_upload_part()
            .withf(|bucket, key, upload_id, n, expiry| {
                bucket == "data"
                    && key == "dir/obj"
                    && upload_id == "X"
                    && *n == 7
                    && *expiry == Duration::from_secs(60)
            })
            .times(1)
            .returning(|_, _, _, _, _| Ok("https://store/part7".to_string()));

        let mut transport = MockPartTransport::new();
        transport
            .expect_put()
            .withf(|url, content| url == "https://store/part7" && content == b"payload")
            .times(1)
            .returning(|_, _| Ok(ok_response("e7")));

        let coordinator = MultipartCoordinator::new(store, transport)
            .with_presign_expiry(Duration::from_secs(60));
        let part = coordinator
            .upload_part("data", "dir/obj", "X", 7, b"payload".to_vec())
            .await
            .unwrap();
        assert_eq!(part.etag, "e7");
    }

    #[tokio::test]
    async fn test_upload_part_failure_carries_part_number_and_body() {
        let store = presigning_store();
        let mut transport = MockPartTransport::new();
        transport.expect_put().returning(|_, _| {
            Ok(TransferResponse {
                status: 403,
                etag: None,
                body: "<Error><Code>AccessDenied</Code></Error>".to_string(),
            })
        });

        let coordinator = MultipartCoordinator::new(store, transport);
        let err = coordinator
            .upload_part("data", "k", "X", 4, vec![1, 2, 3])
            .await
            .unwrap_err();

        match err {
            Error::PartUpload {
                part_number,
                status,
                ref body,
            } => {
                assert_eq!(part_number, 4);
                assert_eq!(status, 403);
                assert!(body.contains("AccessDenied"));
            }
            ref other => panic!("unexpected error: {other:?}"),
        }
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_upload_part_missing_etag() {
        let store = presigning_store();
        let mut transport = MockPartTransport::new();
        transport.expect_put().returning(|_, _| {
            Ok(TransferResponse {
                status: 200,
                etag: None,
                body: String::new(),
            })
        });

        let coordinator = MultipartCoordinator::new(store, transport);
        let result = coordinator.upload_part("data", "k", "X", 1, vec![]).await;
        assert!(matches!(result, Err(Error::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_upload_part_rejects_out_of_range_before_network() {
        let mut store = MockMultipartStore::new();
        store.expect_presign_upload_part().never();
        let mut transport = MockPartTransport::new();
        transport.expect_put().never();

        let coordinator = MultipartCoordinator::new(store, transport);
        for n in [0, -1, 10_001] {
            let result = coordinator.upload_part("data", "k", "X", n, vec![]).await;
            assert!(matches!(result, Err(Error::InvalidParts(_))));
        }
    }

    #[tokio::test]
    async fn test_complete_submits_exact_sequence() {
        let mut store = MockMultipartStore::new();
        store
            .expect_complete_multipart_upload()
            .withf(|bucket, key, upload_id, parts| {
                bucket == "data"
                    && key == "k"
                    && upload_id == "X"
                    && parts
                        == [
                            PartRecord::new(1, "a"),
                            PartRecord::new(2, "b"),
                            PartRecord::new(3, "c"),
                        ]
            })
            .times(1)
            .returning(|bucket, key, _, _| Ok(completed(bucket, key)));

        let coordinator = MultipartCoordinator::new(store, MockPartTransport::new());
        let parts = vec![
            PartRecord::new(1, "a"),
            PartRecord::new(2, "b"),
            PartRecord::new(3, "c"),
        ];
        let result = coordinator
            .complete_upload("data", "k", "X", &parts)
            .await
            .unwrap();
        assert_eq!(result.bucket, "data");
    }

    #[tokio::test]
    async fn test_complete_does_not_validate_sparse_parts() {
        let mut store = MockMultipartStore::new();
        store
            .expect_complete_multipart_upload()
            .times(1)
            .returning(|bucket, key, _, _| Ok(completed(bucket, key)));

        let coordinator = MultipartCoordinator::new(store, MockPartTransport::new());
        let sparse = vec![PartRecord::new(1, "a"), PartRecord::new(5, "e")];
        assert!(coordinator.complete_upload("data", "k", "X", &sparse).await.is_ok());
    }

    #[tokio::test]
    async fn test_complete_checked_rejects_gaps_without_store_call() {
        let mut store = MockMultipartStore::new();
        store.expect_complete_multipart_upload().never();

        let coordinator = MultipartCoordinator::new(store, MockPartTransport::new());
        let sparse = vec![PartRecord::new(1, "a"), PartRecord::new(3, "c")];
        let result = coordinator
            .complete_upload_checked("data", "k", "X", &sparse)
            .await;
        assert!(matches!(result, Err(Error::InvalidParts(_))));
    }

    #[tokio::test]
    async fn test_prepare_twice_yields_distinct_ids() {
        let counter = AtomicUsize::new(0);
        let mut store = MockMultipartStore::new();
        store
            .expect_create_multipart_upload()
            .times(2)
            .returning(move |_, _| Ok(format!("upload-{}", counter.fetch_add(1, Ordering::SeqCst))));

        let coordinator = MultipartCoordinator::new(store, MockPartTransport::new());
        let first = coordinator.prepare_upload("data", "k").await.unwrap();
        let second = coordinator.prepare_upload("data", "k").await.unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_prepare_uploads_one_id_per_key() {
        let mut store = MockMultipartStore::new();
        store
            .expect_create_multipart_upload()
            .times(3)
            .returning(|_, key| Ok(format!("id-for-{key}")));

        let coordinator = MultipartCoordinator::new(store, MockPartTransport::new());
        let keys = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let ids = coordinator.prepare_uploads("data", &keys).await.unwrap();

        assert_eq!(
            ids,
            vec![
                ("a".to_string(), "id-for-a".to_string()),
                ("b".to_string(), "id-for-b".to_string()),
                ("c".to_string(), "id-for-c".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_end_to_end_session() {
        let mut seq = Sequence::new();
        let mut store = MockMultipartStore::new();
        store
            .expect_create_multipart_upload()
            .withf(|bucket, key| bucket == "data" && key == "/f.bin")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok("U1".to_string()));
        store
            .expect_presign_upload_part()
            .withf(|_, _, upload_id, _, _| upload_id == "U1")
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_, _, _, n, _| Ok(format!("https://store/U1/{n}")));
        store
            .expect_complete_multipart_upload()
            .withf(|bucket, key, upload_id, parts| {
                bucket == "data"
                    && key == "/f.bin"
                    && upload_id == "U1"
                    && parts == [PartRecord::new(1, "e1"), PartRecord::new(2, "e2")]
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|bucket, key, _, _| Ok(completed(bucket, key)));

        let mut transport = MockPartTransport::new();
        transport
            .expect_put()
            .withf(|url, content| url == "https://store/U1/1" && content == b"aaa")
            .returning(|_, _| Ok(ok_response("\"e1\"")));
        transport
            .expect_put()
            .withf(|url, content| url == "https://store/U1/2" && content == b"bbb")
            .returning(|_, _| Ok(ok_response("\"e2\"")));

        let coordinator = MultipartCoordinator::new(store, transport);
        let mut session = coordinator.begin("data", "/f.bin").await.unwrap();
        assert_eq!(session.upload_id(), Some("U1"));

        let p1 = coordinator
            .upload_session_part(&mut session, 1, b"aaa".to_vec())
            .await
            .unwrap();
        let p2 = coordinator
            .upload_session_part(&mut session, 2, b"bbb".to_vec())
            .await
            .unwrap();
        assert_eq!(p1.etag, "e1");
        assert_eq!(p2.etag, "e2");

        let result = coordinator.finish(&mut session).await.unwrap();
        assert_eq!(result.bucket, "data");
        assert_eq!(result.key, "/f.bin");
        assert!(result.location.is_some());
        assert_eq!(session.state(), UploadState::Completed);
    }

    #[tokio::test]
    async fn test_concurrent_parts_keep_etag_correspondence() {
        let store = presigning_store();
        let mut transport = MockPartTransport::new();
        transport.expect_put().times(5).returning(|url, _| {
            let n = url.rsplit('/').next().unwrap_or_default().to_string();
            Ok(ok_response(&format!("\"etag-{n}\"")))
        });

        let coordinator = MultipartCoordinator::new(store, transport);
        let uploads = (1..=5)
            .rev()
            .map(|n| coordinator.upload_part("data", "k", "X", n, vec![n as u8]));
        let parts = futures::future::try_join_all(uploads).await.unwrap();

        let mut session = UploadSession::new("data", "k");
        session.start("X").unwrap();
        for part in parts {
            session.record_part(part).unwrap();
        }

        let manifest = session.manifest();
        for (index, part) in manifest.iter().enumerate() {
            assert_eq!(part.part_number, index as i32 + 1);
            assert_eq!(part.etag, format!("etag-{}", part.part_number));
        }
    }

    #[tokio::test]
    async fn test_abandon_aborts_remote_upload() {
        let mut store = MockMultipartStore::new();
        store
            .expect_create_multipart_upload()
            .returning(|_, _| Ok("U9".to_string()));
        store
            .expect_abort_multipart_upload()
            .withf(|bucket, key, upload_id| bucket == "data" && key == "k" && upload_id == "U9")
            .times(1)
            .returning(|_, _, _| Ok(()));

        let coordinator = MultipartCoordinator::new(store, MockPartTransport::new());
        let mut session = coordinator.begin("data", "k").await.unwrap();
        coordinator.abandon(&mut session).await.unwrap();

        assert_eq!(session.state(), UploadState::Aborted);
        assert!(matches!(
            coordinator.finish(&mut session).await,
            Err(Error::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_finish_without_parts() {
        let mut store = MockMultipartStore::new();
        store
            .expect_create_multipart_upload()
            .returning(|_, _| Ok("U1".to_string()));
        store.expect_complete_multipart_upload().never();

        let coordinator = MultipartCoordinator::new(store, MockPartTransport::new());
        let mut session = coordinator.begin("data", "k").await.unwrap();
        assert!(matches!(
            coordinator.finish(&mut session).await,
            Err(Error::InvalidParts(_))
        ));
        assert_eq!(session.state(), UploadState::InProgress);
    }
}
