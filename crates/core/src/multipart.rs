//! Multipart upload data model
//!
//! Part records, the per-upload session state machine, and part-size planning
//! within the S3 limits.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default part size: 64 MiB
pub const DEFAULT_PART_SIZE: u64 = 64 * 1024 * 1024;

/// Minimum part size: 5 MiB (S3 requirement)
pub const MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Maximum part size: 5 GiB
pub const MAX_PART_SIZE: u64 = 5 * 1024 * 1024 * 1024;

/// Maximum number of parts: 10,000 (S3 limit)
pub const MAX_PARTS: usize = 10_000;

/// One successfully uploaded part
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartRecord {
    /// 1-based part number
    pub part_number: i32,
    /// ETag without surrounding quotes
    pub etag: String,
}

impl PartRecord {
    pub fn new(part_number: i32, etag: impl Into<String>) -> Self {
        Self {
            part_number,
            etag: etag.into(),
        }
    }
}

/// Result of combining the parts of an upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedUpload {
    pub bucket: String,
    pub key: String,
    pub location: Option<String>,
    pub etag: Option<String>,
}

/// Check that a part number is within the range the store accepts
pub fn check_part_number(part_number: i32) -> Result<()> {
    if part_number < 1 || part_number as usize > MAX_PARTS {
        return Err(Error::InvalidParts(format!(
            "Part number {part_number} is outside 1..={MAX_PARTS}"
        )));
    }
    Ok(())
}

/// Require parts to be strictly ascending, unique and contiguous from 1
///
/// The store itself accepts sparse but increasing numbering; this is a
/// stricter contract that callers opt into.
pub fn validate_part_sequence(parts: &[PartRecord]) -> Result<()> {
    if parts.is_empty() {
        return Err(Error::InvalidParts("No parts to complete".into()));
    }

    for (index, part) in parts.iter().enumerate() {
        let expected = index as i32 + 1;
        if part.part_number != expected {
            return Err(Error::InvalidParts(format!(
                "Expected part {expected} at position {}, found part {}",
                index + 1,
                part.part_number
            )));
        }
        if part.etag.is_empty() {
            return Err(Error::InvalidParts(format!(
                "Part {} has an empty ETag",
                part.part_number
            )));
        }
    }

    Ok(())
}

/// Lifecycle of a single multipart upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadState {
    NotStarted,
    InProgress,
    Completed,
    Aborted,
}

impl std::fmt::Display for UploadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            UploadState::NotStarted => "not started",
            UploadState::InProgress => "in progress",
            UploadState::Completed => "completed",
            UploadState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Client-side view of one multipart upload
///
/// Parts are keyed by part number, so an ETag can never drift away from the
/// part it belongs to, whatever order concurrent uploads finish in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadSession {
    pub bucket: String,
    pub key: String,
    upload_id: Option<String>,
    state: UploadState,
    parts: BTreeMap<i32, PartRecord>,
}

impl UploadSession {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            upload_id: None,
            state: UploadState::NotStarted,
            parts: BTreeMap::new(),
        }
    }

    pub fn state(&self) -> UploadState {
        self.state
    }

    /// Upload id assigned by the store, once started
    pub fn upload_id(&self) -> Option<&str> {
        self.upload_id.as_deref()
    }

    /// Upload id of an in-progress session
    pub fn active_upload_id(&self) -> Result<&str> {
        self.require(UploadState::InProgress, "use")?;
        self.upload_id
            .as_deref()
            .ok_or_else(|| Error::InvalidState("Upload has no id".into()))
    }

    /// Move from NotStarted to InProgress under the id the store assigned
    pub fn start(&mut self, upload_id: impl Into<String>) -> Result<()> {
        self.require(UploadState::NotStarted, "start")?;
        self.upload_id = Some(upload_id.into());
        self.state = UploadState::InProgress;
        Ok(())
    }

    /// Record a finished part
    ///
    /// Recording the same part number again replaces its ETag, matching what
    /// the store does when a part is re-uploaded.
    pub fn record_part(&mut self, part: PartRecord) -> Result<()> {
        self.require(UploadState::InProgress, "record a part for")?;
        check_part_number(part.part_number)?;
        self.parts.insert(part.part_number, part);
        Ok(())
    }

    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    /// Parts in ascending part-number order, ready for the combine call
    pub fn manifest(&self) -> Vec<PartRecord> {
        self.parts.values().cloned().collect()
    }

    pub fn mark_completed(&mut self) -> Result<()> {
        self.require(UploadState::InProgress, "complete")?;
        self.state = UploadState::Completed;
        Ok(())
    }

    pub fn mark_aborted(&mut self) -> Result<()> {
        self.require(UploadState::InProgress, "abort")?;
        self.state = UploadState::Aborted;
        Ok(())
    }

    fn require(&self, expected: UploadState, action: &str) -> Result<()> {
        if self.state != expected {
            return Err(Error::InvalidState(format!(
                "Cannot {action} upload {}/{} while it is {}",
                self.bucket, self.key, self.state
            )));
        }
        Ok(())
    }
}

/// Multipart upload configuration
#[derive(Debug, Clone)]
pub struct MultipartConfig {
    /// Part size in bytes
    pub part_size: u64,

    /// Number of parts in flight at once
    pub concurrency: usize,
}

impl Default for MultipartConfig {
    fn default() -> Self {
        Self {
            part_size: DEFAULT_PART_SIZE,
            concurrency: 4,
        }
    }
}

impl MultipartConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn part_size(mut self, size: u64) -> Self {
        self.part_size = size.clamp(MIN_PART_SIZE, MAX_PART_SIZE);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    /// Calculate appropriate part size for a file
    pub fn calculate_part_size(&self, file_size: u64) -> u64 {
        // If file fits in one part, use minimum
        if file_size <= MIN_PART_SIZE {
            return MIN_PART_SIZE;
        }

        let parts = file_size.div_ceil(self.part_size);

        if parts <= MAX_PARTS as u64 {
            self.part_size
        } else {
            // Need larger parts to fit within 10,000 limit
            let required_size = file_size.div_ceil(MAX_PARTS as u64);
            required_size.clamp(MIN_PART_SIZE, MAX_PART_SIZE)
        }
    }
}

/// Calculate number of parts for a file
///
/// An empty file still takes one (empty) part.
pub fn calculate_parts(file_size: u64, part_size: u64) -> usize {
    (file_size.div_ceil(part_size) as usize).max(1)
}

/// Half-open byte range `[start, end)` covered by a part
///
/// A part past the end of the object gets an empty range at `total_size`.
pub fn part_byte_range(part_number: i32, part_size: u64, total_size: u64) -> Result<(u64, u64)> {
    check_part_number(part_number)?;
    let start = (part_number as u64 - 1)
        .saturating_mul(part_size)
        .min(total_size);
    let end = start.saturating_add(part_size).min(total_size);
    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started() -> UploadSession {
        let mut session = UploadSession::new("data", "/f.bin");
        session.start("U1").unwrap();
        session
    }

    #[test]
    fn test_session_lifecycle() {
        let mut session = UploadSession::new("data", "/f.bin");
        assert_eq!(session.state(), UploadState::NotStarted);
        assert!(session.upload_id().is_none());

        session.start("U1").unwrap();
        assert_eq!(session.state(), UploadState::InProgress);
        assert_eq!(session.active_upload_id().unwrap(), "U1");

        session.mark_completed().unwrap();
        assert_eq!(session.state(), UploadState::Completed);
        assert!(matches!(
            session.active_upload_id(),
            Err(Error::InvalidState(_))
        ));
    }

    #[test]
    fn test_session_rejects_illegal_transitions() {
        let mut session = UploadSession::new("data", "k");
        assert!(matches!(
            session.record_part(PartRecord::new(1, "e1")),
            Err(Error::InvalidState(_))
        ));
        assert!(matches!(session.mark_completed(), Err(Error::InvalidState(_))));

        session.start("U1").unwrap();
        assert!(matches!(session.start("U2"), Err(Error::InvalidState(_))));

        session.mark_aborted().unwrap();
        assert_eq!(session.state(), UploadState::Aborted);
        assert!(matches!(session.mark_completed(), Err(Error::InvalidState(_))));
        assert!(matches!(
            session.record_part(PartRecord::new(1, "e1")),
            Err(Error::InvalidState(_))
        ));
    }

    #[test]
    fn test_manifest_is_ascending_regardless_of_record_order() {
        let mut session = started();
        session.record_part(PartRecord::new(3, "c")).unwrap();
        session.record_part(PartRecord::new(1, "a")).unwrap();
        session.record_part(PartRecord::new(2, "b")).unwrap();

        assert_eq!(
            session.manifest(),
            vec![
                PartRecord::new(1, "a"),
                PartRecord::new(2, "b"),
                PartRecord::new(3, "c"),
            ]
        );
    }

    #[test]
    fn test_rerecorded_part_replaces_etag() {
        let mut session = started();
        session.record_part(PartRecord::new(1, "old")).unwrap();
        session.record_part(PartRecord::new(1, "new")).unwrap();

        assert_eq!(session.part_count(), 1);
        assert_eq!(session.manifest()[0].etag, "new");
    }

    #[test]
    fn test_record_part_out_of_range() {
        let mut session = started();
        assert!(matches!(
            session.record_part(PartRecord::new(0, "e")),
            Err(Error::InvalidParts(_))
        ));
        assert!(matches!(
            session.record_part(PartRecord::new(10_001, "e")),
            Err(Error::InvalidParts(_))
        ));
    }

    #[test]
    fn test_validate_part_sequence() {
        let ok = vec![PartRecord::new(1, "a"), PartRecord::new(2, "b")];
        assert!(validate_part_sequence(&ok).is_ok());

        let gapped = vec![PartRecord::new(1, "a"), PartRecord::new(3, "c")];
        assert!(matches!(
            validate_part_sequence(&gapped),
            Err(Error::InvalidParts(_))
        ));

        let unordered = vec![PartRecord::new(2, "b"), PartRecord::new(1, "a")];
        assert!(validate_part_sequence(&unordered).is_err());

        let duplicate = vec![PartRecord::new(1, "a"), PartRecord::new(1, "a")];
        assert!(validate_part_sequence(&duplicate).is_err());

        assert!(validate_part_sequence(&[]).is_err());
        assert!(validate_part_sequence(&[PartRecord::new(1, "")]).is_err());
    }

    #[test]
    fn test_default_config() {
        let config = MultipartConfig::default();
        assert_eq!(config.part_size, DEFAULT_PART_SIZE);
        assert_eq!(config.concurrency, 4);
    }

    #[test]
    fn test_config_builder() {
        let config = MultipartConfig::new()
            .part_size(128 * 1024 * 1024)
            .concurrency(8);

        assert_eq!(config.part_size, 128 * 1024 * 1024);
        assert_eq!(config.concurrency, 8);
    }

    #[test]
    fn test_part_size_clamping() {
        let config = MultipartConfig::new().part_size(1024);
        assert_eq!(config.part_size, MIN_PART_SIZE);

        let config = MultipartConfig::new().part_size(10 * 1024 * 1024 * 1024);
        assert_eq!(config.part_size, MAX_PART_SIZE);

        assert_eq!(MultipartConfig::new().concurrency(0).concurrency, 1);
    }

    #[test]
    fn test_calculate_part_size_small_file() {
        let config = MultipartConfig::default();
        let size = config.calculate_part_size(1024 * 1024);
        assert_eq!(size, MIN_PART_SIZE);
    }

    #[test]
    fn test_calculate_part_size_large_file() {
        let config = MultipartConfig::default();
        // Would need more than 10,000 parts with the default size
        let huge_file = DEFAULT_PART_SIZE * 20_000;
        let size = config.calculate_part_size(huge_file);
        let parts = calculate_parts(huge_file, size);
        assert!(parts <= MAX_PARTS);
    }

    #[test]
    fn test_calculate_parts() {
        assert_eq!(calculate_parts(100, 10), 10);
        assert_eq!(calculate_parts(101, 10), 11);
        assert_eq!(calculate_parts(99, 10), 10);
        assert_eq!(calculate_parts(0, 10), 1);
    }

    #[test]
    fn test_part_byte_range() {
        assert_eq!(part_byte_range(1, 100, 250).unwrap(), (0, 100));
        assert_eq!(part_byte_range(2, 100, 250).unwrap(), (100, 200));
        // Last part is smaller
        assert_eq!(part_byte_range(3, 100, 250).unwrap(), (200, 250));
        assert_eq!(part_byte_range(4, 100, 250).unwrap(), (250, 250));
    }

    #[test]
    fn test_part_byte_range_rejects_out_of_range_numbers() {
        assert!(matches!(part_byte_range(0, 100, 250), Err(Error::InvalidParts(_))));
        assert!(matches!(part_byte_range(-3, 100, 250), Err(Error::InvalidParts(_))));
        assert!(matches!(
            part_byte_range(MAX_PARTS as i32 + 1, 100, 250),
            Err(Error::InvalidParts(_))
        ));
    }
}
