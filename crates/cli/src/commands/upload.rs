//! upload command - Parallel multipart upload
//!
//! Splits a local file into parts, pushes them through presigned URLs with a
//! bounded number in flight and combines them into one object. Any part
//! failure aborts the upload so no orphaned parts are left on the store.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use clap::Args;
use futures::{StreamExt, TryStreamExt, stream};
use serde::Serialize;
use stowage_core::multipart::{calculate_parts, part_byte_range};
use stowage_core::{
    Error, MultipartConfig, MultipartCoordinator, MultipartStore, ObjectPath, PartRecord,
    PartTransport, Result, parse_path,
};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use super::{SessionOptions, open_session};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig, TransferProgress};

/// Upload a local file as a multipart upload
#[derive(Args, Debug)]
pub struct UploadArgs {
    /// Local file to upload
    pub source: PathBuf,

    /// Destination (bucket/key, or bucket/prefix/ to keep the file name)
    pub target: String,

    /// Part size in MiB (5 to 5120; grown automatically for very large files)
    #[arg(long)]
    pub part_size: Option<u64>,

    /// Number of parts transferred at once
    #[arg(long, default_value_t = 4)]
    pub concurrency: usize,
}

#[derive(Debug, Serialize)]
struct UploadOutput {
    status: &'static str,
    bucket: String,
    key: String,
    upload_id: String,
    parts: usize,
    size_bytes: u64,
    size_human: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    etag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<String>,
}

/// How a file is cut into parts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct UploadPlan {
    size: u64,
    part_size: u64,
    parts: usize,
}

impl UploadPlan {
    fn new(size: u64, config: &MultipartConfig) -> Self {
        let part_size = config.calculate_part_size(size);
        Self {
            size,
            part_size,
            parts: calculate_parts(size, part_size),
        }
    }
}

fn multipart_config(args: &UploadArgs) -> MultipartConfig {
    let config = MultipartConfig::new().concurrency(args.concurrency);
    match args.part_size {
        Some(mib) => config.part_size(mib.saturating_mul(1024 * 1024)),
        None => config,
    }
}

/// Append the file name when the target names a bucket or prefix
fn resolve_target(source: &Path, target: ObjectPath) -> Option<ObjectPath> {
    if !target.key.is_empty() && !target.key.ends_with('/') {
        return Some(target);
    }
    let name = source.file_name()?.to_str()?;
    let key = format!("{}{name}", target.key);
    Some(ObjectPath::new(target.bucket, key))
}

async fn read_part(path: &Path, start: u64, end: u64) -> Result<Vec<u8>> {
    let mut file = tokio::fs::File::open(path).await?;
    file.seek(SeekFrom::Start(start)).await?;
    let mut content = vec![0u8; (end - start) as usize];
    file.read_exact(&mut content).await?;
    Ok(content)
}

/// Upload every part of the plan, at most `concurrency` at a time
///
/// Stops at the first failed part. The returned records are in part order.
async fn upload_parts<S, T>(
    coordinator: &MultipartCoordinator<S, T>,
    source: &Path,
    target: &ObjectPath,
    upload_id: &str,
    plan: UploadPlan,
    concurrency: usize,
    progress: &TransferProgress,
) -> Result<Vec<PartRecord>>
where
    S: MultipartStore,
    T: PartTransport,
{
    let mut parts: Vec<PartRecord> = stream::iter(1..=plan.parts as i32)
        .map(move |part_number| async move {
            let (start, end) = part_byte_range(part_number, plan.part_size, plan.size)?;
            let content = read_part(source, start, end).await?;
            let len = content.len() as u64;
            let record = coordinator
                .upload_part(&target.bucket, &target.key, upload_id, part_number, content)
                .await?;
            progress.inc(len);
            Ok::<_, Error>(record)
        })
        .buffer_unordered(concurrency)
        .try_collect()
        .await?;

    parts.sort_by_key(|p| p.part_number);
    Ok(parts)
}

/// Execute the upload command
pub async fn execute(
    args: UploadArgs,
    session: &SessionOptions,
    output_config: OutputConfig,
) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let target = match parse_path(&args.target) {
        Ok(p) => p,
        Err(e) => return formatter.fail("Invalid target path", &e),
    };
    let Some(target) = resolve_target(&args.source, target) else {
        formatter.error("Cannot derive an object key from the source file name");
        return ExitCode::UsageError;
    };

    let metadata = match tokio::fs::metadata(&args.source).await {
        Ok(m) => m,
        Err(e) => {
            return formatter.fail(
                &format!("Cannot read '{}'", args.source.display()),
                &Error::Io(e),
            );
        }
    };
    if !metadata.is_file() {
        formatter.error(&format!("'{}' is not a regular file", args.source.display()));
        return ExitCode::UsageError;
    }

    let config = multipart_config(&args);
    let plan = UploadPlan::new(metadata.len(), &config);

    let session = match open_session(session, &formatter).await {
        Ok(s) => s,
        Err(code) => return code,
    };
    let coordinator = match session.coordinator().await {
        Ok(c) => c,
        Err(e) => return formatter.fail("Failed to create client", &e),
    };

    let upload_id = match coordinator.prepare_upload(&target.bucket, &target.key).await {
        Ok(id) => id,
        Err(e) => return formatter.fail(&format!("Failed to start upload to '{target}'"), &e),
    };
    tracing::info!(
        upload_id = %upload_id,
        parts = plan.parts,
        part_size = plan.part_size,
        "Uploading {}",
        args.source.display()
    );

    let progress = TransferProgress::new(formatter.config(), plan.size);
    progress.set_message(format!("{} part(s)", plan.parts));

    let result = match upload_parts(
        &coordinator,
        &args.source,
        &target,
        &upload_id,
        plan,
        config.concurrency,
        &progress,
    )
    .await
    {
        Ok(parts) => {
            coordinator
                .complete_upload_checked(&target.bucket, &target.key, &upload_id, &parts)
                .await
        }
        Err(e) => Err(e),
    };

    let completed = match result {
        Ok(completed) => completed,
        Err(e) => {
            progress.abandon();
            if let Err(abort_err) = coordinator
                .abort_upload(&target.bucket, &target.key, &upload_id)
                .await
            {
                tracing::warn!(upload_id = %upload_id, error = %abort_err, "Abort failed");
                formatter.warning(&format!(
                    "Could not abort upload {upload_id}; run `stow abort {target} {upload_id}`"
                ));
            }
            return formatter.fail(&format!("Upload to '{target}' failed"), &e);
        }
    };
    progress.finish_and_clear();

    let size_human = humansize::format_size(plan.size, humansize::BINARY);
    if formatter.is_json() {
        formatter.json(&UploadOutput {
            status: "success",
            bucket: completed.bucket,
            key: completed.key,
            upload_id,
            parts: plan.parts,
            size_bytes: plan.size,
            size_human,
            etag: completed.etag,
            location: completed.location,
        });
    } else {
        formatter.success(&format!(
            "{} -> {target} ({size_human}, {} part(s))",
            args.source.display(),
            plan.parts
        ));
    }
    ExitCode::Success
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use stowage_core::multipart::{DEFAULT_PART_SIZE, MIN_PART_SIZE};
    use tempfile::NamedTempFile;

    #[test]
    fn test_plan_small_file_single_part() {
        let plan = UploadPlan::new(1024, &MultipartConfig::default());
        assert_eq!(plan.parts, 1);
        assert_eq!(plan.part_size, MIN_PART_SIZE);
    }

    #[test]
    fn test_plan_empty_file() {
        let plan = UploadPlan::new(0, &MultipartConfig::default());
        assert_eq!(plan.parts, 1);
    }

    #[test]
    fn test_plan_multiple_parts() {
        let size = DEFAULT_PART_SIZE * 2 + 1;
        let plan = UploadPlan::new(size, &MultipartConfig::default());
        assert_eq!(plan.part_size, DEFAULT_PART_SIZE);
        assert_eq!(plan.parts, 3);
    }

    #[test]
    fn test_part_size_flag_is_clamped() {
        let args = UploadArgs {
            source: PathBuf::from("f.bin"),
            target: "data/f.bin".into(),
            part_size: Some(1),
            concurrency: 0,
        };
        let config = multipart_config(&args);
        assert_eq!(config.part_size, MIN_PART_SIZE);
        assert_eq!(config.concurrency, 1);
    }

    #[test]
    fn test_resolve_target_keeps_explicit_key() {
        let target = resolve_target(Path::new("/tmp/f.bin"), ObjectPath::new("data", "x/y.bin"));
        assert_eq!(target, Some(ObjectPath::new("data", "x/y.bin")));
    }

    #[test]
    fn test_resolve_target_appends_file_name() {
        let target = resolve_target(Path::new("/tmp/f.bin"), ObjectPath::new("data", "in/"));
        assert_eq!(target, Some(ObjectPath::new("data", "in/f.bin")));

        let target = resolve_target(Path::new("f.bin"), ObjectPath::new("data", ""));
        assert_eq!(target, Some(ObjectPath::new("data", "f.bin")));
    }

    #[tokio::test]
    async fn test_read_part_ranges() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"0123456789").unwrap();
        file.flush().unwrap();

        let (start, end) = part_byte_range(2, 4, 10).unwrap();
        assert_eq!(read_part(file.path(), start, end).await.unwrap(), b"4567");

        let (start, end) = part_byte_range(3, 4, 10).unwrap();
        assert_eq!(read_part(file.path(), start, end).await.unwrap(), b"89");
    }
}
