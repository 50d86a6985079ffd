//! abort command - Cancel a multipart upload
//!
//! Discards the parts stored so far. Use it for uploads left behind by an
//! interrupted `stow upload`.

use clap::Args;
use serde::Serialize;
use stowage_core::parse_object_path;

use super::{SessionOptions, open_session};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Abort an unfinished multipart upload
#[derive(Args, Debug)]
pub struct AbortArgs {
    /// Object path the upload targets (bucket/key)
    pub path: String,

    /// Upload ID printed when the upload was started
    pub upload_id: String,
}

#[derive(Debug, Serialize)]
struct AbortOutput {
    status: &'static str,
    bucket: String,
    key: String,
    upload_id: String,
}

/// Execute the abort command
pub async fn execute(
    args: AbortArgs,
    session: &SessionOptions,
    output_config: OutputConfig,
) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let path = match parse_object_path(&args.path) {
        Ok(p) => p,
        Err(e) => return formatter.fail("Invalid path", &e),
    };

    let session = match open_session(session, &formatter).await {
        Ok(s) => s,
        Err(code) => return code,
    };
    let coordinator = match session.coordinator().await {
        Ok(c) => c,
        Err(e) => return formatter.fail("Failed to create client", &e),
    };

    if let Err(e) = coordinator
        .abort_upload(&path.bucket, &path.key, &args.upload_id)
        .await
    {
        return formatter.fail(&format!("Failed to abort upload {}", args.upload_id), &e);
    }

    if formatter.is_json() {
        formatter.json(&AbortOutput {
            status: "aborted",
            bucket: path.bucket,
            key: path.key,
            upload_id: args.upload_id,
        });
    } else {
        formatter.success(&format!("Aborted upload {} for '{path}'.", args.upload_id));
    }
    ExitCode::Success
}
