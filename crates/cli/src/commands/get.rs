//! get command - Download an object
//!
//! Streams the object body to a local file.

use std::path::{Path, PathBuf};

use clap::Args;
use serde::Serialize;
use stowage_core::{ObjectPath, ObjectStore as _, parse_object_path};

use super::{SessionOptions, open_session};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Download an object
#[derive(Args, Debug)]
pub struct GetArgs {
    /// Object path (bucket/key)
    pub source: String,

    /// Local destination (file or existing directory; defaults to the key's file name)
    pub target: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct GetOutput {
    status: &'static str,
    source: String,
    target: String,
    size_bytes: u64,
    size_human: String,
}

/// Pick the local file to write
fn local_target(source: &ObjectPath, target: Option<&Path>) -> Option<PathBuf> {
    match target {
        Some(path) if !path.is_dir() => Some(path.to_path_buf()),
        Some(dir) => source.file_name().map(|name| dir.join(name)),
        None => source.file_name().map(PathBuf::from),
    }
}

/// Execute the get command
pub async fn execute(args: GetArgs, session: &SessionOptions, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let source = match parse_object_path(&args.source) {
        Ok(p) => p,
        Err(e) => return formatter.fail("Invalid source path", &e),
    };
    let Some(target) = local_target(&source, args.target.as_deref()) else {
        formatter.error(&format!(
            "Cannot derive a local file name from '{source}'; give a destination"
        ));
        return ExitCode::UsageError;
    };

    let session = match open_session(session, &formatter).await {
        Ok(s) => s,
        Err(code) => return code,
    };
    let client = match session.client().await {
        Ok(c) => c,
        Err(e) => return formatter.fail("Failed to create client", &e),
    };

    let size = match client
        .download_object(&source.bucket, &source.key, &target)
        .await
    {
        Ok(size) => size,
        Err(e) => return formatter.fail(&format!("Failed to download '{source}'"), &e),
    };

    let size_human = humansize::format_size(size, humansize::BINARY);
    if formatter.is_json() {
        formatter.json(&GetOutput {
            status: "success",
            source: source.to_string(),
            target: target.display().to_string(),
            size_bytes: size,
            size_human,
        });
    } else {
        formatter.println(&format!(
            "{source} -> {} ({size_human})",
            target.display()
        ));
    }
    ExitCode::Success
}
