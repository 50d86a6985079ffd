//! cp command - Server-side copy
//!
//! Copies one object to another location on the same store without moving
//! the bytes through this machine. Sources above 5 GiB are rejected.

use clap::Args;
use serde::Serialize;
use stowage_core::{ObjectPath, ObjectStore as _, parse_object_path, parse_path};

use super::{SessionOptions, open_session};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Copy an object server-side
#[derive(Args, Debug)]
pub struct CpArgs {
    /// Source object (bucket/key)
    pub source: String,

    /// Destination (bucket/key, or bucket/prefix/ to keep the source name)
    pub target: String,
}

#[derive(Debug, Serialize)]
struct CpOutput {
    status: &'static str,
    source: String,
    target: String,
    size_bytes: i64,
    size_human: String,
}

/// Fill in the destination key when the target names a bucket or prefix
fn resolve_target(source: &ObjectPath, target: ObjectPath) -> ObjectPath {
    if target.key.is_empty() || target.key.ends_with('/') {
        let name = source.file_name().unwrap_or(&source.key);
        let key = format!("{}{name}", target.key);
        ObjectPath::new(target.bucket, key)
    } else {
        target
    }
}

/// Execute the cp command
pub async fn execute(args: CpArgs, session: &SessionOptions, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let source = match parse_object_path(&args.source) {
        Ok(p) => p,
        Err(e) => return formatter.fail("Invalid source path", &e),
    };
    let target = match parse_path(&args.target) {
        Ok(p) => resolve_target(&source, p),
        Err(e) => return formatter.fail("Invalid target path", &e),
    };
    if source == target {
        formatter.error("Source and target are the same object");
        return ExitCode::UsageError;
    }

    let session = match open_session(session, &formatter).await {
        Ok(s) => s,
        Err(code) => return code,
    };
    let client = match session.client().await {
        Ok(c) => c,
        Err(e) => return formatter.fail("Failed to create client", &e),
    };

    let info = match client
        .copy_object(&source.bucket, &source.key, &target.bucket, &target.key)
        .await
    {
        Ok(info) => info,
        Err(e) => return formatter.fail(&format!("Failed to copy '{source}'"), &e),
    };

    if formatter.is_json() {
        formatter.json(&CpOutput {
            status: "success",
            source: source.to_string(),
            target: target.to_string(),
            size_bytes: info.size_bytes,
            size_human: info.size_human,
        });
    } else {
        formatter.println(&format!("{source} -> {target} ({})", info.size_human));
    }
    ExitCode::Success
}
