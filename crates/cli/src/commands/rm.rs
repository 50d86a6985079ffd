//! rm command - Remove objects

use clap::Args;
use serde::Serialize;
use stowage_core::{ObjectPath, ObjectStore as _, parse_object_path};

use super::{SessionOptions, open_session};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Remove objects
#[derive(Args, Debug)]
pub struct RmArgs {
    /// Object path(s) to remove (bucket/key)
    #[arg(required = true)]
    pub paths: Vec<String>,

    /// Only show what would be deleted
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Serialize)]
struct RmOutput {
    status: &'static str,
    deleted: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    failed: Vec<String>,
    total: usize,
}

/// Execute the rm command
///
/// Every path is attempted; the exit code reflects the first failure.
pub async fn execute(args: RmArgs, session: &SessionOptions, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let paths: Vec<ObjectPath> = match args
        .paths
        .iter()
        .map(|p| parse_object_path(p))
        .collect::<Result<_, _>>()
    {
        Ok(paths) => paths,
        Err(e) => return formatter.fail("Invalid path", &e),
    };

    if args.dry_run {
        for path in &paths {
            formatter.println(&format!("Would remove: {path}"));
        }
        return ExitCode::Success;
    }

    let session = match open_session(session, &formatter).await {
        Ok(s) => s,
        Err(code) => return code,
    };
    let client = match session.client().await {
        Ok(c) => c,
        Err(e) => return formatter.fail("Failed to create client", &e),
    };

    let mut deleted = Vec::new();
    let mut failed = Vec::new();
    let mut exit_code = ExitCode::Success;

    for path in &paths {
        match client.delete_object(&path.bucket, &path.key).await {
            Ok(()) => {
                if !formatter.is_json() {
                    formatter.println(&format!("Removed: {path}"));
                }
                deleted.push(path.to_string());
            }
            Err(e) => {
                let code = formatter.fail(&format!("Failed to remove '{path}'"), &e);
                if exit_code == ExitCode::Success {
                    exit_code = code;
                }
                failed.push(path.to_string());
            }
        }
    }

    if formatter.is_json() {
        let total = deleted.len();
        formatter.json(&RmOutput {
            status: if failed.is_empty() { "success" } else { "partial" },
            deleted,
            failed,
            total,
        });
    } else if !deleted.is_empty() {
        formatter.success(&format!("Removed {} object(s).", deleted.len()));
    }

    exit_code
}
