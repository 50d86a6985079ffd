//! stat command - Show object metadata

use clap::Args;
use serde::Serialize;
use stowage_core::{ObjectInfo, ObjectStore as _, parse_object_path};

use super::{SessionOptions, open_session};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Show object metadata
#[derive(Args, Debug)]
pub struct StatArgs {
    /// Object path (bucket/key)
    pub path: String,
}

#[derive(Debug, Serialize)]
struct StatOutput {
    bucket: String,
    key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_modified: Option<String>,
    size_bytes: i64,
    size_human: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    etag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    storage_class: Option<String>,
}

impl StatOutput {
    fn new(bucket: &str, info: ObjectInfo) -> Self {
        Self {
            bucket: bucket.to_string(),
            key: info.key,
            last_modified: info.last_modified.map(|t| t.to_string()),
            size_bytes: info.size_bytes,
            size_human: info.size_human,
            etag: info.etag,
            content_type: info.content_type,
            storage_class: info.storage_class,
        }
    }
}

/// Execute the stat command
pub async fn execute(
    args: StatArgs,
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
    let client = match session.client().await {
        Ok(c) => c,
        Err(e) => return formatter.fail("Failed to create client", &e),
    };

    let info = match client.stat_object(&path.bucket, &path.key).await {
        Ok(info) => info,
        Err(e) => return formatter.fail(&format!("Failed to stat '{path}'"), &e),
    };
    let output = StatOutput::new(&path.bucket, info);

    if formatter.is_json() {
        formatter.json(&output);
        return ExitCode::Success;
    }

    formatter.println(&format!("Name      : {}/{}", output.bucket, output.key));
    if let Some(modified) = &output.last_modified {
        formatter.println(&format!("Date      : {modified}"));
    }
    formatter.println(&format!(
        "Size      : {} ({} bytes)",
        output.size_human, output.size_bytes
    ));
    if let Some(etag) = &output.etag {
        formatter.println(&format!("ETag      : {etag}"));
    }
    if let Some(ct) = &output.content_type {
        formatter.println(&format!("Type      : {ct}"));
    }
    if let Some(sc) = &output.storage_class {
        formatter.println(&format!("Class     : {sc}"));
    }
    ExitCode::Success
}
