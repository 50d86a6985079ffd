//! mb command - Make bucket
//!
//! Creates a bucket and optionally turns on default encryption and
//! versioning.

use clap::Args;
use serde::Serialize;
use stowage_core::{Error, ObjectStore as _, validate_bucket_name};

use super::{SessionOptions, open_session};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Create a bucket
#[derive(Args, Debug)]
pub struct MbArgs {
    /// Bucket name
    pub bucket: String,

    /// Succeed if the bucket already exists
    #[arg(short = 'p', long)]
    pub ignore_existing: bool,

    /// Enable default server-side encryption (SSE-S3, AES256)
    #[arg(long)]
    pub encrypt: bool,

    /// Enable versioning on the bucket
    #[arg(long)]
    pub versioning: bool,
}

#[derive(Debug, Serialize)]
struct MbOutput {
    status: &'static str,
    bucket: String,
    created: bool,
    encrypted: bool,
    versioned: bool,
}

/// Execute the mb command
pub async fn execute(args: MbArgs, session: &SessionOptions, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let bucket = args.bucket.trim_end_matches('/').to_string();
    if let Err(e) = validate_bucket_name(&bucket) {
        return formatter.fail("Invalid bucket", &e);
    }

    let session = match open_session(session, &formatter).await {
        Ok(s) => s,
        Err(code) => return code,
    };
    let client = match session.client().await {
        Ok(c) => c,
        Err(e) => return formatter.fail("Failed to create client", &e),
    };

    let created = match client.create_bucket(&bucket).await {
        Ok(()) => true,
        Err(Error::Conflict(_)) if args.ignore_existing => false,
        Err(e) => return formatter.fail(&format!("Failed to create bucket '{bucket}'"), &e),
    };

    if args.encrypt {
        if let Err(e) = client.set_bucket_encryption(&bucket).await {
            return formatter.fail(&format!("Failed to enable encryption on '{bucket}'"), &e);
        }
    }
    if args.versioning {
        if let Err(e) = client.set_bucket_versioning(&bucket, true).await {
            return formatter.fail(&format!("Failed to enable versioning on '{bucket}'"), &e);
        }
    }

    if formatter.is_json() {
        formatter.json(&MbOutput {
            status: "success",
            bucket,
            created,
            encrypted: args.encrypt,
            versioned: args.versioning,
        });
    } else if created {
        formatter.success(&format!("Bucket '{bucket}' created successfully."));
    } else {
        formatter.success(&format!("Bucket '{bucket}' already exists."));
    }
    ExitCode::Success
}
