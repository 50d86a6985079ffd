//! share command - Presigned download URL

use std::time::Duration;

use clap::Args;
use serde::Serialize;
use stowage_core::{ObjectStore as _, parse_object_path};

use super::{SessionOptions, open_session};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Longest lifetime SigV4 presigning allows
const MAX_EXPIRY_SECS: u64 = 7 * 24 * 3600;

/// Generate a presigned download URL
#[derive(Args, Debug)]
pub struct ShareArgs {
    /// Object path (bucket/key)
    pub path: String,

    /// URL lifetime in seconds (defaults to the profile's presign expiry)
    #[arg(long)]
    pub expire: Option<u64>,
}

#[derive(Debug, Serialize)]
struct ShareOutput {
    url: String,
    expires_in_secs: u64,
    expires_at: String,
}

/// Execute the share command
pub async fn execute(
    args: ShareArgs,
    session: &SessionOptions,
    output_config: OutputConfig,
) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let path = match parse_object_path(&args.path) {
        Ok(p) => p,
        Err(e) => return formatter.fail("Invalid path", &e),
    };
    if let Some(secs) = args.expire {
        if secs == 0 || secs > MAX_EXPIRY_SECS {
            formatter.error(&format!(
                "Expiry must be between 1 and {MAX_EXPIRY_SECS} seconds"
            ));
            return ExitCode::UsageError;
        }
    }

    let session = match open_session(session, &formatter).await {
        Ok(s) => s,
        Err(code) => return code,
    };
    let expires_in = args
        .expire
        .unwrap_or(session.profile().presign_expiry_secs);
    let client = match session.client().await {
        Ok(c) => c,
        Err(e) => return formatter.fail("Failed to create client", &e),
    };

    let url = match client
        .presigned_get_url(&path.bucket, &path.key, Duration::from_secs(expires_in))
        .await
    {
        Ok(url) => url,
        Err(e) => return formatter.fail(&format!("Failed to presign '{path}'"), &e),
    };

    let expires_at = jiff::Timestamp::now()
        .checked_add(jiff::SignedDuration::from_secs(expires_in as i64))
        .map(|t| t.to_string())
        .unwrap_or_default();

    if formatter.is_json() {
        formatter.json(&ShareOutput {
            url,
            expires_in_secs: expires_in,
            expires_at,
        });
    } else {
        formatter.println(&url);
        if !formatter.is_quiet() {
            eprintln!("Expires at {expires_at}");
        }
    }
    ExitCode::Success
}
