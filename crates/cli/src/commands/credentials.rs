//! credentials command - Exchange an identity token
//!
//! Performs the token exchange on its own and prints the temporary
//! credentials, e.g. for handing them to other S3 tools.

use clap::Args;
use serde::Serialize;
use stowage_core::{CredentialSet, ProfileManager};
use stowage_s3::SessionManager;

use super::SessionOptions;
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Exchange the identity token for temporary credentials
#[derive(Args, Debug)]
pub struct CredentialsArgs {
    /// Requested lifetime in seconds (defaults to the profile setting)
    #[arg(long)]
    pub duration: Option<u64>,

    /// Include the secret key and session token in the output
    #[arg(long)]
    pub show_secret: bool,

    /// Print shell `export` lines for the AWS_* variables, secret key and token
    /// included; not combinable with --show-secret
    #[arg(long, conflicts_with = "show_secret")]
    pub export: bool,
}

#[derive(Debug, Serialize)]
struct CredentialsOutput {
    access_key_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    secret_access_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expiration: Option<String>,
}

impl CredentialsOutput {
    fn new(credentials: &CredentialSet, show_secret: bool) -> Self {
        Self {
            access_key_id: credentials.access_key().to_string(),
            secret_access_key: show_secret.then(|| credentials.secret_key().to_string()),
            session_token: if show_secret {
                credentials.session_token().map(str::to_string)
            } else {
                None
            },
            expiration: credentials.expiry().map(|t| t.to_string()),
        }
    }
}

fn export_lines(credentials: &CredentialSet) -> Vec<String> {
    let mut lines = vec![
        format!("export AWS_ACCESS_KEY_ID={}", credentials.access_key()),
        format!("export AWS_SECRET_ACCESS_KEY={}", credentials.secret_key()),
    ];
    if let Some(token) = credentials.session_token() {
        lines.push(format!("export AWS_SESSION_TOKEN={token}"));
    }
    lines
}

/// Execute the credentials command
pub async fn execute(
    args: CredentialsArgs,
    session: &SessionOptions,
    output_config: OutputConfig,
) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let Some(token) = session.token.clone() else {
        formatter.error("No identity token given; pass --token or set STOWAGE_TOKEN");
        return ExitCode::UsageError;
    };

    let profile = match ProfileManager::new().and_then(|m| m.resolve(session.profile.as_deref())) {
        Ok(p) => p,
        Err(e) => return formatter.fail("Failed to load profile", &e),
    };
    let duration = args.duration.unwrap_or(profile.sts_duration_secs);

    let session = match SessionManager::from_token(profile, token, duration).await {
        Ok(s) => s,
        Err(e) => return formatter.fail("Token exchange failed", &e),
    };
    let credentials = session.credentials();

    if args.export {
        for line in export_lines(&credentials) {
            println!("{line}");
        }
        return ExitCode::Success;
    }

    let output = CredentialsOutput::new(&credentials, args.show_secret);
    if formatter.is_json() {
        formatter.json(&output);
        return ExitCode::Success;
    }

    formatter.println(&format!("Access key : {}", output.access_key_id));
    if let Some(secret) = &output.secret_access_key {
        formatter.println(&format!("Secret key : {secret}"));
    }
    if let Some(token) = &output.session_token {
        formatter.println(&format!("Token      : {token}"));
    }
    match &output.expiration {
        Some(expiration) => formatter.println(&format!("Expires    : {expiration}")),
        None => formatter.println("Expires    : unknown"),
    }
    ExitCode::Success
}
