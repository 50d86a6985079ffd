//! Profile management commands
//!
//! Profiles are named references to S3-compatible endpoints, optionally
//! carrying static keys.

use clap::Subcommand;
use serde::Serialize;
use stowage_core::{Profile, ProfileManager, TimeoutConfig};

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

#[derive(Subcommand, Debug)]
pub enum ProfileCommands {
    /// Add or update a profile
    Set(SetArgs),

    /// List all configured profiles
    List(ListArgs),

    /// Remove a profile
    Remove(RemoveArgs),
}

#[derive(clap::Args, Debug)]
pub struct SetArgs {
    /// Profile name (e.g. "local", "minio")
    pub name: String,

    /// Endpoint URL including the scheme (e.g. "http://localhost:9000")
    pub endpoint: String,

    /// Access key ID (omit for token-only profiles)
    #[arg(long, requires = "secret_key")]
    pub access_key: Option<String>,

    /// Secret access key
    #[arg(long, requires = "access_key")]
    pub secret_key: Option<String>,

    /// Region used for signing
    #[arg(long, default_value = "us-east-1")]
    pub region: String,

    /// Allow insecure TLS connections
    #[arg(long, default_value = "false")]
    pub insecure: bool,

    /// Lifetime requested for temporary credentials, in seconds
    #[arg(long)]
    pub sts_duration: Option<u64>,

    /// Lifetime of presigned URLs, in seconds
    #[arg(long)]
    pub presign_expiry: Option<u64>,

    /// Deadline for the token exchange, in milliseconds
    #[arg(long)]
    pub sts_timeout_ms: Option<u64>,

    /// Make this the default profile
    #[arg(long)]
    pub default: bool,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Show region and credential details
    #[arg(short, long)]
    pub long: bool,
}

#[derive(clap::Args, Debug)]
pub struct RemoveArgs {
    /// Name of the profile to remove
    pub name: String,
}

#[derive(Serialize)]
struct ProfileListOutput {
    profiles: Vec<ProfileInfo>,
}

/// Profile information for output (never includes keys)
#[derive(Serialize)]
struct ProfileInfo {
    name: String,
    endpoint: String,
    region: String,
    static_keys: bool,
    insecure: bool,
}

impl From<&Profile> for ProfileInfo {
    fn from(profile: &Profile) -> Self {
        Self {
            name: profile.name.clone(),
            endpoint: profile.endpoint.clone(),
            region: profile.region.clone(),
            static_keys: profile.static_keys().is_some(),
            insecure: profile.insecure,
        }
    }
}

#[derive(Serialize)]
struct ProfileOperationOutput {
    success: bool,
    profile: String,
    message: String,
}

/// Execute a profile subcommand
pub async fn execute(cmd: ProfileCommands, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);
    let manager = match ProfileManager::new() {
        Ok(m) => m,
        Err(e) => return formatter.fail("Failed to load configuration", &e),
    };

    match cmd {
        ProfileCommands::Set(args) => execute_set(args, &manager, &formatter),
        ProfileCommands::List(args) => execute_list(args, &manager, &formatter),
        ProfileCommands::Remove(args) => execute_remove(args, &manager, &formatter),
    }
}

fn build_profile(args: &SetArgs) -> Profile {
    let mut profile = Profile::new(&args.name, &args.endpoint).with_region(&args.region);
    if let (Some(access_key), Some(secret_key)) = (&args.access_key, &args.secret_key) {
        profile = profile.with_keys(access_key, secret_key);
    }
    profile.insecure = args.insecure;
    if let Some(secs) = args.sts_duration {
        profile.sts_duration_secs = secs;
    }
    if let Some(secs) = args.presign_expiry {
        profile.presign_expiry_secs = secs;
    }
    if let Some(ms) = args.sts_timeout_ms {
        profile.timeout = Some(TimeoutConfig {
            sts_ms: ms,
            ..TimeoutConfig::default()
        });
    }
    profile
}

fn execute_set(args: SetArgs, manager: &ProfileManager, formatter: &Formatter) -> ExitCode {
    if args.name.is_empty() {
        formatter.error("Profile name cannot be empty");
        return ExitCode::UsageError;
    }

    let profile = build_profile(&args);
    if let Err(e) = manager.set(profile) {
        return formatter.fail("Failed to save profile", &e);
    }
    if args.default {
        if let Err(e) = manager.set_default(&args.name) {
            return formatter.fail("Failed to set default profile", &e);
        }
    }

    if formatter.is_json() {
        formatter.json(&ProfileOperationOutput {
            success: true,
            profile: args.name.clone(),
            message: format!("Profile '{}' configured successfully", args.name),
        });
    } else {
        formatter.success(&format!("Profile '{}' configured successfully.", args.name));
    }
    ExitCode::Success
}

fn execute_list(args: ListArgs, manager: &ProfileManager, formatter: &Formatter) -> ExitCode {
    let profiles = match manager.list() {
        Ok(p) => p,
        Err(e) => return formatter.fail("Failed to list profiles", &e),
    };

    if formatter.is_json() {
        formatter.json(&ProfileListOutput {
            profiles: profiles.iter().map(ProfileInfo::from).collect(),
        });
    } else if profiles.is_empty() {
        formatter.println("No profiles configured.");
    } else if args.long {
        for profile in &profiles {
            let keys = if profile.static_keys().is_some() {
                "static keys"
            } else {
                "token only"
            };
            formatter.println(&format!(
                "{:<12} {} (region: {}, {keys})",
                profile.name, profile.endpoint, profile.region
            ));
        }
    } else {
        for profile in &profiles {
            formatter.println(&format!("{:<12} {}", profile.name, profile.endpoint));
        }
    }
    ExitCode::Success
}

fn execute_remove(args: RemoveArgs, manager: &ProfileManager, formatter: &Formatter) -> ExitCode {
    if let Err(e) = manager.remove(&args.name) {
        return formatter.fail("Failed to remove profile", &e);
    }

    if formatter.is_json() {
        formatter.json(&ProfileOperationOutput {
            success: true,
            profile: args.name.clone(),
            message: format!("Profile '{}' removed successfully", args.name),
        });
    } else {
        formatter.success(&format!("Profile '{}' removed successfully.", args.name));
    }
    ExitCode::Success
}
