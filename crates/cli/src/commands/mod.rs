//! CLI command definitions and execution

use clap::{Parser, Subcommand};
use stowage_core::{ProfileManager, Result};
use stowage_s3::SessionManager;

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

mod abort;
mod completions;
mod cp;
mod credentials;
mod get;
mod mb;
mod policy;
mod profile;
mod rm;
mod share;
mod stat;
mod upload;

/// stow - client for S3-compatible object storage
///
/// Remote paths are written `bucket/key`; the endpoint comes from the active
/// profile.
#[derive(Parser, Debug)]
#[command(name = "stow")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format: human-readable or JSON
    #[arg(long, global = true, default_value = "false")]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true, default_value = "false")]
    pub no_color: bool,

    /// Disable progress bar
    #[arg(long, global = true, default_value = "false")]
    pub no_progress: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true, default_value = "false")]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(long, global = true, default_value = "false")]
    pub debug: bool,

    /// Profile to use (defaults to the configured default profile)
    #[arg(long, global = true, env = "STOWAGE_PROFILE")]
    pub profile: Option<String>,

    /// Identity token to exchange for temporary credentials
    ///
    /// When given, the profile's static keys are ignored.
    #[arg(long, global = true, env = "STOWAGE_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage connection profiles
    #[command(subcommand)]
    Profile(profile::ProfileCommands),

    /// Create a bucket
    Mb(mb::MbArgs),

    /// Show object metadata
    Stat(stat::StatArgs),

    /// Download an object to a local file
    Get(get::GetArgs),

    /// Copy an object server-side
    Cp(cp::CpArgs),

    /// Remove objects
    Rm(rm::RmArgs),

    /// Generate a presigned download URL
    Share(share::ShareArgs),

    /// Upload a local file with a parallel multipart upload
    Upload(upload::UploadArgs),

    /// Abort an unfinished multipart upload
    Abort(abort::AbortArgs),

    /// Manage canned policies
    #[command(subcommand)]
    Policy(policy::PolicyCommands),

    /// Exchange the identity token for temporary credentials
    Credentials(credentials::CredentialsArgs),

    /// Generate shell completion scripts
    Completions(completions::CompletionsArgs),
}

/// Profile and token selection shared by every storage command
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub profile: Option<String>,
    pub token: Option<String>,
}

impl SessionOptions {
    /// Resolve the profile and acquire credentials
    ///
    /// A token takes precedence over static keys stored on the profile.
    pub async fn connect(&self) -> Result<SessionManager> {
        let profile = ProfileManager::new()?.resolve(self.profile.as_deref())?;
        let static_keys = match self.token {
            Some(_) => None,
            None => profile.static_keys(),
        };
        tracing::debug!(
            profile = %profile.name,
            endpoint = %profile.endpoint,
            token = self.token.is_some(),
            "Opening session"
        );
        SessionManager::connect(profile, static_keys, self.token.clone()).await
    }
}

/// Open a session or report why it could not be opened
pub(crate) async fn open_session(
    options: &SessionOptions,
    formatter: &Formatter,
) -> std::result::Result<SessionManager, ExitCode> {
    options
        .connect()
        .await
        .map_err(|e| formatter.fail("Failed to open session", &e))
}

/// Execute the CLI command and return an exit code
pub async fn execute(cli: Cli) -> ExitCode {
    let output_config = OutputConfig {
        json: cli.json,
        no_color: cli.no_color,
        no_progress: cli.no_progress,
        quiet: cli.quiet,
    };
    let session = SessionOptions {
        profile: cli.profile,
        token: cli.token,
    };

    match cli.command {
        Commands::Profile(cmd) => profile::execute(cmd, output_config).await,
        Commands::Mb(args) => mb::execute(args, &session, output_config).await,
        Commands::Stat(args) => stat::execute(args, &session, output_config).await,
        Commands::Get(args) => get::execute(args, &session, output_config).await,
        Commands::Cp(args) => cp::execute(args, &session, output_config).await,
        Commands::Rm(args) => rm::execute(args, &session, output_config).await,
        Commands::Share(args) => share::execute(args, &session, output_config).await,
        Commands::Upload(args) => upload::execute(args, &session, output_config).await,
        Commands::Abort(args) => abort::execute(args, &session, output_config).await,
        Commands::Policy(cmd) => policy::execute(cmd, &session, output_config).await,
        Commands::Credentials(args) => {
            credentials::execute(args, &session, output_config).await
        }
        Commands::Completions(args) => completions::execute(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "stow", "stat", "data/f.bin", "--json", "--profile", "minio",
        ])
        .unwrap();
        assert!(cli.json);
        assert_eq!(cli.profile.as_deref(), Some("minio"));
        assert!(matches!(cli.command, Commands::Stat(_)));
    }

    #[test]
    fn test_token_flag() {
        let cli = Cli::try_parse_from(["stow", "--token", "jwt", "credentials"]).unwrap();
        assert_eq!(cli.token.as_deref(), Some("jwt"));
    }
}
