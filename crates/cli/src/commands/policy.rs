//! Canned policy commands

use std::path::{Path, PathBuf};

use clap::Subcommand;
use serde::Serialize;
use stowage_core::{Error, PolicyApi as _};

use super::{SessionOptions, open_session};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

#[derive(Subcommand, Debug)]
pub enum PolicyCommands {
    /// Create or replace a canned policy from a JSON document
    Create(CreateArgs),

    /// Show a canned policy
    Info(InfoArgs),

    /// Check whether a canned policy exists (exit code 5 when it does not)
    Exists(InfoArgs),
}

#[derive(clap::Args, Debug)]
pub struct CreateArgs {
    /// Policy name
    pub name: String,

    /// Path to the policy document (JSON)
    pub file: PathBuf,
}

#[derive(clap::Args, Debug)]
pub struct InfoArgs {
    /// Policy name
    pub name: String,
}

#[derive(Serialize)]
struct PolicyInfoOutput {
    name: String,
    policy: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    create_date: Option<String>,
}

#[derive(Serialize)]
struct PolicyExistsOutput {
    name: String,
    exists: bool,
}

/// A policy subcommand with its document already loaded
enum PolicyAction {
    Create { name: String, document: String },
    Info(String),
    Exists(String),
}

/// Execute a policy subcommand
pub async fn execute(
    cmd: PolicyCommands,
    session: &SessionOptions,
    output_config: OutputConfig,
) -> ExitCode {
    let formatter = Formatter::new(output_config);

    // Read the document before any network traffic
    let action = match cmd {
        PolicyCommands::Create(args) => match read_document(&args.file) {
            Ok(document) => PolicyAction::Create {
                name: args.name,
                document,
            },
            Err(e) => {
                return formatter.fail(
                    &format!("Invalid policy document '{}'", args.file.display()),
                    &e,
                );
            }
        },
        PolicyCommands::Info(args) => PolicyAction::Info(args.name),
        PolicyCommands::Exists(args) => PolicyAction::Exists(args.name),
    };

    let session = match open_session(session, &formatter).await {
        Ok(s) => s,
        Err(code) => return code,
    };
    let client = match session.policy_client() {
        Ok(c) => c,
        Err(e) => return formatter.fail("Failed to create admin client", &e),
    };

    match action {
        PolicyAction::Create { name, document } => {
            if let Err(e) = client.create_policy(&name, &document).await {
                return formatter.fail(&format!("Failed to create policy '{name}'"), &e);
            }
            if formatter.is_json() {
                formatter.json(&PolicyExistsOutput { name, exists: true });
            } else {
                formatter.success(&format!("Policy '{name}' created."));
            }
            ExitCode::Success
        }
        PolicyAction::Info(name) => match client.get_policy(&name).await {
            Ok(policy) => {
                if formatter.is_json() {
                    formatter.json(&PolicyInfoOutput {
                        create_date: policy.create_date().map(str::to_string),
                        name: policy.name,
                        policy: policy.document,
                    });
                } else {
                    formatter.println(&policy.document_pretty());
                }
                ExitCode::Success
            }
            Err(e) => formatter.fail("Failed to get policy", &e),
        },
        PolicyAction::Exists(name) => match client.policy_exists(&name).await {
            Ok(exists) => {
                if formatter.is_json() {
                    formatter.json(&PolicyExistsOutput {
                        name: name.clone(),
                        exists,
                    });
                } else if exists {
                    formatter.println(&format!("Policy '{name}' exists."));
                } else {
                    formatter.println(&format!("Policy '{name}' does not exist."));
                }
                if exists {
                    ExitCode::Success
                } else {
                    ExitCode::NotFound
                }
            }
            Err(e) => formatter.fail("Could not determine whether the policy exists", &e),
        },
    }
}

/// Read a policy document and make sure it is JSON
///
/// The text is sent as written; parsing only catches mistakes early.
fn read_document(path: &Path) -> Result<String, Error> {
    let text = std::fs::read_to_string(path)?;
    serde_json::from_str::<serde_json::Value>(&text)?;
    Ok(text)
}
