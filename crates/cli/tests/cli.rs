//! Offline tests for the stow binary
//!
//! Everything here runs without a storage server: profile management,
//! argument validation and the failures that must happen before any network
//! call.

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn run_stow(args: &[&str], config_dir: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_stow"))
        .args(args)
        .env("STOWAGE_CONFIG_DIR", config_dir)
        .env_remove("STOWAGE_TOKEN")
        .env_remove("STOWAGE_PROFILE")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute stow")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

/// Config dir with a token-only default profile pointing at a closed port
fn token_only_env() -> TempDir {
    let dir = TempDir::new().unwrap();
    let output = run_stow(
        &["profile", "set", "local", "http://127.0.0.1:1", "--default"],
        dir.path(),
    );
    assert!(output.status.success(), "{}", stderr(&output));
    dir
}

#[test]
fn test_profile_lifecycle() {
    let dir = TempDir::new().unwrap();

    let output = run_stow(
        &[
            "profile",
            "set",
            "minio",
            "http://localhost:9000",
            "--access-key",
            "minioadmin",
            "--secret-key",
            "minio-secret",
            "--json",
        ],
        dir.path(),
    );
    assert!(output.status.success(), "{}", stderr(&output));
    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["profile"], "minio");

    let output = run_stow(&["profile", "list", "--json"], dir.path());
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    let profiles = json["profiles"].as_array().unwrap();
    assert_eq!(profiles.len(), 1);
    assert_eq!(profiles[0]["endpoint"], "http://localhost:9000");
    assert_eq!(profiles[0]["static_keys"], true);
    assert!(!stdout(&output).contains("minio-secret"));

    let output = run_stow(&["profile", "remove", "minio"], dir.path());
    assert!(output.status.success());

    let output = run_stow(&["profile", "remove", "minio"], dir.path());
    assert_eq!(output.status.code(), Some(5));
}

#[cfg(unix)]
#[test]
fn test_config_file_is_private() {
    use std::os::unix::fs::PermissionsExt;

    let dir = token_only_env();
    let mode = std::fs::metadata(dir.path().join("config.toml"))
        .unwrap()
        .permissions()
        .mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[test]
fn test_profile_set_rejects_bad_endpoint() {
    let dir = TempDir::new().unwrap();
    let output = run_stow(&["profile", "set", "bad", "ftp://example.com"], dir.path());
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_missing_credentials_is_usage_error() {
    let dir = token_only_env();
    let output = run_stow(&["stat", "data/f.bin"], dir.path());
    assert_eq!(output.status.code(), Some(2), "{}", stderr(&output));
    assert!(stderr(&output).contains("static keys or a token"));
}

#[test]
fn test_missing_profile_is_usage_error() {
    let dir = TempDir::new().unwrap();
    let output = run_stow(&["stat", "data/f.bin"], dir.path());
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_unknown_profile_is_not_found() {
    let dir = token_only_env();
    let output = run_stow(&["stat", "data/f.bin", "--profile", "nope"], dir.path());
    assert_eq!(output.status.code(), Some(5));
}

#[test]
fn test_invalid_bucket_name() {
    let dir = token_only_env();
    let output = run_stow(&["mb", "Bad_Bucket"], dir.path());
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_stat_requires_key() {
    let dir = token_only_env();
    let output = run_stow(&["stat", "data", "--json"], dir.path());
    assert_eq!(output.status.code(), Some(2));

    let json: serde_json::Value = serde_json::from_str(&stderr(&output)).unwrap();
    assert_eq!(json["exit_code"], 2);
    assert_eq!(json["retryable"], false);
}

#[test]
fn test_credentials_requires_token() {
    let dir = token_only_env();
    let output = run_stow(&["credentials"], dir.path());
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_token_exchange_unreachable_is_network_error() {
    let dir = token_only_env();
    let output = run_stow(&["--token", "jwt", "credentials"], dir.path());
    assert_eq!(output.status.code(), Some(3), "{}", stderr(&output));
}

#[test]
fn test_policy_create_rejects_invalid_document() {
    let dir = token_only_env();
    let policy = dir.path().join("policy.json");
    std::fs::write(&policy, "not json").unwrap();

    let output = run_stow(
        &["policy", "create", "readonly", policy.to_str().unwrap()],
        dir.path(),
    );
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Invalid policy document"));
}

#[test]
fn test_upload_missing_file() {
    let dir = token_only_env();
    let output = run_stow(
        &["upload", "/nonexistent/file.bin", "data/file.bin"],
        dir.path(),
    );
    assert_ne!(output.status.code(), Some(0));
    assert!(stderr(&output).contains("Cannot read"));
}

#[test]
fn test_completions() {
    let dir = TempDir::new().unwrap();
    let output = run_stow(&["completions", "bash"], dir.path());
    assert!(output.status.success());
    assert!(stdout(&output).contains("stow"));
}
