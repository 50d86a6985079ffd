//! Error types for stowage-core
//!
//! Provides a unified error type shared by every stowage crate. Each variant
//! carries enough context (status, body, part number) for the caller to decide
//! whether to retry; nothing in the library retries on its own.

use thiserror::Error;

/// Result type alias for stowage operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for stowage operations
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or contradictory configuration, detected before any network call
    #[error("Configuration error: {0}")]
    Config(String),

    /// The STS-compatible endpoint rejected the web identity token
    #[error("Token exchange failed with HTTP {status}: {body}")]
    TokenExchange { status: u16, body: String },

    /// The binary transfer of a single part did not succeed
    #[error("Upload of part {part_number} failed with HTTP {status}: {body}")]
    PartUpload {
        part_number: i32,
        status: u16,
        body: String,
    },

    /// The canned policy does not exist on the store
    #[error("Policy {0} does not exist")]
    PolicyNotFound(String),

    /// Any other failure of a canned-policy call
    #[error("{0}")]
    PolicyOperation(String),

    /// Invalid bucket or object path
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Part list rejected by the contiguity contract or an out-of-range part number
    #[error("Invalid parts: {0}")]
    InvalidParts(String),

    /// Upload session used in a state that does not allow the operation
    #[error("Invalid upload state: {0}")]
    InvalidState(String),

    /// The remote answered with something we could not interpret
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// A request did not finish within its deadline
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Profile not found
    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    /// Profile already exists
    #[error("Profile already exists: {0}")]
    ProfileExists(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Authentication error
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Network error (retryable)
    #[error("Network error: {0}")]
    Network(String),

    /// Conflict error
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Operation outside what the store or this client supports
    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// General error
    #[error("{0}")]
    General(String),
}

impl Error {
    /// Get the appropriate exit code for this error
    pub const fn exit_code(&self) -> i32 {
        match self {
            Error::Config(_)
            | Error::InvalidPath(_)
            | Error::InvalidParts(_)
            | Error::InvalidState(_) => 2, // UsageError
            Error::Network(_) | Error::Timeout(_) | Error::PartUpload { .. } => 3,  // NetworkError
            Error::Auth(_) | Error::TokenExchange { .. } => 4,                      // AuthError
            Error::NotFound(_) | Error::ProfileNotFound(_) | Error::PolicyNotFound(_) => 5, // NotFound
            Error::Conflict(_) | Error::ProfileExists(_) => 6, // Conflict
            Error::UnsupportedFeature(_) => 7,                 // UnsupportedFeature
            _ => 1,                                            // GeneralError
        }
    }

    /// Whether retrying the same call may succeed
    ///
    /// Token exchanges and part uploads are retryable only when the store
    /// reported a server-side failure; a 4xx means the request itself is wrong.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Network(_) | Error::Timeout(_) => true,
            Error::TokenExchange { status, .. } | Error::PartUpload { status, .. } => {
                *status >= 500
            }
            _ => false,
        }
    }
}
