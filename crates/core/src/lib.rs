//! stowage-core: Core library for the stowage S3 client
//!
//! This crate provides the core functionality shared by the stowage crates:
//! - Error taxonomy
//! - Credential sets and credential source resolution
//! - Profile and configuration management
//! - Path parsing
//! - Storage traits and the multipart upload coordinator
//!
//! This crate is designed to be independent of any specific S3 SDK,
//! allowing the coordinator to be tested against mocks.

pub mod admin;
pub mod config;
pub mod coordinator;
pub mod credentials;
pub mod error;
pub mod multipart;
pub mod path;
pub mod profile;
pub mod traits;

pub use admin::{Policy, PolicyApi};
pub use config::{Config, ConfigManager};
pub use coordinator::MultipartCoordinator;
pub use credentials::{CredentialSet, CredentialSource, DEFAULT_STS_DURATION_SECS};
pub use error::{Error, Result};
pub use multipart::{
    CompletedUpload, MultipartConfig, PartRecord, UploadSession, UploadState,
};
pub use path::{parse_object_path, parse_path, validate_bucket_name, ObjectPath};
pub use profile::{Profile, ProfileManager, TimeoutConfig};
pub use traits::{MultipartStore, ObjectInfo, ObjectStore, PartTransport, TransferResponse};
