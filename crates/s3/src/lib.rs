//! stowage-s3: S3 SDK, token exchange and admin-API adapter for stowage
//!
//! This crate implements the storage traits from stowage-core using the
//! aws-sdk-s3 crate, exchanges bearer tokens for temporary credentials, and
//! signs the administrative policy requests the SDK does not cover. It is the
//! only crate that directly depends on the AWS SDK or an HTTP client.

pub mod admin;
pub mod client;
pub mod session;
pub mod signer;
pub mod sts;
pub mod transfer;

pub use admin::PolicyClient;
pub use client::S3Client;
pub use session::SessionManager;
pub use signer::{SignedRequest, SigningRequest, sign_request};
pub use sts::StsClient;
pub use transfer::HttpPartTransport;
