//! Path parsing
//!
//! Remote locations are written as `bucket/key`. The endpoint is chosen by the
//! active profile, so paths carry no endpoint component. Local paths are
//! passed through as-is.

use crate::error::{Error, Result};

/// A parsed remote path pointing to an object or a bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectPath {
    /// Bucket name
    pub bucket: String,
    /// Object key (empty for the bucket itself)
    pub key: String,
}

impl ObjectPath {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Whether this path names the bucket rather than an object in it
    pub fn is_bucket(&self) -> bool {
        self.key.is_empty()
    }

    /// Final component of the key, used as a default local file name
    pub fn file_name(&self) -> Option<&str> {
        self.key
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
    }
}

impl std::fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.key.is_empty() {
            write!(f, "{}", self.bucket)
        } else {
            write!(f, "{}/{}", self.bucket, self.key)
        }
    }
}

/// Parse `bucket[/key]`
///
/// Only the first slash separates bucket from key; everything after it,
/// including further slashes, belongs to the key.
pub fn parse_path(path: &str) -> Result<ObjectPath> {
    if path.is_empty() {
        return Err(Error::InvalidPath("Path cannot be empty".into()));
    }

    let (bucket, key) = match path.split_once('/') {
        Some((bucket, key)) => (bucket, key),
        None => (path, ""),
    };

    validate_bucket_name(bucket)?;
    Ok(ObjectPath::new(bucket, key))
}

/// Parse a path that must name an object, not just a bucket
pub fn parse_object_path(path: &str) -> Result<ObjectPath> {
    let parsed = parse_path(path)?;
    if parsed.is_bucket() {
        return Err(Error::InvalidPath(format!(
            "Expected bucket/key, got bucket only: {path}"
        )));
    }
    Ok(parsed)
}

/// Check a bucket name against the S3 naming rules
///
/// 3 to 63 characters of lowercase letters, digits, dots and hyphens,
/// starting and ending with a letter or digit, and not shaped like an IPv4
/// address.
pub fn validate_bucket_name(name: &str) -> Result<()> {
    if name.len() < 3 || name.len() > 63 {
        return Err(Error::InvalidPath(format!(
            "Bucket name must be 3 to 63 characters: {name}"
        )));
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-')
    {
        return Err(Error::InvalidPath(format!(
            "Bucket name may only contain lowercase letters, digits, dots and hyphens: {name}"
        )));
    }

    let alnum = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit();
    let first_ok = name.chars().next().is_some_and(alnum);
    let last_ok = name.chars().last().is_some_and(alnum);
    if !first_ok || !last_ok {
        return Err(Error::InvalidPath(format!(
            "Bucket name must start and end with a letter or digit: {name}"
        )));
    }

    if name.contains("..") {
        return Err(Error::InvalidPath(format!(
            "Bucket name must not contain consecutive dots: {name}"
        )));
    }

    if name.parse::<std::net::Ipv4Addr>().is_ok() {
        return Err(Error::InvalidPath(format!(
            "Bucket name must not be an IP address: {name}"
        )));
    }

    Ok(())
}
