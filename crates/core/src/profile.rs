//! Profile management
//!
//! Profiles are named references to S3-compatible storage endpoints,
//! including connection details and, optionally, static credentials.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::ConfigManager;
use crate::credentials::DEFAULT_STS_DURATION_SECS;
use crate::error::{Error, Result};

/// Default presigned URL lifetime, in seconds
pub const DEFAULT_PRESIGN_EXPIRY_SECS: u64 = 3600;

/// Timeout configuration for a profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Connection timeout in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_ms: u64,

    /// Read timeout in milliseconds
    #[serde(default = "default_read_timeout")]
    pub read_ms: u64,

    /// Whole-request deadline for the token exchange, in milliseconds
    #[serde(default = "default_sts_timeout")]
    pub sts_ms: u64,
}

fn default_connect_timeout() -> u64 {
    5000
}

fn default_read_timeout() -> u64 {
    30000
}

fn default_sts_timeout() -> u64 {
    30000
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: default_connect_timeout(),
            read_ms: default_read_timeout(),
            sts_ms: default_sts_timeout(),
        }
    }
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_ms)
    }

    pub fn read(&self) -> Duration {
        Duration::from_millis(self.read_ms)
    }

    pub fn sts(&self) -> Duration {
        Duration::from_millis(self.sts_ms)
    }
}

/// A profile represents a named S3-compatible storage endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Unique name for this profile
    pub name: String,

    /// Endpoint URL including the scheme, e.g. `http://minio.local:9000`
    pub endpoint: String,

    /// Region used for signing
    #[serde(default = "default_region")]
    pub region: String,

    /// Access key ID, when the profile carries static keys
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,

    /// Secret access key, when the profile carries static keys
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,

    /// Allow insecure TLS connections
    #[serde(default)]
    pub insecure: bool,

    /// Lifetime requested for temporary credentials
    #[serde(default = "default_sts_duration")]
    pub sts_duration_secs: u64,

    /// Lifetime of presigned URLs
    #[serde(default = "default_presign_expiry")]
    pub presign_expiry_secs: u64,

    /// Timeout configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<TimeoutConfig>,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_sts_duration() -> u64 {
    DEFAULT_STS_DURATION_SECS
}

fn default_presign_expiry() -> u64 {
    DEFAULT_PRESIGN_EXPIRY_SECS
}

impl Profile {
    /// Create a new profile with no stored credentials
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            region: default_region(),
            access_key: None,
            secret_key: None,
            insecure: false,
            sts_duration_secs: default_sts_duration(),
            presign_expiry_secs: default_presign_expiry(),
            timeout: None,
        }
    }

    /// Attach static credentials to the profile
    pub fn with_keys(mut self, access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        self.access_key = Some(access_key.into());
        self.secret_key = Some(secret_key.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Static keys stored on the profile, if both halves are present
    pub fn static_keys(&self) -> Option<(String, String)> {
        match (&self.access_key, &self.secret_key) {
            (Some(access), Some(secret)) => Some((access.clone(), secret.clone())),
            _ => None,
        }
    }

    /// Endpoint without a trailing slash
    pub fn endpoint_url(&self) -> &str {
        self.endpoint.trim_end_matches('/')
    }

    /// Parse and check the endpoint
    pub fn validate(&self) -> Result<url::Url> {
        let url = url::Url::parse(self.endpoint_url())?;
        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(Error::Config(format!(
                    "Endpoint scheme must be http or https, got '{other}'"
                )));
            }
        }
        if url.host_str().is_none() {
            return Err(Error::Config(format!(
                "Endpoint has no host: {}",
                self.endpoint
            )));
        }
        Ok(url)
    }

    /// Get the effective timeout configuration
    pub fn timeout_config(&self) -> TimeoutConfig {
        self.timeout.clone().unwrap_or_default()
    }

    pub fn presign_expiry(&self) -> Duration {
        Duration::from_secs(self.presign_expiry_secs)
    }
}

/// Manager for profile operations
pub struct ProfileManager {
    config_manager: ConfigManager,
}

impl ProfileManager {
    /// Create a new ProfileManager with a specific ConfigManager
    pub fn with_config_manager(config_manager: ConfigManager) -> Self {
        Self { config_manager }
    }

    /// Create a new ProfileManager using the default config location
    pub fn new() -> Result<Self> {
        let config_manager = ConfigManager::new()?;
        Ok(Self { config_manager })
    }

    /// List all configured profiles
    pub fn list(&self) -> Result<Vec<Profile>> {
        let config = self.config_manager.load()?;
        Ok(config.profiles)
    }

    /// Get a profile by name
    pub fn get(&self, name: &str) -> Result<Profile> {
        let config = self.config_manager.load()?;
        config
            .profile(name)
            .cloned()
            .ok_or_else(|| Error::ProfileNotFound(name.to_string()))
    }

    /// Get the named profile, or the configured default when `name` is None
    pub fn resolve(&self, name: Option<&str>) -> Result<Profile> {
        match name {
            Some(name) => self.get(name),
            None => {
                let config = self.config_manager.load()?;
                let default = config.default_profile.as_deref().ok_or_else(|| {
                    Error::Config("No profile given and no default profile configured".into())
                })?;
                config
                    .profile(default)
                    .cloned()
                    .ok_or_else(|| Error::ProfileNotFound(default.to_string()))
            }
        }
    }

    /// Add or update a profile
    pub fn set(&self, profile: Profile) -> Result<()> {
        profile.validate()?;
        let mut config = self.config_manager.load()?;
        let name = profile.name.clone();
        if config.upsert_profile(profile) {
            tracing::debug!(profile = %name, "Replaced existing profile");
        }
        self.config_manager.save(&config)
    }

    /// Remove a profile
    pub fn remove(&self, name: &str) -> Result<()> {
        let mut config = self.config_manager.load()?;
        config
            .remove_profile(name)
            .ok_or_else(|| Error::ProfileNotFound(name.to_string()))?;
        self.config_manager.save(&config)
    }

    /// Make a profile the default for commands that do not name one
    pub fn set_default(&self, name: &str) -> Result<()> {
        let mut config = self.config_manager.load()?;
        config.set_default_profile(name)?;
        self.config_manager.save(&config)
    }

    /// Check if a profile exists
    pub fn exists(&self, name: &str) -> Result<bool> {
        let config = self.config_manager.load()?;
        Ok(config.profile(name).is_some())
    }
}
