//! Configuration file
//!
//! Profiles live in a TOML file at `<config dir>/stowage/config.toml`, or
//! under `$STOWAGE_CONFIG_DIR` when that variable is set. The file can hold
//! secret keys: it is written owner read/write only and replaced atomically,
//! so a crash mid-save never leaves a truncated file behind.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::profile::Profile;

/// Current configuration schema version
pub const SCHEMA_VERSION: u32 = 1;

/// Environment variable overriding the configuration directory
pub const CONFIG_DIR_ENV: &str = "STOWAGE_CONFIG_DIR";

const CONFIG_FILE: &str = "config.toml";

/// Contents of the configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub schema_version: u32,

    /// Profile used when a command does not name one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_profile: Option<String>,

    #[serde(default)]
    pub profiles: Vec<Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            default_profile: None,
            profiles: Vec::new(),
        }
    }
}

impl Config {
    pub fn profile(&self, name: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    /// Insert a profile, replacing one of the same name in place
    ///
    /// Returns true when an existing profile was replaced.
    pub fn upsert_profile(&mut self, profile: Profile) -> bool {
        match self.profiles.iter_mut().find(|p| p.name == profile.name) {
            Some(existing) => {
                *existing = profile;
                true
            }
            None => {
                self.profiles.push(profile);
                false
            }
        }
    }

    /// Remove a profile, clearing the default if it pointed there
    pub fn remove_profile(&mut self, name: &str) -> Option<Profile> {
        let index = self.profiles.iter().position(|p| p.name == name)?;
        if self.default_profile.as_deref() == Some(name) {
            self.default_profile = None;
        }
        Some(self.profiles.remove(index))
    }

    pub fn set_default_profile(&mut self, name: &str) -> Result<()> {
        if self.profile(name).is_none() {
            return Err(Error::ProfileNotFound(name.to_string()));
        }
        self.default_profile = Some(name.to_string());
        Ok(())
    }

    /// Reject files this version cannot interpret
    fn check(&self) -> Result<()> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(Error::Config(format!(
                "Configuration file version {} is not supported (expected {SCHEMA_VERSION}); \
                 a newer stowage may have written it",
                self.schema_version
            )));
        }

        let mut seen = HashSet::new();
        if let Some(duplicate) = self.profiles.iter().find(|p| !seen.insert(p.name.as_str())) {
            return Err(Error::Config(format!(
                "Profile '{}' is defined more than once",
                duplicate.name
            )));
        }

        if let Some(default) = &self.default_profile
            && self.profile(default).is_none()
        {
            return Err(Error::Config(format!(
                "Default profile '{default}' is not defined"
            )));
        }
        Ok(())
    }
}

/// Loads and saves the configuration file
#[derive(Debug)]
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Manager for the default location
    pub fn new() -> Result<Self> {
        let config_dir = match std::env::var_os(CONFIG_DIR_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::config_dir()
                .ok_or_else(|| Error::Config("Could not determine config directory".into()))?
                .join("stowage"),
        };
        Ok(Self::with_path(config_dir.join(CONFIG_FILE)))
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Read the file; a missing file is an empty configuration
    pub fn load(&self) -> Result<Config> {
        let content = match std::fs::read_to_string(&self.config_path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Config::default()),
            Err(e) => return Err(e.into()),
        };

        let config: Config = toml::from_str(&content)?;
        config.check()?;
        Ok(config)
    }

    /// Write the file through a private temporary sibling, then rename it over
    pub fn save(&self, config: &Config) -> Result<()> {
        config.check()?;
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(config)?;
        let staging = self.config_path.with_extension("toml.tmp");
        write_private(&staging, content.as_bytes())?;
        if let Err(e) = std::fs::rename(&staging, &self.config_path) {
            let _ = std::fs::remove_file(&staging);
            return Err(e.into());
        }

        tracing::debug!(
            path = %self.config_path.display(),
            profiles = config.profiles.len(),
            "Saved configuration"
        );
        Ok(())
    }
}

#[cfg(unix)]
fn write_private(path: &Path, content: &[u8]) -> Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // mode() only applies when the file is created
    file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    file.write_all(content)?;
    file.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn write_private(path: &Path, content: &[u8]) -> Result<()> {
    std::fs::write(path, content)?;
    Ok(())
}
