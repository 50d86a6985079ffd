//! Credential sets and their sources
//!
//! A [`CredentialSet`] is issued once and never mutated. Refreshing temporary
//! credentials produces a new set; holders of the old one keep a consistent view.

use std::fmt;

use jiff::Timestamp;

use crate::error::{Error, Result};

/// Default lifetime requested for temporary credentials, in seconds
pub const DEFAULT_STS_DURATION_SECS: u64 = 86_000;

/// Access key, secret key and optional session token for one session
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialSet {
    access_key: String,
    secret_key: String,
    session_token: Option<String>,
    expiry: Option<Timestamp>,
}

impl CredentialSet {
    /// Long-lived credentials with no session token and no expiry
    pub fn new_static(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            session_token: None,
            expiry: None,
        }
    }

    /// Temporary credentials as returned by a token exchange
    pub fn new_temporary(
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        session_token: impl Into<String>,
        expiry: Option<Timestamp>,
    ) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            session_token: Some(session_token.into()),
            expiry,
        }
    }

    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    pub fn secret_key(&self) -> &str {
        &self.secret_key
    }

    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref()
    }

    pub fn expiry(&self) -> Option<Timestamp> {
        self.expiry
    }

    /// Whether the set has passed its expiry at `now`
    ///
    /// Static credentials never expire.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expiry.is_some_and(|expiry| expiry <= now)
    }
}

impl fmt::Debug for CredentialSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialSet")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<redacted>"),
            )
            .field("expiry", &self.expiry)
            .finish()
    }
}

/// Where a session obtains its credentials from
#[derive(Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Static access key and secret key, validated on first use
    StaticKeys {
        access_key: String,
        secret_key: String,
    },
    /// Bearer token exchanged for temporary credentials
    WebIdentity { token: String, duration_secs: u64 },
}

impl CredentialSource {
    /// Pick the credential source from the caller's inputs
    ///
    /// Exactly one of `static_keys` and `token` must be given. Nothing here
    /// touches the network, so a misconfigured caller fails immediately.
    pub fn resolve(
        static_keys: Option<(String, String)>,
        token: Option<String>,
        duration_secs: u64,
    ) -> Result<Self> {
        match (static_keys, token) {
            (Some(_), Some(_)) => Err(Error::Config(
                "Supply either static keys or a token, not both".into(),
            )),
            (None, None) => Err(Error::Config(
                "Either static keys or a token must be supplied".into(),
            )),
            (Some((access_key, secret_key)), None) => {
                if access_key.is_empty() || secret_key.is_empty() {
                    return Err(Error::Config(
                        "Access key and secret key must not be empty".into(),
                    ));
                }
                Ok(Self::StaticKeys {
                    access_key,
                    secret_key,
                })
            }
            (None, Some(token)) => {
                if token.is_empty() {
                    return Err(Error::Config("Token must not be empty".into()));
                }
                Ok(Self::WebIdentity {
                    token,
                    duration_secs,
                })
            }
        }
    }
}

impl fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StaticKeys { access_key, .. } => f
                .debug_struct("StaticKeys")
                .field("access_key", access_key)
                .finish_non_exhaustive(),
            Self::WebIdentity { duration_secs, .. } => f
                .debug_struct("WebIdentity")
                .field("duration_secs", duration_secs)
                .finish_non_exhaustive(),
        }
    }
}
