//! Storage session manager
//!
//! Owns one immutable credential set and hands out clients built from it.
//! Clients only exist once credentials have been acquired.

use std::sync::Arc;

use stowage_core::{CredentialSet, CredentialSource, MultipartCoordinator, Profile, Result};

use crate::admin::PolicyClient;
use crate::client::S3Client;
use crate::sts::StsClient;
use crate::transfer::HttpPartTransport;

/// Credentials for one profile, plus the clients derived from them
#[derive(Clone)]
pub struct SessionManager {
    profile: Profile,
    source: CredentialSource,
    credentials: Arc<CredentialSet>,
}

impl SessionManager {
    /// Start a session with static keys
    ///
    /// Performs no network call; bad keys surface on first use.
    pub fn from_static_keys(
        profile: Profile,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        let access_key = access_key.into();
        let secret_key = secret_key.into();
        let credentials = Arc::new(CredentialSet::new_static(&access_key, &secret_key));
        Self {
            profile,
            source: CredentialSource::StaticKeys {
                access_key,
                secret_key,
            },
            credentials,
        }
    }

    /// Start a session by exchanging a bearer token for temporary credentials
    pub async fn from_token(
        profile: Profile,
        token: impl Into<String>,
        duration_secs: u64,
    ) -> Result<Self> {
        let token = token.into();
        let credentials = StsClient::new(&profile)?
            .assume_role_with_web_identity(&token, duration_secs)
            .await?;
        Ok(Self {
            profile,
            source: CredentialSource::WebIdentity {
                token,
                duration_secs,
            },
            credentials: Arc::new(credentials),
        })
    }

    /// Start a session from whichever credential input the caller has
    ///
    /// Exactly one of `static_keys` and `token` must be given; anything else is
    /// a configuration error raised before any network call.
    pub async fn connect(
        profile: Profile,
        static_keys: Option<(String, String)>,
        token: Option<String>,
    ) -> Result<Self> {
        let source = CredentialSource::resolve(static_keys, token, profile.sts_duration_secs)?;
        Self::from_source(profile, source).await
    }

    async fn from_source(profile: Profile, source: CredentialSource) -> Result<Self> {
        match source {
            CredentialSource::StaticKeys {
                access_key,
                secret_key,
            } => Ok(Self::from_static_keys(profile, access_key, secret_key)),
            CredentialSource::WebIdentity {
                token,
                duration_secs,
            } => Self::from_token(profile, token, duration_secs).await,
        }
    }

    /// A new session with freshly acquired credentials
    ///
    /// Token sessions repeat the exchange; static sessions are copied. This
    /// session is left untouched.
    pub async fn refresh(&self) -> Result<Self> {
        Self::from_source(self.profile.clone(), self.source.clone()).await
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Shared read-only handle on the credential set
    pub fn credentials(&self) -> Arc<CredentialSet> {
        Arc::clone(&self.credentials)
    }

    /// Whether the temporary credentials have run out
    pub fn is_expired(&self) -> bool {
        self.credentials.is_expired(jiff::Timestamp::now())
    }

    /// Data-plane client
    pub async fn client(&self) -> Result<S3Client> {
        S3Client::new(&self.profile, &self.credentials).await
    }

    /// Admin client for canned policies
    pub fn policy_client(&self) -> Result<PolicyClient> {
        PolicyClient::new(&self.profile, self.credentials())
    }

    /// Multipart coordinator over the data-plane client
    pub async fn coordinator(&self) -> Result<MultipartCoordinator<S3Client, HttpPartTransport>> {
        let client = self.client().await?;
        let transport = HttpPartTransport::new(&self.profile)?;
        Ok(MultipartCoordinator::new(client, transport)
            .with_presign_expiry(self.profile.presign_expiry()))
    }
}
