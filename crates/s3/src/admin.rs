//! Canned policy client
//!
//! Reaches the store's administrative policy endpoints, which the SDK does not
//! expose. Requests are signed with [`crate::signer::sign_request`] using the
//! same credentials as the data-plane client.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};

use stowage_core::{CredentialSet, Error, Policy, PolicyApi, Profile, Result};

use crate::signer::{SigningRequest, sign_request};

const ADD_POLICY_PATH: &str = "/minio/admin/v3/add-canned-policy";
const INFO_POLICY_PATH: &str = "/minio/admin/v3/info-canned-policy";

/// Admin client for canned policies
pub struct PolicyClient {
    http_client: Client,
    endpoint: url::Url,
    region: String,
    credentials: Arc<CredentialSet>,
}

struct AdminResponse {
    status: StatusCode,
    body: String,
}

impl PolicyClient {
    /// Create a client for the profile's endpoint
    pub fn new(profile: &Profile, credentials: Arc<CredentialSet>) -> Result<Self> {
        let endpoint = profile.validate()?;
        let timeouts = profile.timeout_config();
        let http_client = Client::builder()
            .danger_accept_invalid_certs(profile.insecure)
            .connect_timeout(timeouts.connect())
            .timeout(timeouts.read())
            .build()
            .map_err(|e| Error::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            endpoint,
            region: profile.region.clone(),
            credentials,
        })
    }

    /// Host header value: host plus any non-default port
    fn host(&self) -> String {
        let host = self.endpoint.host_str().unwrap_or_default();
        match self.endpoint.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        }
    }

    /// Base URL without a trailing slash
    fn base_url(&self) -> String {
        let mut base = format!("{}://{}", self.endpoint.scheme(), self.host());
        base.push_str(self.endpoint.path().trim_end_matches('/'));
        base
    }

    fn full_path(&self, path: &str) -> String {
        format!("{}{}", self.endpoint.path().trim_end_matches('/'), path)
    }

    /// Sign and send one admin request
    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Vec<u8>,
        region: &str,
    ) -> Result<AdminResponse> {
        let mut request = SigningRequest::new(method.as_str(), self.host(), self.full_path(path))
            .region(region)
            .payload(&body);
        for (key, value) in query {
            request = request.query(*key, *value);
        }

        let signed = sign_request(&request, &self.credentials, jiff::Timestamp::now())?;

        let mut url = format!("{}{}", self.base_url(), path);
        if !signed.canonical_query.is_empty() {
            url.push('?');
            url.push_str(&signed.canonical_query);
        }

        let mut builder = self.http_client.request(method, &url);
        for (name, value) in &signed.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !body.is_empty() {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout(format!("Admin request timed out: {e}"))
            } else {
                Error::Network(format!("Request failed: {e}"))
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Network(format!("Failed to read response: {e}")))?;

        Ok(AdminResponse { status, body })
    }

    /// Create or replace a canned policy, signing for `region`
    pub async fn create_policy_in_region(
        &self,
        name: &str,
        document: &str,
        region: &str,
    ) -> Result<()> {
        let response = self
            .send(
                Method::PUT,
                ADD_POLICY_PATH,
                &[("name", name)],
                document.as_bytes().to_vec(),
                region,
            )
            .await?;

        if response.status != StatusCode::OK {
            tracing::error!(
                policy = name,
                status = response.status.as_u16(),
                "Failed to create policy"
            );
            return Err(Error::PolicyOperation(format!(
                "failed to create policy: {}",
                response.body
            )));
        }

        tracing::info!(policy = name, "Created canned policy");
        Ok(())
    }

    /// Fetch a canned policy, signing for `region`
    pub async fn get_policy_in_region(&self, name: &str, region: &str) -> Result<Policy> {
        let response = self
            .send(
                Method::GET,
                INFO_POLICY_PATH,
                &[("name", name), ("v", "2")],
                Vec::new(),
                region,
            )
            .await?;

        match response.status {
            StatusCode::OK => {
                let body: serde_json::Value = serde_json::from_str(&response.body)?;
                Ok(Policy::from_response(name, body))
            }
            StatusCode::NOT_FOUND => {
                tracing::warn!(policy = name, "Policy does not exist");
                Err(Error::PolicyNotFound(name.to_string()))
            }
            status => {
                tracing::error!(policy = name, status = status.as_u16(), "Failed to get policy");
                Err(Error::PolicyOperation(format!(
                    "failed to get policy: {}",
                    response.body
                )))
            }
        }
    }

    /// Whether a canned policy exists, signing for `region`
    pub async fn policy_exists_in_region(&self, name: &str, region: &str) -> Result<bool> {
        match self.get_policy_in_region(name, region).await {
            Ok(_) => Ok(true),
            Err(Error::PolicyNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl PolicyApi for PolicyClient {
    async fn create_policy(&self, name: &str, document: &str) -> Result<()> {
        self.create_policy_in_region(name, document, &self.region)
            .await
    }

    async fn get_policy(&self, name: &str) -> Result<Policy> {
        self.get_policy_in_region(name, &self.region).await
    }

    async fn policy_exists(&self, name: &str) -> Result<bool> {
        self.policy_exists_in_region(name, &self.region).await
    }
}
