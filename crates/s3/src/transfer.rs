//! Raw part transfer to presigned URLs

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::ETAG;

use stowage_core::{Error, PartTransport, Profile, Result, TransferResponse};

/// Sends part bodies with plain HTTP PUTs
///
/// The presigned URL carries the authorization, so no credentials are attached.
#[derive(Clone)]
pub struct HttpPartTransport {
    http_client: Client,
}

impl HttpPartTransport {
    pub fn new(profile: &Profile) -> Result<Self> {
        let timeouts = profile.timeout_config();
        let http_client = Client::builder()
            .danger_accept_invalid_certs(profile.insecure)
            .connect_timeout(timeouts.connect())
            .build()
            .map_err(|e| Error::Network(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { http_client })
    }

    pub fn with_client(http_client: Client) -> Self {
        Self { http_client }
    }
}

#[async_trait]
impl PartTransport for HttpPartTransport {
    async fn put(&self, url: &str, content: Vec<u8>) -> Result<TransferResponse> {
        let response = self
            .http_client
            .put(url)
            .body(content)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(format!("Part transfer timed out: {e}"))
                } else {
                    Error::Network(format!("Part transfer failed: {e}"))
                }
            })?;

        let status = response.status().as_u16();
        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .text()
            .await
            .map_err(|e| Error::Network(format!("Failed to read response: {e}")))?;

        Ok(TransferResponse { status, etag, body })
    }
}
