//! AWS Signature Version 4 request signing
//!
//! The administrative endpoints sit outside the S3 API surface the SDK knows
//! about, so their requests are signed here with `aws-sigv4`. Signing is a pure
//! function of the request description, the credentials and the clock reading.
//! Paths and query strings are encoded once, the way S3 expects.

use std::time::SystemTime;

use aws_credential_types::Credentials;
use aws_sigv4::http_request::{
    PayloadChecksumKind, PercentEncodingMode, SignableBody, SignableRequest, SignatureLocation,
    SigningSettings, UriPathNormalizationMode, sign,
};
use aws_sigv4::sign::v4;
use jiff::Timestamp;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use sha2::{Digest, Sha256};

use stowage_core::{CredentialSet, Error, Result};

/// SHA-256 of the empty payload
pub const EMPTY_PAYLOAD_HASH: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// Everything except the RFC 3986 unreserved characters is encoded
const URI_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Description of a request to sign
#[derive(Debug, Clone)]
pub struct SigningRequest {
    pub method: String,
    /// Host header value, including a non-default port
    pub host: String,
    /// Unencoded absolute path
    pub path: String,
    /// Unencoded query parameters
    pub query: Vec<(String, String)>,
    /// Extra headers to sign and send
    pub headers: Vec<(String, String)>,
    pub region: String,
    pub service: String,
    /// Hex SHA-256 of the exact payload that will be sent
    pub payload_hash: String,
}

impl SigningRequest {
    pub fn new(method: impl Into<String>, host: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            host: host.into(),
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            region: "us-east-1".to_string(),
            service: "s3".to_string(),
            payload_hash: EMPTY_PAYLOAD_HASH.to_string(),
        }
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Hash `payload` and sign over it
    pub fn payload(mut self, payload: &[u8]) -> Self {
        self.payload_hash = hash_payload(payload);
        self
    }
}

/// Headers to attach and the query string to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    /// Lowercase header names added by signing, including `authorization`
    pub headers: Vec<(String, String)>,
    /// Query string exactly as signed; must be sent verbatim
    pub canonical_query: String,
    pub signature: String,
}

impl SignedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Sign a request with SigV4, authorization in headers
pub fn sign_request(
    request: &SigningRequest,
    credentials: &CredentialSet,
    now: Timestamp,
) -> Result<SignedRequest> {
    let credentials = Credentials::new(
        credentials.access_key(),
        credentials.secret_key(),
        credentials.session_token().map(str::to_string),
        None,
        "stowage-session",
    );
    let identity = credentials.into();

    let mut signing_settings = SigningSettings::default();
    signing_settings.signature_location = SignatureLocation::Headers;
    signing_settings.payload_checksum_kind = PayloadChecksumKind::XAmzSha256;
    signing_settings.percent_encoding_mode = PercentEncodingMode::Single;
    signing_settings.uri_path_normalization_mode = UriPathNormalizationMode::Disabled;

    let signing_params = v4::SigningParams::builder()
        .identity(&identity)
        .region(&request.region)
        .name(&request.service)
        .time(SystemTime::from(now))
        .settings(signing_settings)
        .build()
        .map_err(|e| Error::Auth(format!("Failed to build signing params: {e}")))?;

    let canonical_query = canonical_query_string(&request.query);
    let mut uri = format!("http://{}{}", request.host, canonical_uri(&request.path));
    if !canonical_query.is_empty() {
        uri.push('?');
        uri.push_str(&canonical_query);
    }

    let mut header_pairs: Vec<(&str, &str)> = vec![("host", request.host.as_str())];
    header_pairs.extend(
        request
            .headers
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str())),
    );

    let signable_request = SignableRequest::new(
        &request.method,
        uri,
        header_pairs.into_iter(),
        SignableBody::Precomputed(request.payload_hash.clone()),
    )
    .map_err(|e| Error::Auth(format!("Failed to create signable request: {e}")))?;

    let (instructions, signature) = sign(signable_request, &signing_params.into())
        .map_err(|e| Error::Auth(format!("Failed to sign request: {e}")))?
        .into_parts();

    tracing::debug!(
        method = %request.method,
        path = %request.path,
        "Signed admin request"
    );

    let mut headers: Vec<(String, String)> = request
        .headers
        .iter()
        .map(|(name, value)| (name.to_lowercase(), value.clone()))
        .collect();
    headers.extend(
        instructions
            .headers()
            .map(|(name, value)| (name.to_lowercase(), value.to_string())),
    );

    Ok(SignedRequest {
        headers,
        canonical_query,
        signature,
    })
}

/// Hex SHA-256 digest of a payload
pub fn hash_payload(payload: &[u8]) -> String {
    hex::encode(Sha256::digest(payload))
}

/// Percent-encode each path segment, keeping the slashes
fn canonical_uri(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    path.split('/')
        .map(|segment| utf8_percent_encode(segment, URI_ENCODE_SET).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

/// Encode, then sort by key and value
fn canonical_query_string(query: &[(String, String)]) -> String {
    let mut pairs: Vec<(String, String)> = query
        .iter()
        .map(|(k, v)| {
            (
                utf8_percent_encode(k, URI_ENCODE_SET).to_string(),
                utf8_percent_encode(v, URI_ENCODE_SET).to_string(),
            )
        })
        .collect();
    pairs.sort();
    pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}
