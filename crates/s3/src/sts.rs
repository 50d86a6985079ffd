//! Token exchange against the store's STS-compatible endpoint
//!
//! A bearer identity token is traded for temporary credentials with
//! `AssumeRoleWithWebIdentity`. The call has a deadline: a hung exchange would
//! otherwise block every storage operation behind it.

use quick_xml::Reader;
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesRef, Event};
use reqwest::Client;

use stowage_core::{CredentialSet, Error, Profile, Result};

const STS_VERSION: &str = "2011-06-15";

/// Client for the token exchange
pub struct StsClient {
    http_client: Client,
    endpoint: String,
}

impl StsClient {
    /// Create a client for the profile's endpoint, bounded by its STS timeout
    pub fn new(profile: &Profile) -> Result<Self> {
        profile.validate()?;
        let timeouts = profile.timeout_config();
        let http_client = Client::builder()
            .danger_accept_invalid_certs(profile.insecure)
            .connect_timeout(timeouts.connect())
            .timeout(timeouts.sts())
            .build()
            .map_err(|e| Error::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            endpoint: profile.endpoint_url().to_string(),
        })
    }

    /// Exchange a web identity token for temporary credentials
    ///
    /// A non-2xx answer fails with `Error::TokenExchange` carrying the literal
    /// status and body.
    pub async fn assume_role_with_web_identity(
        &self,
        token: &str,
        duration_secs: u64,
    ) -> Result<CredentialSet> {
        let duration = duration_secs.to_string();
        let response = self
            .http_client
            .post(format!("{}/", self.endpoint))
            .query(&[
                ("Action", "AssumeRoleWithWebIdentity"),
                ("WebIdentityToken", token),
                ("Version", STS_VERSION),
                ("DurationSeconds", duration.as_str()),
            ])
            .send()
            .await
            .map_err(map_request_error)?;

        let status = response.status();
        let body = response.text().await.map_err(map_request_error)?;

        if !status.is_success() {
            tracing::error!(status = status.as_u16(), "Token exchange rejected");
            return Err(Error::TokenExchange {
                status: status.as_u16(),
                body,
            });
        }

        let credentials = parse_assume_role_response(&body)?;
        tracing::info!(
            access_key = credentials.access_key(),
            expiry = ?credentials.expiry(),
            "Exchanged token for temporary credentials"
        );
        Ok(credentials)
    }
}

fn map_request_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(format!("Token exchange did not finish in time: {e}"))
    } else {
        Error::Network(format!("Token exchange request failed: {e}"))
    }
}

/// Resolve `&amp;`-style and `&#38;`-style references between text chunks
fn resolve_reference(reference: &BytesRef<'_>) -> Result<String> {
    if let Some(ch) = reference
        .resolve_char_ref()
        .map_err(|e| Error::InvalidResponse(format!("Invalid STS response: {e}")))?
    {
        return Ok(ch.to_string());
    }
    let name = reference
        .decode()
        .map_err(|e| Error::InvalidResponse(format!("Invalid STS response: {e}")))?;
    resolve_predefined_entity(&name)
        .map(str::to_string)
        .ok_or_else(|| Error::InvalidResponse(format!("Unknown entity &{name}; in STS response")))
}

/// Extract the credentials from an `AssumeRoleWithWebIdentity` response body
///
/// Reads `AssumeRoleWithWebIdentityResponse/AssumeRoleWithWebIdentityResult/
/// Credentials/{AccessKeyId, SecretAccessKey, SessionToken, Expiration}`.
/// `Expiration` is optional.
pub fn parse_assume_role_response(body: &str) -> Result<CredentialSet> {
    const CREDENTIALS_PATH: [&str; 3] = [
        "AssumeRoleWithWebIdentityResponse",
        "AssumeRoleWithWebIdentityResult",
        "Credentials",
    ];

    let mut reader = Reader::from_reader(body.as_bytes());
    reader.config_mut().trim_text(true);

    let mut path: Vec<String> = Vec::new();
    let mut text = String::new();
    let mut access_key = None;
    let mut secret_key = None;
    let mut session_token = None;
    let mut expiration = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                path.push(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
                text.clear();
            }
            Ok(Event::Text(e)) => {
                let decoded = e
                    .decode()
                    .map_err(|e| Error::InvalidResponse(format!("Invalid STS response: {e}")))?;
                let unescaped = quick_xml::escape::unescape(&decoded)
                    .map_err(|e| Error::InvalidResponse(format!("Invalid STS response: {e}")))?;
                text.push_str(&unescaped);
            }
            Ok(Event::GeneralRef(e)) => text.push_str(&resolve_reference(&e)?),
            Ok(Event::End(_)) => {
                let in_credentials = path.len() == CREDENTIALS_PATH.len() + 1
                    && path.iter().zip(CREDENTIALS_PATH).all(|(a, b)| a == b);
                if in_credentials {
                    let value = std::mem::take(&mut text);
                    match path.last().map(String::as_str) {
                        Some("AccessKeyId") => access_key = Some(value),
                        Some("SecretAccessKey") => secret_key = Some(value),
                        Some("SessionToken") => session_token = Some(value),
                        Some("Expiration") => expiration = Some(value),
                        _ => {}
                    }
                }
                path.pop();
                text.clear();
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(Error::InvalidResponse(format!(
                    "Invalid STS response at position {}: {e}",
                    reader.error_position()
                )));
            }
        }
    }

    let missing = |field: &str| Error::InvalidResponse(format!("STS response has no {field}"));
    let access_key = access_key.ok_or_else(|| missing("AccessKeyId"))?;
    let secret_key = secret_key.ok_or_else(|| missing("SecretAccessKey"))?;
    let session_token = session_token.ok_or_else(|| missing("SessionToken"))?;
    let expiry = match expiration {
        Some(value) => Some(value.parse::<jiff::Timestamp>().map_err(|e| {
            Error::InvalidResponse(format!("Invalid Expiration '{value}': {e}"))
        })?),
        None => None,
    };

    Ok(CredentialSet::new_temporary(
        access_key,
        secret_key,
        session_token,
        expiry,
    ))
}
