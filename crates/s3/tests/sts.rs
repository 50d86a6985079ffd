//! Token exchange against a local stub endpoint

mod common;

use std::time::{Duration, Instant};

use common::{StubResponse, StubServer};
use stowage_core::{Error, Profile, TimeoutConfig};
use tokio::net::TcpListener;
use stowage_s3::{SessionManager, StsClient};

const CREDENTIALS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<AssumeRoleWithWebIdentityResponse xmlns="https://sts.amazonaws.com/doc/2011-06-15/">
  <AssumeRoleWithWebIdentityResult>
    <Credentials>
      <AccessKeyId>TEMPACCESS</AccessKeyId>
      <SecretAccessKey>tempsecret</SecretAccessKey>
      <SessionToken>temptoken</SessionToken>
      <Expiration>2030-01-01T00:00:00Z</Expiration>
    </Credentials>
  </AssumeRoleWithWebIdentityResult>
</AssumeRoleWithWebIdentityResponse>"#;

#[tokio::test]
async fn test_exchange_sends_expected_query() {
    let server = StubServer::start(vec![StubResponse::new(200, CREDENTIALS_XML)]).await;
    let profile = Profile::new("stub", server.endpoint());

    let credentials = StsClient::new(&profile)
        .unwrap()
        .assume_role_with_web_identity("jwt-token", 3600)
        .await
        .unwrap();

    assert_eq!(credentials.access_key(), "TEMPACCESS");
    assert_eq!(credentials.session_token(), Some("temptoken"));

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.method, "POST");
    assert_eq!(request.path, "/");
    assert_eq!(
        request.query_param("Action").as_deref(),
        Some("AssumeRoleWithWebIdentity")
    );
    assert_eq!(request.query_param("WebIdentityToken").as_deref(), Some("jwt-token"));
    assert_eq!(request.query_param("Version").as_deref(), Some("2011-06-15"));
    assert_eq!(request.query_param("DurationSeconds").as_deref(), Some("3600"));
}

#[tokio::test]
async fn test_exchange_rejected_keeps_status_and_body() {
    let server = StubServer::start(vec![StubResponse::new(400, "bad token")]).await;
    let profile = Profile::new("stub", server.endpoint());

    let err = StsClient::new(&profile)
        .unwrap()
        .assume_role_with_web_identity("expired", 3600)
        .await
        .unwrap_err();

    match err {
        Error::TokenExchange { status, body } => {
            assert_eq!(status, 400);
            assert_eq!(body, "bad token");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_exchange_server_error() {
    let server = StubServer::start(vec![StubResponse::new(500, "internal")]).await;
    let profile = Profile::new("stub", server.endpoint());

    let err = StsClient::new(&profile)
        .unwrap()
        .assume_role_with_web_identity("t", 900)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::TokenExchange { status: 500, .. }));
    assert_eq!(err.exit_code(), 4);
}

#[tokio::test]
async fn test_session_from_token_uses_profile_duration() {
    let server = StubServer::start(vec![StubResponse::new(200, CREDENTIALS_XML)]).await;
    let mut profile = Profile::new("stub", server.endpoint());
    profile.sts_duration_secs = 7200;

    let session = SessionManager::connect(profile, None, Some("jwt".into()))
        .await
        .unwrap();

    assert_eq!(session.credentials().access_key(), "TEMPACCESS");
    assert!(!session.is_expired());
    assert_eq!(
        server.requests()[0].query_param("DurationSeconds").as_deref(),
        Some("7200")
    );
}

#[tokio::test]
async fn test_refresh_repeats_exchange() {
    let server = StubServer::start(vec![StubResponse::new(200, CREDENTIALS_XML)]).await;
    let profile = Profile::new("stub", server.endpoint());

    let session = SessionManager::from_token(profile, "jwt", 900).await.unwrap();
    let refreshed = session.refresh().await.unwrap();

    assert_eq!(server.requests().len(), 2);
    assert_eq!(refreshed.credentials().access_key(), "TEMPACCESS");
}

#[tokio::test]
async fn test_missing_credentials_makes_no_request() {
    let server = StubServer::start(vec![StubResponse::new(200, CREDENTIALS_XML)]).await;
    let profile = Profile::new("stub", server.endpoint());

    let result = SessionManager::connect(profile, None, None).await;

    assert!(matches!(result, Err(Error::Config(_))));
    assert!(server.requests().is_empty());
}

#[tokio::test]
async fn test_exchange_times_out_on_silent_endpoint() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let mut profile = Profile::new("silent", format!("http://{addr}"));
    profile.timeout = Some(TimeoutConfig {
        sts_ms: 300,
        ..TimeoutConfig::default()
    });

    let started = Instant::now();
    let err = StsClient::new(&profile)
        .unwrap()
        .assume_role_with_web_identity("jwt", 900)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Timeout(_)), "unexpected error: {err:?}");
    assert!(err.is_retryable());
    assert_eq!(err.exit_code(), 3);
    assert!(started.elapsed() < Duration::from_secs(10));
}
