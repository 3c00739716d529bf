use std::time::{Duration, SystemTime, UNIX_EPOCH};

use http::header::AUTHORIZATION;
use http::HeaderMap;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use portcullis_config::jwt_auth::{
    default_allowed_algorithms, default_lookup_locations, JwksProviderSourceConfig, JwtAuthConfig,
};
use serde_json::json;
use std::sync::Arc;

use crate::authentication::http_header::HttpHeaderAuthenticator;
use crate::authentication::{AuthenticationError, Authenticator};
use crate::background_tasks::BackgroundTasksManager;
use crate::jwt::errors::JwtError;
use crate::jwt::token_decoder::TokenDecoder;

const SECRET: &[u8] = b"portcullis-test-secret-0123456789abcdef";
// base64url (no padding) of SECRET, as it appears in the JWKS "k" field.
const SECRET_B64: &str = "cG9ydGN1bGxpcy10ZXN0LXNlY3JldC0wMTIzNDU2Nzg5YWJjZGVm";

fn hs256_jwks(kid: &str) -> String {
    json!({
        "keys": [
            { "kty": "oct", "kid": kid, "alg": "HS256", "k": SECRET_B64 }
        ]
    })
    .to_string()
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before unix epoch")
        .as_secs()
}

fn sign_token(kid: Option<&str>, claims: &serde_json::Value) -> String {
    let mut header = Header::new(Algorithm::HS256);
    header.kid = kid.map(str::to_string);
    encode(&header, claims, &EncodingKey::from_secret(SECRET)).expect("token should sign")
}

fn remote_config(server_url: &str) -> JwtAuthConfig {
    JwtAuthConfig {
        name: "jwt".to_string(),
        jwks_providers: vec![JwksProviderSourceConfig::Remote {
            url: format!("{server_url}/jwks.json"),
            polling_interval: Some(Duration::from_secs(600)),
            prefetch: Some(true),
        }],
        issuers: None,
        audiences: None,
        lookup_locations: default_lookup_locations(),
        allowed_algorithms: default_allowed_algorithms(),
    }
}

#[tokio::test]
async fn decodes_token_and_extracts_scopes_from_remote_jwks() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/jwks.json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(hs256_jwks("key-1"))
        .create_async()
        .await;

    let mut background_tasks = BackgroundTasksManager::new();
    let decoder = TokenDecoder::init(&mut background_tasks, &remote_config(&server.url()))
        .await
        .expect("prefetch should succeed");

    let token = sign_token(
        Some("key-1"),
        &json!({
            "sub": "alice",
            "exp": now_secs() + 3600,
            "scope": "read:employee read:private",
        }),
    );

    let payload = decoder.decode(&token).await.expect("token should decode");
    assert_eq!(payload.claims.sub.as_deref(), Some("alice"));
    assert_eq!(
        payload.claims.extract_scopes(),
        Some(vec![
            "read:employee".to_string(),
            "read:private".to_string()
        ])
    );

    background_tasks.shutdown().await;
}

#[tokio::test]
async fn token_without_kid_matches_a_key_by_algorithm() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/jwks.json")
        .with_status(200)
        .with_body(hs256_jwks("key-1"))
        .create_async()
        .await;

    let mut background_tasks = BackgroundTasksManager::new();
    let decoder = TokenDecoder::init(&mut background_tasks, &remote_config(&server.url()))
        .await
        .unwrap();

    let token = sign_token(None, &json!({ "sub": "alice", "exp": now_secs() + 3600 }));
    let payload = decoder.decode(&token).await.expect("token should decode");
    assert_eq!(payload.claims.sub.as_deref(), Some("alice"));
}

#[tokio::test]
async fn unknown_key_id_forces_a_jwks_refresh() {
    let mut server = mockito::Server::new_async().await;
    // The set available at startup knows no keys at all.
    server
        .mock("GET", "/jwks.json")
        .with_status(200)
        .with_body(json!({ "keys": [] }).to_string())
        .create_async()
        .await;

    let mut background_tasks = BackgroundTasksManager::new();
    let decoder = TokenDecoder::init(&mut background_tasks, &remote_config(&server.url()))
        .await
        .unwrap();

    // The key rotates in after startup. Mocks created later take priority,
    // so the forced refresh sees the new set.
    server
        .mock("GET", "/jwks.json")
        .with_status(200)
        .with_body(hs256_jwks("rotated-key"))
        .create_async()
        .await;

    let token = sign_token(
        Some("rotated-key"),
        &json!({ "sub": "alice", "exp": now_secs() + 3600 }),
    );
    let payload = decoder
        .decode(&token)
        .await
        .expect("refreshed set should contain the key");
    assert_eq!(payload.claims.sub.as_deref(), Some("alice"));
}

#[tokio::test]
async fn expired_token_is_rejected() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/jwks.json")
        .with_status(200)
        .with_body(hs256_jwks("key-1"))
        .create_async()
        .await;

    let mut background_tasks = BackgroundTasksManager::new();
    let decoder = TokenDecoder::init(&mut background_tasks, &remote_config(&server.url()))
        .await
        .unwrap();

    let token = sign_token(
        Some("key-1"),
        &json!({ "sub": "alice", "exp": now_secs() - 600 }),
    );
    let err = decoder.decode(&token).await.unwrap_err();
    assert!(matches!(err, JwtError::AllKeysFailedToDecode(_)));
}

#[tokio::test]
async fn issuer_values_are_checked_after_decoding() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/jwks.json")
        .with_status(200)
        .with_body(hs256_jwks("key-1"))
        .create_async()
        .await;

    let mut config = remote_config(&server.url());
    config.issuers = Some(vec!["https://idp.example.com".to_string()]);

    let mut background_tasks = BackgroundTasksManager::new();
    let decoder = TokenDecoder::init(&mut background_tasks, &config).await.unwrap();

    let good = sign_token(
        Some("key-1"),
        &json!({
            "sub": "alice",
            "iss": "https://idp.example.com",
            "exp": now_secs() + 3600,
        }),
    );
    assert!(decoder.decode(&good).await.is_ok());

    let bad = sign_token(
        Some("key-1"),
        &json!({
            "sub": "alice",
            "iss": "https://rogue.example.com",
            "exp": now_secs() + 3600,
        }),
    );
    assert!(decoder.decode(&bad).await.is_err());
}

#[tokio::test]
async fn disallowed_algorithm_is_rejected() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/jwks.json")
        .with_status(200)
        .with_body(hs256_jwks("key-1"))
        .create_async()
        .await;

    let mut config = remote_config(&server.url());
    config.allowed_algorithms = Some(vec![Algorithm::RS256]);

    let mut background_tasks = BackgroundTasksManager::new();
    let decoder = TokenDecoder::init(&mut background_tasks, &config).await.unwrap();

    let token = sign_token(
        Some("key-1"),
        &json!({ "sub": "alice", "exp": now_secs() + 3600 }),
    );
    let err = decoder.decode(&token).await.unwrap_err();
    assert!(matches!(err, JwtError::AllKeysFailedToDecode(_)));
}

#[tokio::test]
async fn file_source_is_loaded_on_startup() {
    let path = std::env::temp_dir().join(format!("portcullis-jwks-{}.json", std::process::id()));
    std::fs::write(&path, hs256_jwks("file-key")).unwrap();

    let config = JwtAuthConfig {
        name: "jwt".to_string(),
        jwks_providers: vec![JwksProviderSourceConfig::File { path: path.clone() }],
        issuers: None,
        audiences: None,
        lookup_locations: default_lookup_locations(),
        allowed_algorithms: default_allowed_algorithms(),
    };

    let mut background_tasks = BackgroundTasksManager::new();
    let decoder = TokenDecoder::init(&mut background_tasks, &config).await.unwrap();

    let token = sign_token(
        Some("file-key"),
        &json!({ "sub": "alice", "exp": now_secs() + 3600 }),
    );
    assert!(decoder.decode(&token).await.is_ok());

    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn authenticator_maps_lookup_and_decode_outcomes() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/jwks.json")
        .with_status(200)
        .with_body(hs256_jwks("key-1"))
        .create_async()
        .await;

    let config = remote_config(&server.url());
    let mut background_tasks = BackgroundTasksManager::new();
    let decoder = Arc::new(
        TokenDecoder::init(&mut background_tasks, &config)
            .await
            .unwrap(),
    );
    let authenticator = HttpHeaderAuthenticator::from_config(decoder, &config);

    // No Authorization header at all: this strategy declines.
    assert!(authenticator
        .authenticate(&HeaderMap::new())
        .await
        .unwrap()
        .is_none());

    // A different auth scheme is not ours to judge.
    let mut basic = HeaderMap::new();
    basic.insert(AUTHORIZATION, "Basic dXNlcjpwdw==".parse().unwrap());
    assert!(authenticator.authenticate(&basic).await.unwrap().is_none());

    // A bearer token that is present but not a JWT is a hard failure.
    let mut garbage = HeaderMap::new();
    garbage.insert(AUTHORIZATION, "Bearer not-a-jwt".parse().unwrap());
    let err = authenticator.authenticate(&garbage).await.unwrap_err();
    assert!(matches!(err, AuthenticationError::InvalidCredential(_)));

    // A valid token yields an identity carrying the token's scopes.
    let token = sign_token(
        Some("key-1"),
        &json!({
            "sub": "alice",
            "exp": now_secs() + 3600,
            "scope": "read:employee",
        }),
    );
    let mut good = HeaderMap::new();
    good.insert(AUTHORIZATION, format!("Bearer {token}").parse().unwrap());

    let identity = authenticator
        .authenticate(&good)
        .await
        .unwrap()
        .expect("identity should be established");
    assert_eq!(identity.provider(), "jwt");
    assert!(identity.scopes().contains("read:employee"));
    assert_eq!(
        identity.claim("sub"),
        Some(&serde_json::Value::String("alice".to_string()))
    );
}
