use super::*;

use std::sync::Arc;

use tokio::sync::RwLock;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const USER: &str = r#"{"id": "8d0fd2b3-9ca7-4d9e-a95f-9e13dded323e", "aud": "authenticated", "email": "ana@example.com"}"#;

fn session_body(expires_at: Option<i64>) -> String {
    let expires = expires_at.map(|at| format!(r#""expires_at": {at},"#)).unwrap_or_default();
    format!(
        r#"{{"access_token": "tok", "token_type": "bearer", "expires_in": 3600, {expires} "refresh_token": "ref", "user": {USER}}}"#
    )
}

// =============================================================================
// parse_session
// =============================================================================

#[test]
fn parse_session_reads_tokens_and_user() {
    let session = parse_session(&session_body(Some(5_000)), 0).unwrap();
    assert_eq!(session.access_token, "tok");
    assert_eq!(session.refresh_token, "ref");
    assert_eq!(session.expires_at, Some(5_000));
    assert_eq!(session.user.email.as_deref(), Some("ana@example.com"));
}

#[test]
fn parse_session_computes_expiry_when_absent() {
    let session = parse_session(&session_body(None), 100).unwrap();
    assert_eq!(session.expires_at, Some(3_700));
}

#[test]
fn parse_session_rejects_garbage() {
    let err = parse_session("not json", 0).unwrap_err();
    assert!(matches!(err, AuthError::Parse(_)));
}

// =============================================================================
// parse_sign_up
// =============================================================================

#[test]
fn parse_sign_up_with_session_is_signed_in() {
    let data = parse_sign_up(&session_body(Some(5_000)), 0).unwrap();
    assert!(data.session.is_some());
    assert_eq!(data.user.unwrap().email.as_deref(), Some("ana@example.com"));
}

#[test]
fn parse_sign_up_bare_user_is_pending_confirmation() {
    let data = parse_sign_up(USER, 0).unwrap();
    assert!(data.session.is_none());
    assert!(data.user.is_some());
}

// =============================================================================
// parse_error
// =============================================================================

#[test]
fn parse_error_new_shape() {
    let err = parse_error(400, r#"{"code": 400, "error_code": "invalid_credentials", "msg": "Invalid login credentials"}"#);
    assert_eq!(
        err,
        AuthError::Api {
            status: 400,
            code: Some("invalid_credentials".into()),
            message: "Invalid login credentials".into()
        }
    );
}

#[test]
fn parse_error_legacy_shape() {
    let err = parse_error(400, r#"{"error": "invalid_grant", "error_description": "Invalid login credentials"}"#);
    assert_eq!(
        err,
        AuthError::Api { status: 400, code: Some("invalid_grant".into()), message: "Invalid login credentials".into() }
    );
}

#[test]
fn parse_error_non_json_body_keeps_text() {
    let AuthError::Api { status, code, message } = parse_error(502, "Bad Gateway") else {
        panic!("expected Api error");
    };
    assert_eq!(status, 502);
    assert!(code.is_none());
    assert!(message.contains("Bad Gateway"));
}

// =============================================================================
// client construction
// =============================================================================

#[tokio::test]
async fn get_session_without_stored_session_is_none() {
    let slot: SessionSlot = std::sync::Arc::new(tokio::sync::RwLock::new(None));
    let client = GoTrueClient::new(reqwest::Client::new(), "http://localhost:54321", "anon", slot);
    assert!(client.get_session().await.unwrap().is_none());
    assert!(client.get_user().await.unwrap().is_none());
}

#[tokio::test]
async fn get_session_returns_fresh_stored_session_without_network() {
    let session = parse_session(&session_body(Some(unix_now() + 3_600)), 0).unwrap();
    let slot: SessionSlot = std::sync::Arc::new(tokio::sync::RwLock::new(Some(session.clone())));
    let client = GoTrueClient::new(reqwest::Client::new(), "http://localhost:54321", "anon", slot);
    assert_eq!(client.get_session().await.unwrap(), Some(session));
}

#[tokio::test]
async fn sign_out_without_session_is_noop() {
    let slot: SessionSlot = std::sync::Arc::new(tokio::sync::RwLock::new(None));
    let client = GoTrueClient::new(reqwest::Client::new(), "http://localhost:54321", "anon", slot);
    let mut events = client.on_auth_state_change();
    client.sign_out().await.unwrap();
    assert!(events.try_recv().is_err());
}

// =============================================================================
// against a mock GoTrue server
// =============================================================================

fn token_json(access_token: &str, refresh_token: &str, expires_at: i64) -> serde_json::Value {
    serde_json::json!({
        "access_token": access_token,
        "token_type": "bearer",
        "expires_in": 3600,
        "expires_at": expires_at,
        "refresh_token": refresh_token,
        "user": serde_json::from_str::<serde_json::Value>(USER).unwrap(),
    })
}

fn stored(access_token: &str, refresh_token: &str, expires_at: i64) -> Session {
    serde_json::from_value(token_json(access_token, refresh_token, expires_at)).unwrap()
}

fn client_for(server: &MockServer, session: Option<Session>) -> (GoTrueClient, SessionSlot) {
    let slot: SessionSlot = Arc::new(RwLock::new(session));
    let client = GoTrueClient::new(reqwest::Client::new(), &server.uri(), "anon", Arc::clone(&slot));
    (client, slot)
}

#[tokio::test]
async fn password_sign_in_stores_and_persists_session() {
    let server = MockServer::start().await;
    let expires_at = unix_now() + 3_600;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "password"))
        .and(header("apikey", "anon"))
        .and(body_json(serde_json::json!({ "email": "ana@example.com", "password": "segredo123" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_json("tok", "ref", expires_at)))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("session.json");
    let (client, slot) = client_for(&server, None);
    let client = client.with_storage(SessionStorage::file(&file));
    let mut events = client.on_auth_state_change();

    let session = client.sign_in_with_password("ana@example.com", "segredo123").await.unwrap();
    assert_eq!(session.access_token, "tok");
    assert_eq!(slot.read().await.as_ref(), Some(&session));
    assert_eq!(SessionStorage::file(&file).load(), Some(session.clone()));

    let event = events.try_recv().unwrap();
    assert_eq!(event.event, AuthChangeEvent::SignedIn);
    assert_eq!(event.session, Some(session));
}

#[tokio::test]
async fn rejected_credentials_leave_slot_empty() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "password"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "code": 400, "error_code": "invalid_credentials", "msg": "Invalid login credentials"
        })))
        .mount(&server)
        .await;

    let (client, slot) = client_for(&server, None);
    let mut events = client.on_auth_state_change();
    let err = client.sign_in_with_password("ana@example.com", "errada").await.unwrap_err();
    assert!(matches!(err, AuthError::Api { status: 400, .. }));
    assert!(slot.read().await.is_none());
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn sign_up_pending_confirmation_stores_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/signup"))
        .and(header("apikey", "anon"))
        .respond_with(ResponseTemplate::new(200).set_body_string(USER))
        .mount(&server)
        .await;

    let (client, slot) = client_for(&server, None);
    let mut events = client.on_auth_state_change();
    let data = client
        .sign_up("ana@example.com", "segredo123", serde_json::json!({ "display_name": "Ana" }))
        .await
        .unwrap();
    assert!(data.session.is_none());
    assert!(data.user.is_some());
    assert!(slot.read().await.is_none());
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn expired_session_is_refreshed() {
    let server = MockServer::start().await;
    let fresh_until = unix_now() + 3_600;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "refresh_token"))
        .and(body_json(serde_json::json!({ "refresh_token": "ref-old" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_json("tok-new", "ref-new", fresh_until)))
        .expect(1)
        .mount(&server)
        .await;

    let (client, slot) = client_for(&server, Some(stored("tok-old", "ref-old", unix_now() - 10)));
    let mut events = client.on_auth_state_change();

    let session = client.get_session().await.unwrap().unwrap();
    assert_eq!(session.access_token, "tok-new");
    assert_eq!(session.refresh_token, "ref-new");
    assert_eq!(slot.read().await.as_ref().map(|s| s.access_token.as_str()), Some("tok-new"));

    let event = events.try_recv().unwrap();
    assert_eq!(event.event, AuthChangeEvent::TokenRefreshed);
    assert_eq!(event.session, Some(session));
}

#[tokio::test]
async fn session_inside_expiry_margin_is_refreshed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "refresh_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_json("tok-new", "ref-new", unix_now() + 3_600)))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _slot) = client_for(&server, Some(stored("tok-old", "ref-old", unix_now() + 5)));
    let session = client.get_session().await.unwrap().unwrap();
    assert_eq!(session.access_token, "tok-new");
}

#[tokio::test]
async fn rejected_refresh_clears_session_and_signs_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "refresh_token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant", "error_description": "Invalid Refresh Token: Already Used"
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("session.json");
    let expired = stored("tok-old", "ref-old", unix_now() - 10);
    SessionStorage::file(&file).save(Some(&expired)).await.unwrap();

    let (client, slot) = client_for(&server, Some(expired));
    let client = client.with_storage(SessionStorage::file(&file));
    let mut events = client.on_auth_state_change();

    let err = client.get_session().await.unwrap_err();
    assert_eq!(
        err,
        AuthError::Api {
            status: 400,
            code: Some("invalid_grant".into()),
            message: "Invalid Refresh Token: Already Used".into()
        }
    );
    assert!(slot.read().await.is_none());
    assert!(!file.exists());

    let event = events.try_recv().unwrap();
    assert_eq!(event.event, AuthChangeEvent::SignedOut);
    assert!(event.session.is_none());
}

#[tokio::test]
async fn sign_out_treats_revoked_token_as_success() {
    for status in [204, 401, 404] {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/logout"))
            .and(header("apikey", "anon"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(status))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("session.json");
        let session = stored("tok", "ref", unix_now() + 3_600);
        SessionStorage::file(&file).save(Some(&session)).await.unwrap();

        let (client, slot) = client_for(&server, Some(session));
        let client = client.with_storage(SessionStorage::file(&file));
        let mut events = client.on_auth_state_change();

        client.sign_out().await.unwrap_or_else(|e| panic!("status {status}: {e}"));
        assert!(slot.read().await.is_none(), "status {status}");
        assert!(!file.exists(), "status {status}");
        assert_eq!(events.try_recv().unwrap().event, AuthChangeEvent::SignedOut);
    }
}

#[tokio::test]
async fn sign_out_server_error_still_clears_local_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/logout"))
        .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({ "msg": "boom" })))
        .mount(&server)
        .await;

    let (client, slot) = client_for(&server, Some(stored("tok", "ref", unix_now() + 3_600)));
    let err = client.sign_out().await.unwrap_err();
    assert!(matches!(err, AuthError::Api { status: 500, .. }));
    assert!(slot.read().await.is_none());
}

#[tokio::test]
async fn get_user_returns_user_for_valid_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_string(USER))
        .mount(&server)
        .await;

    let (client, _slot) = client_for(&server, Some(stored("tok", "ref", unix_now() + 3_600)));
    let user = client.get_user().await.unwrap().unwrap();
    assert_eq!(user.email.as_deref(), Some("ana@example.com"));
}

#[tokio::test]
async fn get_user_with_invalid_token_is_none() {
    for status in [401, 403] {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .respond_with(ResponseTemplate::new(status).set_body_json(serde_json::json!({ "msg": "invalid JWT" })))
            .mount(&server)
            .await;

        let (client, _slot) = client_for(&server, Some(stored("tok", "ref", unix_now() + 3_600)));
        assert!(client.get_user().await.unwrap().is_none(), "status {status}");
    }
}
