use super::*;
use crate::config::HttpTimeouts;
use crate::state::session::SessionStore;
use serde_json::json;

/// Nothing listens here; tests below must not touch the network.
const UNREACHABLE: &str = "http://127.0.0.1:9";

fn fresh_session() -> Session {
    let expires_at = time::OffsetDateTime::now_utc().unix_timestamp() + 3_600;
    serde_json::from_value(json!({
        "access_token": "tok",
        "refresh_token": "ref",
        "expires_in": 3600,
        "expires_at": expires_at,
        "user": { "id": "8d0fd2b3-9ca7-4d9e-a95f-9e13dded323e", "email": "ana@x.com" },
    }))
    .unwrap()
}

fn config(session_file: Option<std::path::PathBuf>) -> SupabaseConfig {
    SupabaseConfig::from_values(Some(UNREACHABLE), Some("anon"), HttpTimeouts::default())
        .unwrap()
        .with_session_file(session_file)
}

#[tokio::test]
async fn persisted_session_is_resumed_by_startup_check() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    let session = fresh_session();
    SessionStorage::file(&path).save(Some(&session)).await.unwrap();

    let client = SupabaseClient::new(&config(Some(path))).unwrap();
    let store = Arc::new(SessionStore::new(Some(client.auth() as Arc<dyn AuthApi>)));

    let subscription = store.initialize_auth().await.unwrap();
    assert_eq!(store.current_user(), Some(session.user.clone()));
    assert_eq!(store.check_session().await, Some(session));
    subscription.unsubscribe();
}

#[tokio::test]
async fn without_session_file_nothing_is_resumed() {
    let client = SupabaseClient::new(&config(None)).unwrap();
    let store = SessionStore::new(Some(client.auth() as Arc<dyn AuthApi>));
    assert!(store.check_session().await.is_none());
}

#[tokio::test]
async fn corrupt_session_file_starts_signed_out() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    std::fs::write(&path, "garbage").unwrap();

    let client = SupabaseClient::new(&config(Some(path))).unwrap();
    assert!(client.auth().get_session().await.unwrap().is_none());
}
