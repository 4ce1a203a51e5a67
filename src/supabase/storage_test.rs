use super::*;
use serde_json::json;

fn session() -> Session {
    serde_json::from_value(json!({
        "access_token": "tok",
        "refresh_token": "ref",
        "expires_in": 3600,
        "expires_at": 1_900_000_000,
        "user": { "id": "8d0fd2b3-9ca7-4d9e-a95f-9e13dded323e", "email": "ana@x.com" },
    }))
    .unwrap()
}

#[tokio::test]
async fn memory_storage_keeps_nothing() {
    let storage = SessionStorage::memory();
    storage.save(Some(&session())).await.unwrap();
    assert!(storage.path().is_none());
    assert!(storage.load().is_none());
}

#[tokio::test]
async fn saved_session_loads_back() {
    let dir = tempfile::tempdir().unwrap();
    let storage = SessionStorage::file(dir.path().join("session.json"));
    storage.save(Some(&session())).await.unwrap();
    assert_eq!(storage.load(), Some(session()));
}

#[tokio::test]
async fn saving_none_removes_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    let storage = SessionStorage::file(&path);
    storage.save(Some(&session())).await.unwrap();
    assert!(path.exists());

    storage.save(None).await.unwrap();
    assert!(!path.exists());
    storage.save(None).await.unwrap();
}

#[test]
fn missing_file_is_no_session() {
    let dir = tempfile::tempdir().unwrap();
    assert!(SessionStorage::file(dir.path().join("absent.json")).load().is_none());
}

#[test]
fn corrupt_file_is_no_session() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    std::fs::write(&path, "{not json").unwrap();
    assert!(SessionStorage::file(path).load().is_none());
}

#[tokio::test]
async fn save_into_missing_directory_errors() {
    let dir = tempfile::tempdir().unwrap();
    let storage = SessionStorage::file(dir.path().join("nope").join("session.json"));
    assert!(matches!(storage.save(Some(&session())).await, Err(StorageError::Io(_))));
}

#[cfg(unix)]
#[tokio::test]
async fn session_file_is_owner_only() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    SessionStorage::file(&path).save(Some(&session())).await.unwrap();
    let mode = std::fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}
