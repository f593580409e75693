use super::*;

#[tokio::test]
async fn stores_and_reads_values() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage
        .set("gesture-flash:progress:animals", r#"{"index":1}"#)
        .await
        .expect("set");
    let value = storage
        .get("gesture-flash:progress:animals")
        .await
        .expect("get");
    assert_eq!(value.as_deref(), Some(r#"{"index":1}"#));
}

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn overwrites_existing_key() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.set("k", "first").await.expect("first");
    storage.set("k", "second").await.expect("second");
    assert_eq!(storage.get("k").await.expect("get").as_deref(), Some("second"));
    let entries = storage.entries_with_prefix("k").await.expect("entries");
    assert_eq!(entries.len(), 1);
}

#[tokio::test]
async fn removes_key_and_missing_key_reads_absent() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.set("k", "v").await.expect("set");
    storage.remove("k").await.expect("remove");
    assert_eq!(storage.get("k").await.expect("get"), None);
    storage.remove("never-written").await.expect("remove missing");
}

#[tokio::test]
async fn lists_entries_by_prefix_without_like_wildcards() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.set("app:progress:animals", "1").await.expect("set");
    storage.set("app:progress:colors", "2").await.expect("set");
    storage.set("app:progressXfood", "3").await.expect("set");
    storage.set("app:settings", "4").await.expect("set");

    let entries = storage
        .entries_with_prefix("app:progress:")
        .await
        .expect("entries");
    let keys: Vec<_> = entries.iter().map(|entry| entry.key.as_str()).collect();
    assert_eq!(keys, vec!["app:progress:animals", "app:progress:colors"]);

    let underscored = storage.entries_with_prefix("app_").await.expect("entries");
    assert!(underscored.is_empty());
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("nested").join("gesture.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    storage.set("k", "v").await.expect("set");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );

    let reopened = Storage::new(&database_url).await.expect("reopen");
    assert_eq!(reopened.get("k").await.expect("get").as_deref(), Some("v"));
}

#[tokio::test]
async fn memory_store_round_trips_and_removes() {
    let store = MemoryStore::new();
    store.set("a", "1").await.expect("set");
    assert_eq!(store.get("a").await.expect("get").as_deref(), Some("1"));
    store.remove("a").await.expect("remove");
    assert!(store.snapshot().await.is_empty());
}

#[test]
fn ignores_memory_urls_when_resolving_paths() {
    assert_eq!(sqlite_path("sqlite::memory:"), None);
    assert_eq!(
        sqlite_path("sqlite://./data/gesture.db?mode=rwc"),
        Some(PathBuf::from("./data/gesture.db"))
    );
}
