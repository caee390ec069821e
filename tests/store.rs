use clients_radar::config::{ConfigLoader, StorageConfig};
use clients_radar::store::{
    COOLDOWN_KEY, COOLDOWN_START_KEY, HAS_REQUESTED_KEY, JsonFileStore, SqliteStore,
};
use clients_radar::{KeyValueStore, RateLimitState, RateLimitStore};
use std::sync::Arc;

#[tokio::test]
async fn json_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("state.json");

    {
        let store = JsonFileStore::open(&path).unwrap();
        store.set(COOLDOWN_KEY, "86400").await.unwrap();
        store.set(HAS_REQUESTED_KEY, "true").await.unwrap();
        store.set("scratch", "1").await.unwrap();
        store.remove("scratch").await.unwrap();
    }

    let reopened = JsonFileStore::open(&path).unwrap();
    assert_eq!(reopened.get(COOLDOWN_KEY).await.unwrap(), Some("86400".into()));
    assert_eq!(reopened.get(HAS_REQUESTED_KEY).await.unwrap(), Some("true".into()));
    assert_eq!(reopened.get("scratch").await.unwrap(), None);
}

#[tokio::test]
async fn json_store_rejects_corrupt_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(&path, "not json").unwrap();
    assert!(JsonFileStore::open(&path).is_err());
}

#[tokio::test]
async fn sqlite_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.db");

    {
        let store = SqliteStore::open(&path).await.unwrap();
        store.set(COOLDOWN_START_KEY, "1").await.unwrap();
        store.set(COOLDOWN_START_KEY, "2").await.unwrap();
        store.set(COOLDOWN_KEY, "60").await.unwrap();
        store.remove(COOLDOWN_KEY).await.unwrap();
        store.close().await;
    }

    let reopened = SqliteStore::open(&path).await.unwrap();
    assert_eq!(reopened.get(COOLDOWN_START_KEY).await.unwrap(), Some("2".into()));
    assert_eq!(reopened.get(COOLDOWN_KEY).await.unwrap(), None);
}

#[tokio::test]
async fn rate_limit_state_round_trips_through_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let storage = StorageConfig::Json {
        path: dir.path().join("state.json").display().to_string(),
    };
    let state = RateLimitState {
        cooldown_remaining_secs: 86_400,
        cooldown_started_at_ms: 1_700_000_000_000,
        last_request_at_ms: 1_699_999_999_000,
        has_ever_requested: true,
    };

    let store = RateLimitStore::new(ConfigLoader::open_store(&storage).await.unwrap());
    store.save(&state).await.unwrap();

    let reloaded = RateLimitStore::new(ConfigLoader::open_store(&storage).await.unwrap());
    let loaded = reloaded.load().await.unwrap();
    assert_eq!(loaded, state);
    assert_eq!(loaded.cooldown_remaining_at(1_700_000_100_000), 86_300);

    reloaded.clear_cooldown().await.unwrap();
    let cleared = RateLimitStore::new(Arc::new(
        JsonFileStore::open(dir.path().join("state.json")).unwrap(),
    ))
    .load()
    .await
    .unwrap();
    assert_eq!(cleared.cooldown_remaining_secs, 0);
    assert!(cleared.has_ever_requested);
}
