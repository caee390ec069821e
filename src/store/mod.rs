//! Durable key-value backends and the rate-limit bookkeeping built on them.

use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

pub mod json;
pub mod memory;
pub mod sqlite;

pub use json::JsonFileStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

pub const COOLDOWN_KEY: &str = "rateLimitCooldown";
pub const COOLDOWN_START_KEY: &str = "rateLimitStartTime";
pub const LAST_REQUEST_KEY: &str = "lastRequestTime";
pub const HAS_REQUESTED_KEY: &str = "hasEverMadeRequest";

/// String key-value storage that survives restarts.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Persisted client-side throttling state.
///
/// `cooldown_remaining_secs` is the remaining cooldown as of
/// `cooldown_started_at_ms`; the live value is always derived from the
/// start time via [`RateLimitState::cooldown_remaining_at`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimitState {
    pub cooldown_remaining_secs: u64,
    pub cooldown_started_at_ms: i64,
    pub last_request_at_ms: i64,
    pub has_ever_requested: bool,
}

impl RateLimitState {
    pub fn cooldown_remaining_at(&self, now_ms: i64) -> u64 {
        if self.cooldown_remaining_secs == 0 || self.cooldown_started_at_ms <= 0 {
            return 0;
        }
        let elapsed_secs = (now_ms - self.cooldown_started_at_ms).max(0) / 1000;
        self.cooldown_remaining_secs
            .saturating_sub(elapsed_secs as u64)
    }

    /// Milliseconds left before the spacing rule allows another request.
    pub fn interval_wait_ms(&self, now_ms: i64, min_interval_ms: u64) -> Option<u64> {
        if self.last_request_at_ms <= 0 {
            return None;
        }
        let since = (now_ms - self.last_request_at_ms).max(0) as u64;
        if since < min_interval_ms {
            Some(min_interval_ms - since)
        } else {
            None
        }
    }
}

#[derive(Clone)]
pub struct RateLimitStore {
    backend: Arc<dyn KeyValueStore>,
}

impl RateLimitStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// Reads all four keys. Entries that do not parse are dropped from the
    /// backend and treated as absent.
    pub async fn load(&self) -> Result<RateLimitState> {
        let mut state = RateLimitState {
            has_ever_requested: self.backend.get(HAS_REQUESTED_KEY).await?.is_some(),
            ..Default::default()
        };

        if let Some(raw) = self.backend.get(LAST_REQUEST_KEY).await? {
            match raw.trim().parse::<i64>() {
                Ok(ms) => state.last_request_at_ms = ms,
                Err(e) => {
                    log::warn!("Discarding unreadable {}={:?}: {}", LAST_REQUEST_KEY, raw, e);
                    self.backend.remove(LAST_REQUEST_KEY).await?;
                }
            }
        }

        let cooldown = self.backend.get(COOLDOWN_KEY).await?;
        let started = self.backend.get(COOLDOWN_START_KEY).await?;
        match (cooldown, started) {
            (Some(cooldown), Some(started)) => {
                match (cooldown.trim().parse::<u64>(), started.trim().parse::<i64>()) {
                    (Ok(secs), Ok(ms)) => {
                        state.cooldown_remaining_secs = secs;
                        state.cooldown_started_at_ms = ms;
                    }
                    _ => {
                        log::warn!(
                            "Discarding unreadable cooldown entries ({:?}, {:?})",
                            cooldown,
                            started
                        );
                        self.clear_cooldown().await?;
                    }
                }
            }
            (None, None) => {}
            _ => {
                log::warn!("Discarding incomplete cooldown entry");
                self.clear_cooldown().await?;
            }
        }

        Ok(state)
    }

    pub async fn save(&self, state: &RateLimitState) -> Result<()> {
        if state.cooldown_remaining_secs > 0 && state.cooldown_started_at_ms > 0 {
            self.start_cooldown(state.cooldown_remaining_secs, state.cooldown_started_at_ms)
                .await?;
        } else {
            self.clear_cooldown().await?;
        }

        if state.last_request_at_ms > 0 {
            self.record_request(state.last_request_at_ms).await?;
        } else {
            self.backend.remove(LAST_REQUEST_KEY).await?;
        }

        if state.has_ever_requested {
            self.mark_has_requested().await
        } else {
            self.backend.remove(HAS_REQUESTED_KEY).await
        }
    }

    pub async fn clear_cooldown(&self) -> Result<()> {
        self.backend.remove(COOLDOWN_KEY).await?;
        self.backend.remove(COOLDOWN_START_KEY).await
    }

    pub async fn start_cooldown(&self, secs: u64, started_at_ms: i64) -> Result<()> {
        self.backend.set(COOLDOWN_KEY, &secs.to_string()).await?;
        self.backend
            .set(COOLDOWN_START_KEY, &started_at_ms.to_string())
            .await
    }

    pub async fn record_request(&self, at_ms: i64) -> Result<()> {
        self.backend.set(LAST_REQUEST_KEY, &at_ms.to_string()).await
    }

    pub async fn mark_has_requested(&self) -> Result<()> {
        self.backend.set(HAS_REQUESTED_KEY, "true").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (Arc<MemoryStore>, RateLimitStore) {
        let backend = Arc::new(MemoryStore::new());
        (backend.clone(), RateLimitStore::new(backend))
    }

    #[test]
    fn remaining_is_derived_from_start_time() {
        let state = RateLimitState {
            cooldown_remaining_secs: 86_400,
            cooldown_started_at_ms: 1_000_000,
            ..Default::default()
        };
        assert_eq!(state.cooldown_remaining_at(1_000_000), 86_400);
        assert_eq!(state.cooldown_remaining_at(1_000_000 + 100_000), 86_300);
        assert_eq!(state.cooldown_remaining_at(1_000_000 + 100_999), 86_300);
        assert_eq!(state.cooldown_remaining_at(1_000_000 + 90_000_000), 0);
        // a clock that moved backwards never extends the cooldown
        assert_eq!(state.cooldown_remaining_at(0), 86_400);
    }

    #[test]
    fn interval_wait_only_applies_after_a_request() {
        let mut state = RateLimitState::default();
        assert_eq!(state.interval_wait_ms(5_000_000, 3_600_000), None);

        state.last_request_at_ms = 1_000_000;
        assert_eq!(
            state.interval_wait_ms(1_000_000 + 3_600_000 - 125_000, 3_600_000),
            Some(125_000)
        );
        assert_eq!(state.interval_wait_ms(1_000_000 + 3_600_000, 3_600_000), None);
    }

    #[tokio::test]
    async fn save_then_load_restores_every_field() {
        let (_, store) = store();
        let state = RateLimitState {
            cooldown_remaining_secs: 600,
            cooldown_started_at_ms: 42_000,
            last_request_at_ms: 41_000,
            has_ever_requested: true,
        };
        store.save(&state).await.unwrap();
        assert_eq!(store.load().await.unwrap(), state);

        store.save(&RateLimitState::default()).await.unwrap();
        assert_eq!(store.load().await.unwrap(), RateLimitState::default());
    }

    #[tokio::test]
    async fn unreadable_entries_are_dropped() {
        let (backend, store) = store();
        backend.set(COOLDOWN_KEY, "soon").await.unwrap();
        backend.set(COOLDOWN_START_KEY, "123").await.unwrap();
        backend.set(LAST_REQUEST_KEY, "yesterday").await.unwrap();

        let state = store.load().await.unwrap();
        assert_eq!(state.cooldown_remaining_secs, 0);
        assert_eq!(state.last_request_at_ms, 0);
        assert_eq!(backend.get(COOLDOWN_KEY).await.unwrap(), None);
        assert_eq!(backend.get(COOLDOWN_START_KEY).await.unwrap(), None);
        assert_eq!(backend.get(LAST_REQUEST_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn presence_of_flag_means_requested() {
        let (backend, store) = store();
        backend.set(HAS_REQUESTED_KEY, "").await.unwrap();
        assert!(store.load().await.unwrap().has_ever_requested);
    }
}
