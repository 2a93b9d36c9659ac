//! Pool policy and key selection
//!
//! The pool reads and mutates key state through the store; it holds no state
//! of its own, so pool instances can be cloned cheaply around the service.
//! Selection is least-recently-used: eligible keys sort by ascending
//! `last_used` with never-used keys first, and the winner's `last_used` is
//! stamped inside the same store lock acquisition.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use youtube_keys::{KeyStore, redact};

use crate::error::{Error, Result};

/// A selected key, ready for one search request.
#[derive(Debug)]
pub struct SelectedKey {
    pub token: String,
}

/// Credential pool over a shared key store.
#[derive(Clone)]
pub struct KeyPool {
    store: Arc<KeyStore>,
}

impl KeyPool {
    /// Create a pool backed by the given key store.
    pub fn new(store: Arc<KeyStore>) -> Self {
        Self { store }
    }

    /// The underlying key store (for the admin surface).
    pub fn store(&self) -> &Arc<KeyStore> {
        &self.store
    }

    /// Select the least-recently-used eligible key.
    ///
    /// The selected key's `last_used` is updated before this returns, so a
    /// second call — sequential or concurrent — moves on to the next key.
    /// Fails with `NoKeysAvailable` when every key is inactive or
    /// quota-exceeded.
    pub async fn select(&self) -> Result<SelectedKey> {
        match self.store.select_least_recently_used(Utc::now()).await? {
            Some(token) => {
                debug!(key = %redact(&token), "selected api key");
                Ok(SelectedKey { token })
            }
            None => Err(Error::NoKeysAvailable),
        }
    }

    /// Mark a key as quota-exceeded.
    ///
    /// Idempotent: marking an already-exhausted key changes nothing and
    /// logs at debug instead of warn.
    pub async fn mark_exhausted(&self, token: &str) -> Result<()> {
        let changed = self.store.set_quota_exceeded(token, true).await?;
        if changed {
            warn!(key = %redact(token), "api key quota exhausted, parked until reset");
        } else {
            debug!(key = %redact(token), "api key already marked exhausted");
        }
        Ok(())
    }

    /// Whether at least one key is active and quota-clear. The fetch loop
    /// checks this before retrying so it never burns a request it already
    /// knows must fail.
    pub async fn has_eligible(&self) -> bool {
        self.store.has_eligible().await
    }

    /// Clear quota flags on all active keys. Returns how many were cleared.
    pub async fn reset_quota(&self) -> Result<usize> {
        let cleared = self.store.reset_quota().await?;
        info!(cleared, "reset quota flags on active api keys");
        Ok(cleared)
    }

    /// Pool health summary for the health endpoint and admin listing.
    ///
    /// Status mapping: all keys eligible → healthy, some eligible →
    /// degraded, none → unhealthy. Tokens appear redacted only.
    pub async fn health(&self) -> serde_json::Value {
        let records = self.store.records().await;

        let mut keys = Vec::with_capacity(records.len());
        let mut eligible_count = 0usize;
        let mut exhausted_count = 0usize;
        let mut inactive_count = 0usize;

        for (token, record) in &records {
            let status = if !record.active {
                inactive_count += 1;
                "inactive"
            } else if record.quota_exceeded {
                exhausted_count += 1;
                "quota_exceeded"
            } else {
                eligible_count += 1;
                "available"
            };
            keys.push(serde_json::json!({
                "key": redact(token),
                "status": status,
                "last_used": record.last_used,
            }));
        }

        let total = records.len();
        let pool_status = if eligible_count == total && total > 0 {
            "healthy"
        } else if eligible_count > 0 {
            "degraded"
        } else {
            "unhealthy"
        };

        serde_json::json!({
            "status": pool_status,
            "keys_total": total,
            "keys_available": eligible_count,
            "keys_quota_exceeded": exhausted_count,
            "keys_inactive": inactive_count,
            "keys": keys,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_pool(dir: &tempfile::TempDir, tokens: &[&str]) -> KeyPool {
        let store = KeyStore::load(dir.path().join("api_keys.json"))
            .await
            .unwrap();
        for token in tokens {
            store.upsert(token.to_string()).await.unwrap();
        }
        KeyPool::new(Arc::new(store))
    }

    #[tokio::test]
    async fn select_cycles_least_recently_used() {
        let dir = tempfile::tempdir().unwrap();
        let pool = test_pool(&dir, &["key-aaaaaaaaaa", "key-bbbbbbbbbb"]).await;

        let s1 = pool.select().await.unwrap();
        let s2 = pool.select().await.unwrap();
        let s3 = pool.select().await.unwrap();

        assert_eq!(s1.token, "key-aaaaaaaaaa");
        assert_eq!(s2.token, "key-bbbbbbbbbb");
        assert_eq!(s3.token, "key-aaaaaaaaaa");
    }

    #[tokio::test]
    async fn select_never_returns_exhausted_key() {
        let dir = tempfile::tempdir().unwrap();
        let pool = test_pool(&dir, &["key-aaaaaaaaaa", "key-bbbbbbbbbb"]).await;

        pool.mark_exhausted("key-aaaaaaaaaa").await.unwrap();

        for _ in 0..4 {
            let selected = pool.select().await.unwrap();
            assert_eq!(selected.token, "key-bbbbbbbbbb");
        }
    }

    #[tokio::test]
    async fn empty_pool_fails_selection() {
        let dir = tempfile::tempdir().unwrap();
        let pool = test_pool(&dir, &[]).await;

        let err = pool.select().await.unwrap_err();
        assert!(matches!(err, Error::NoKeysAvailable));
    }

    #[tokio::test]
    async fn all_exhausted_fails_selection() {
        let dir = tempfile::tempdir().unwrap();
        let pool = test_pool(&dir, &["key-aaaaaaaaaa", "key-bbbbbbbbbb"]).await;

        pool.mark_exhausted("key-aaaaaaaaaa").await.unwrap();
        pool.mark_exhausted("key-bbbbbbbbbb").await.unwrap();

        assert!(!pool.has_eligible().await);
        let err = pool.select().await.unwrap_err();
        assert!(matches!(err, Error::NoKeysAvailable));
    }

    #[tokio::test]
    async fn mark_exhausted_twice_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let pool = test_pool(&dir, &["key-aaaaaaaaaa"]).await;

        pool.mark_exhausted("key-aaaaaaaaaa").await.unwrap();
        pool.mark_exhausted("key-aaaaaaaaaa").await.unwrap();

        let health = pool.health().await;
        assert_eq!(health["keys_quota_exceeded"], 1);
    }

    #[tokio::test]
    async fn reset_quota_makes_keys_selectable_again() {
        let dir = tempfile::tempdir().unwrap();
        let pool = test_pool(&dir, &["key-aaaaaaaaaa"]).await;

        pool.mark_exhausted("key-aaaaaaaaaa").await.unwrap();
        assert!(!pool.has_eligible().await);

        let cleared = pool.reset_quota().await.unwrap();
        assert_eq!(cleared, 1);
        assert!(pool.has_eligible().await);

        let selected = pool.select().await.unwrap();
        assert_eq!(selected.token, "key-aaaaaaaaaa");
    }

    #[tokio::test]
    async fn health_all_available_is_healthy() {
        let dir = tempfile::tempdir().unwrap();
        let pool = test_pool(&dir, &["key-aaaaaaaaaa", "key-bbbbbbbbbb"]).await;

        let health = pool.health().await;
        assert_eq!(health["status"], "healthy");
        assert_eq!(health["keys_total"], 2);
        assert_eq!(health["keys_available"], 2);
    }

    #[tokio::test]
    async fn health_some_exhausted_is_degraded() {
        let dir = tempfile::tempdir().unwrap();
        let pool = test_pool(&dir, &["key-aaaaaaaaaa", "key-bbbbbbbbbb"]).await;

        pool.mark_exhausted("key-aaaaaaaaaa").await.unwrap();

        let health = pool.health().await;
        assert_eq!(health["status"], "degraded");
        assert_eq!(health["keys_quota_exceeded"], 1);
    }

    #[tokio::test]
    async fn health_none_available_is_unhealthy() {
        let dir = tempfile::tempdir().unwrap();
        let pool = test_pool(&dir, &["key-aaaaaaaaaa"]).await;

        pool.mark_exhausted("key-aaaaaaaaaa").await.unwrap();

        let health = pool.health().await;
        assert_eq!(health["status"], "unhealthy");
    }

    #[tokio::test]
    async fn health_empty_pool_is_unhealthy() {
        let dir = tempfile::tempdir().unwrap();
        let pool = test_pool(&dir, &[]).await;

        let health = pool.health().await;
        assert_eq!(health["status"], "unhealthy");
        assert_eq!(health["keys_total"], 0);
    }

    #[tokio::test]
    async fn health_never_exposes_full_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let pool = test_pool(&dir, &["AIzaSyVerySecretKey42"]).await;

        let health = pool.health().await;
        let rendered = health.to_string();
        assert!(!rendered.contains("AIzaSyVerySecretKey42"));
        assert_eq!(health["keys"][0]["key"], "AIzaS...Key42");
    }
}
