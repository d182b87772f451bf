use moka::future::Cache;
use moka::Expiry;
use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::models::{SignalKey, TimeOfDay};

/// A cached value and the moment it stops being served
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub expires_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn new(value: V, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
            ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Per-entry expiry: every write restarts the entry's own TTL
struct EntryExpiry;

impl<K, V> Expiry<K, CacheEntry<V>> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &K,
        value: &CacheEntry<V>,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &K,
        value: &CacheEntry<V>,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Generic expiring key/value store
///
/// Reads evict lazily; `cleanup` sweeps eagerly. Safe to share across
/// request handlers.
pub struct TtlCache<K, V> {
    inner: Cache<K, CacheEntry<V>>,
    default_ttl: Duration,
}

impl<K, V> TtlCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(max_entries: u64, default_ttl: Duration) -> Self {
        let inner = Cache::builder()
            .max_capacity(max_entries)
            .expire_after(EntryExpiry)
            .build();

        Self { inner, default_ttl }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Get an unexpired value
    pub async fn get(&self, key: &K) -> Option<V> {
        let entry = self.inner.get(key).await?;
        if entry.is_expired() {
            self.inner.invalidate(key).await;
            return None;
        }
        Some(entry.value)
    }

    /// Insert or overwrite a value; `ttl` defaults to the cache-wide TTL
    pub async fn set(&self, key: K, value: V, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(self.default_ttl);
        self.inner.insert(key, CacheEntry::new(value, ttl)).await;
    }

    /// Get a value, computing and storing it on a miss
    ///
    /// Concurrent misses on the same key are coalesced: `init` runs once and
    /// every waiter receives its result. Returns the value and whether it was
    /// a hit.
    pub async fn get_or_insert_with<F>(&self, key: K, ttl: Option<Duration>, init: F) -> (V, bool)
    where
        F: Future<Output = V>,
    {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let entry = self
            .inner
            .entry(key)
            .or_insert_with(async move { CacheEntry::new(init.await, ttl) })
            .await;

        let hit = !entry.is_fresh();
        (entry.into_value().value, hit)
    }

    pub async fn invalidate(&self, key: &K) {
        self.inner.invalidate(key).await;
    }

    /// Eagerly remove every expired entry
    pub async fn cleanup(&self) {
        self.inner.run_pending_tasks().await;
    }

    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}

/// Owns a `TtlCache` and the background task sweeping it
pub struct CacheService<K, V> {
    cache: Arc<TtlCache<K, V>>,
    sweep_interval: Duration,
    sweeper: Mutex<Option<(watch::Sender<bool>, JoinHandle<()>)>>,
}

impl<K, V> CacheService<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(cache: TtlCache<K, V>, sweep_interval: Duration) -> Self {
        Self {
            cache: Arc::new(cache),
            sweep_interval,
            sweeper: Mutex::new(None),
        }
    }

    pub fn cache(&self) -> Arc<TtlCache<K, V>> {
        Arc::clone(&self.cache)
    }

    pub fn is_running(&self) -> bool {
        self.sweeper
            .lock()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    /// Spawn the periodic sweep. Calling it on a running service is a no-op.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let Ok(mut guard) = self.sweeper.lock() else {
            tracing::error!("Cache sweeper lock poisoned, sweep not started");
            return;
        };
        if guard.is_some() {
            return;
        }

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let cache = Arc::clone(&self.cache);
        let period = self.sweep_interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        cache.cleanup().await;
                        tracing::debug!("Cache sweep done, {} entries live", cache.entry_count());
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }
        });

        tracing::info!("Cache sweep started (interval: {:?})", period);
        *guard = Some((shutdown_tx, handle));
    }

    /// Stop the sweep and wait for the task to finish
    pub async fn stop(&self) {
        let sweeper = match self.sweeper.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };

        if let Some((shutdown_tx, handle)) = sweeper {
            let _ = shutdown_tx.send(true);
            if let Err(e) = handle.await {
                tracing::warn!("Cache sweep task ended abnormally: {}", e);
            }
            tracing::info!("Cache sweep stopped");
        }
    }
}

/// Cache key for a generated question set
///
/// Built from the sorted candidate venue ids, the sorted answered signal
/// keys and the time bucket, so equal inputs map to the same entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QuestionCacheKey {
    venue_ids: Vec<String>,
    answered: Vec<String>,
    time_bucket: String,
}

impl QuestionCacheKey {
    pub fn new<'a>(
        venue_ids: impl IntoIterator<Item = &'a str>,
        answered: &BTreeSet<SignalKey>,
        time_bucket: Option<TimeOfDay>,
    ) -> Self {
        let mut venue_ids: Vec<String> = venue_ids.into_iter().map(str::to_string).collect();
        venue_ids.sort();
        venue_ids.dedup();

        let mut answered: Vec<String> = answered.iter().map(|k| k.as_str().to_string()).collect();
        answered.sort();

        Self {
            venue_ids,
            answered,
            time_bucket: time_bucket.map(|t| t.as_str()).unwrap_or("any").to_string(),
        }
    }
}

impl fmt::Display for QuestionCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "questions:{}v:[{}]:{}",
            self.venue_ids.len(),
            self.answered.join(","),
            self.time_bucket
        )
    }
}
