//! TTL caching decorator for providers.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::ProviderError;
use crate::provider::Provider;

/// Wraps a [`Provider`] with TTL-based memoization.
///
/// Successful results are kept in memory and reused until they expire,
/// which keeps cloud backends off the hot path and out of rate limits.
/// Errors are never cached. Safe for concurrent use; a concurrent miss may
/// fetch the same key twice, in which case the last writer wins.
pub struct CachedProvider<P> {
    inner: P,
    ttl: Duration,
    entries: DashMap<String, CacheEntry>,
}

struct CacheEntry {
    data: Vec<u8>,
    expires: Instant,
}

impl<P: Provider> CachedProvider<P> {
    /// Wraps `inner` with a cache that holds successful results for `ttl`.
    pub fn new(inner: P, ttl: Duration) -> Self {
        CachedProvider {
            inner,
            ttl,
            entries: DashMap::new(),
        }
    }

    /// Removes every cached entry.
    pub fn clear(&self) {
        self.entries.clear();
        tracing::debug!("secret cache cleared");
    }

    fn lookup(&self, cache_key: &str) -> Option<Vec<u8>> {
        let entry = self.entries.get(cache_key)?;
        if Instant::now() >= entry.expires {
            return None;
        }
        Some(entry.data.clone())
    }

    fn store(&self, cache_key: String, data: Vec<u8>) {
        self.entries.insert(
            cache_key,
            CacheEntry {
                data,
                expires: Instant::now() + self.ttl,
            },
        );
    }
}

#[async_trait]
impl<P: Provider> Provider for CachedProvider<P> {
    async fn get(&self, key: &str) -> Result<Vec<u8>, ProviderError> {
        if let Some(data) = self.lookup(key) {
            return Ok(data);
        }
        let data = self.inner.get(key).await?;
        self.store(key.to_string(), data.clone());
        Ok(data)
    }

    async fn get_version(&self, key: &str, version: &str) -> Result<Vec<u8>, ProviderError> {
        if !self.inner.supports_versioning() {
            return Err(ProviderError::VersioningNotSupported);
        }
        // NUL cannot occur in keys or version tokens.
        let cache_key = format!("{key}\0{version}");
        if let Some(data) = self.lookup(&cache_key) {
            return Ok(data);
        }
        let data = self.inner.get_version(key, version).await?;
        self.store(cache_key, data.clone());
        Ok(data)
    }

    fn supports_versioning(&self) -> bool {
        self.inner.supports_versioning()
    }

    async fn close(&self) -> Result<(), ProviderError> {
        self.clear();
        self.inner.close().await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::providers::MemoryProvider;

    struct CountingProvider {
        inner: MemoryProvider,
        calls: AtomicUsize,
        closes: Arc<AtomicUsize>,
    }

    impl CountingProvider {
        fn new(inner: MemoryProvider) -> Self {
            CountingProvider {
                inner,
                calls: AtomicUsize::new(0),
                closes: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl Provider for CountingProvider {
        async fn get(&self, key: &str) -> Result<Vec<u8>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.get(key).await
        }

        async fn get_version(&self, key: &str, version: &str) -> Result<Vec<u8>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.get_version(key, version).await
        }

        fn supports_versioning(&self) -> bool {
            true
        }

        async fn close(&self) -> Result<(), ProviderError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn backing() -> MemoryProvider {
        MemoryProvider::new([("db-pass", "s3cret")])
    }

    #[tokio::test]
    async fn hit_skips_backend() {
        let counting = CountingProvider::new(backing());
        let cached = CachedProvider::new(counting, Duration::from_secs(60));

        assert_eq!(cached.get("db-pass").await.unwrap(), b"s3cret");
        assert_eq!(cached.get("db-pass").await.unwrap(), b"s3cret");
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_entry_refetches() {
        let counting = CountingProvider::new(backing());
        let cached = CachedProvider::new(counting, Duration::from_millis(10));

        cached.get("db-pass").await.unwrap();
        tokio::time::sleep(Duration::from_millis(25)).await;
        cached.get("db-pass").await.unwrap();
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn errors_not_cached() {
        let counting = CountingProvider::new(backing());
        let cached = CachedProvider::new(counting, Duration::from_secs(60));

        assert!(cached.get("missing").await.is_err());
        assert!(cached.get("missing").await.is_err());
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn versions_cached_separately() {
        let inner = MemoryProvider::new([("api-key", "current-val")])
            .with_versions("api-key", [("previous", "old-val")]);
        let counting = CountingProvider::new(inner);
        let cached = CachedProvider::new(counting, Duration::from_secs(60));

        assert_eq!(cached.get("api-key").await.unwrap(), b"current-val");
        assert_eq!(
            cached.get_version("api-key", "previous").await.unwrap(),
            b"old-val"
        );
        assert_eq!(
            cached.get_version("api-key", "previous").await.unwrap(),
            b"old-val"
        );
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn version_unsupported_by_inner() {
        let cached = CachedProvider::new(
            crate::providers::EnvProvider::new(),
            Duration::from_secs(60),
        );
        let err = cached.get_version("key", "2").await.unwrap_err();
        assert!(matches!(err, ProviderError::VersioningNotSupported));
    }

    #[tokio::test]
    async fn clear_evicts() {
        let counting = CountingProvider::new(backing());
        let cached = CachedProvider::new(counting, Duration::from_secs(60));

        cached.get("db-pass").await.unwrap();
        cached.clear();
        cached.get("db-pass").await.unwrap();
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn close_clears_and_forwards() {
        let counting = CountingProvider::new(backing());
        let closes = counting.closes.clone();
        let cached = CachedProvider::new(counting, Duration::from_secs(60));

        cached.get("db-pass").await.unwrap();
        cached.close().await.unwrap();
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        cached.get("db-pass").await.unwrap();
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 2);
    }
}
