//! In-process map provider.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::ProviderError;
use crate::provider::Provider;

/// Serves secrets from an in-process map.
///
/// Intended for tests and local development. Values can be changed through
/// a shared reference, so a test can flip a secret underneath a running
/// [`Watcher`](crate::Watcher). Versioned lookups are always supported;
/// versions absent from the data report not-found.
#[derive(Debug, Default)]
pub struct MemoryProvider {
    data: DashMap<String, Vec<u8>>,
    versions: DashMap<String, DashMap<String, Vec<u8>>>,
}

impl MemoryProvider {
    /// Creates a provider holding the given key/value pairs.
    pub fn new<K, V, I>(data: I) -> Self
    where
        K: Into<String>,
        V: Into<Vec<u8>>,
        I: IntoIterator<Item = (K, V)>,
    {
        let provider = MemoryProvider::default();
        for (key, value) in data {
            provider.data.insert(key.into(), value.into());
        }
        provider
    }

    /// Adds versioned values for `key`.
    pub fn with_versions<K, V, I>(self, key: impl Into<String>, versions: I) -> Self
    where
        K: Into<String>,
        V: Into<Vec<u8>>,
        I: IntoIterator<Item = (K, V)>,
    {
        let map = DashMap::new();
        for (version, value) in versions {
            map.insert(version.into(), value.into());
        }
        self.versions.insert(key.into(), map);
        self
    }

    /// Sets (or replaces) the current value for `key`.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.data.insert(key.into(), value.into());
    }

    /// Removes the current value for `key`.
    pub fn remove(&self, key: &str) {
        self.data.remove(key);
    }
}

#[async_trait]
impl Provider for MemoryProvider {
    async fn get(&self, key: &str) -> Result<Vec<u8>, ProviderError> {
        self.data
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ProviderError::NotFound(key.to_string()))
    }

    async fn get_version(&self, key: &str, version: &str) -> Result<Vec<u8>, ProviderError> {
        self.versions
            .get(key)
            .and_then(|versions| versions.get(version).map(|entry| entry.value().clone()))
            .ok_or_else(|| ProviderError::NotFound(format!("{key}@{version}")))
    }

    fn supports_versioning(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_existing_key() {
        let p = MemoryProvider::new([("db-pass", "s3cret")]);
        assert_eq!(p.get("db-pass").await.unwrap(), b"s3cret");
    }

    #[tokio::test]
    async fn get_missing_key() {
        let p = MemoryProvider::new([("db-pass", "s3cret")]);
        assert!(p.get("no-such-key").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn get_version() {
        let p = MemoryProvider::new([("api-key", "current-val")])
            .with_versions("api-key", [("previous", "old-val")]);
        assert_eq!(
            p.get_version("api-key", "previous").await.unwrap(),
            b"old-val"
        );
        assert!(p
            .get_version("api-key", "v9")
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn mutation_through_shared_ref() {
        let p = MemoryProvider::new([("k", "initial")]);
        p.insert("k", "updated");
        assert_eq!(p.get("k").await.unwrap(), b"updated");
        p.remove("k");
        assert!(p.get("k").await.unwrap_err().is_not_found());
    }
}
