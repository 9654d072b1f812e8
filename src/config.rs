//! Deserializable settings block for applications that keep resolver
//! tunables in their configuration files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::watcher::WatchOptions;

/// Resolver tunables, suitable for embedding in an application's config.
///
/// Every field has a default, so an empty table deserializes to the same
/// values as [`ResolverConfig::default`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Maximum number of concurrent secret fetches.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,

    /// Watcher polling interval in seconds.
    #[serde(default = "default_watch_interval_secs")]
    pub watch_interval_secs: u64,

    /// TTL in seconds for [`CachedProvider`](crate::CachedProvider).
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

fn default_parallelism() -> usize {
    10
}

fn default_watch_interval_secs() -> u64 {
    60
}

fn default_cache_ttl_secs() -> u64 {
    300 // 5 minutes
}

impl Default for ResolverConfig {
    fn default() -> Self {
        ResolverConfig {
            parallelism: default_parallelism(),
            watch_interval_secs: default_watch_interval_secs(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl ResolverConfig {
    /// The configured watcher options.
    pub fn watch_options(&self) -> WatchOptions {
        WatchOptions {
            interval: Duration::from_secs(self.watch_interval_secs),
        }
    }

    /// The configured cache TTL.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}
