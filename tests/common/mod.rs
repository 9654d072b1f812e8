#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use secretfill::providers::MemoryProvider;
use secretfill::{Provider, ProviderError};

/// Wraps a [`MemoryProvider`] and counts every call, for asserting on
/// deduplication and close-once behavior.
pub struct RecordingProvider {
    pub inner: MemoryProvider,
    pub gets: AtomicUsize,
    pub version_gets: AtomicUsize,
    pub closes: AtomicUsize,
}

impl RecordingProvider {
    pub fn new(inner: MemoryProvider) -> Arc<Self> {
        Arc::new(RecordingProvider {
            inner,
            gets: AtomicUsize::new(0),
            version_gets: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.gets.load(Ordering::SeqCst) + self.version_gets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for RecordingProvider {
    async fn get(&self, key: &str) -> Result<Vec<u8>, ProviderError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key).await
    }

    async fn get_version(&self, key: &str, version: &str) -> Result<Vec<u8>, ProviderError> {
        self.version_gets.fetch_add(1, Ordering::SeqCst);
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

/// A map provider without versioning support.
pub struct PlainProvider {
    inner: MemoryProvider,
}

impl PlainProvider {
    pub fn new(inner: MemoryProvider) -> Arc<Self> {
        Arc::new(PlainProvider { inner })
    }
}

#[async_trait]
impl Provider for PlainProvider {
    async fn get(&self, key: &str) -> Result<Vec<u8>, ProviderError> {
        self.inner.get(key).await
    }
}
