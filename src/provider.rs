//! The provider contract and the types shared with adapters.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// Retrieves secret values by key.
///
/// Implementations must be safe for concurrent use. A missing key must be
/// reported as [`ProviderError::NotFound`] so `optional` tags and the
/// previous slot of a [`Versioned`] pair can recover from it; wrappers such
/// as [`CachedProvider`](crate::CachedProvider) pass the sentinel through
/// unchanged.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Retrieves the raw secret bytes for the given key.
    async fn get(&self, key: &str) -> Result<Vec<u8>, ProviderError>;

    /// Retrieves the raw secret bytes for a specific version of the key.
    ///
    /// Only meaningful when [`supports_versioning`](Provider::supports_versioning)
    /// returns true; the default implementation reports the capability as
    /// missing.
    async fn get_version(&self, key: &str, version: &str) -> Result<Vec<u8>, ProviderError> {
        let _ = (key, version);
        Err(ProviderError::VersioningNotSupported)
    }

    /// Whether this provider implements versioned lookups.
    ///
    /// Required for `Versioned<T>` fields and `version=` tag options.
    fn supports_versioning(&self) -> bool {
        false
    }

    /// Releases backend resources.
    ///
    /// Called once per distinct provider instance by
    /// [`Resolver::close`](crate::Resolver::close). The default is a no-op.
    async fn close(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

/// Current and previous values of a secret, for key rotation.
///
/// When used as a field type the resolver fetches both versions: the
/// current value through [`Provider::get`] and the previous one through
/// [`Provider::get_version`] with the `"previous"` version token. A missing
/// previous version leaves that slot at its default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Versioned<T> {
    pub current: T,
    pub previous: T,
}

/// Emitted by a [`Watcher`](crate::Watcher) when a secret value changes.
///
/// Values are the post-fragment bytes of the affected field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Declared field name, dotted from the record root (e.g. `db.password`).
    pub field: String,
    /// The secret key from the field's tag.
    pub key: String,
    /// The provider scheme, or `"default"`.
    pub provider: String,
    /// Previous raw value.
    pub old_value: Vec<u8>,
    /// New raw value.
    pub new_value: Vec<u8>,
}
