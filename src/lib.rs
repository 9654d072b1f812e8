//! Declarative secrets loading for typed records.
//!
//! Annotate struct fields with `secret` tags, then let a [`Resolver`] fetch
//! them concurrently from pluggable providers — cloud secret managers,
//! vaults, the environment, files, or in-process maps. Tags name a key, an
//! optional provider scheme, an optional JSON fragment path, and options:
//!
//! ```text
//! [scheme://]key[#fragment][,optional][,version=X]
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use secretfill::{providers::EnvProvider, Resolver, Secrets};
//!
//! #[derive(Debug, Default, Secrets)]
//! struct Config {
//!     #[secret("DB_PASS")]
//!     db_pass: String,
//!     #[secret("REQUEST_TIMEOUT,optional")]
//!     timeout: Option<std::time::Duration>,
//! }
//!
//! # async fn run() -> Result<(), secretfill::ResolveError> {
//! let resolver = Resolver::builder()
//!     .default_provider(Arc::new(EnvProvider::new()))
//!     .build();
//!
//! let mut config = Config::default();
//! resolver.resolve(&mut config).await?;
//! # Ok(())
//! # }
//! ```
//!
//! Secrets sharing a `(uri, version)` pair are fetched once per resolve;
//! fields addressing different fragments of one JSON payload share its
//! fetch. [`Resolver::watch`] keeps a record fresh in the background and
//! emits a [`ChangeEvent`] per changed field; [`CachedProvider`] fronts any
//! provider with TTL memoization; [`Versioned`] fields capture the current
//! and previous value of a rotating secret.

mod cache;
mod config;
mod convert;
mod error;
mod fragment;
mod provider;
pub mod providers;
pub mod record;
mod resolver;
mod tag;
mod watcher;

pub use cache::CachedProvider;
pub use config::ResolverConfig;
pub use convert::SecretValue;
pub use error::{
    CloseError, ConvertError, FieldError, FragmentError, ProviderError, ResolveError, TagError,
};
pub use provider::{ChangeEvent, Provider, Versioned};
pub use record::{FieldBinding, FieldSpec, Secrets};
pub use resolver::{Resolver, ResolverBuilder};
pub use watcher::{WatchOptions, Watcher};

/// Derives [`Secrets`] for a struct with named fields.
///
/// Fields carry `#[secret("tag")]` to be resolved, or `#[secret(nested)]`
/// to traverse a subrecord (optionally behind `Option`, allocated via
/// `Default` when `None`) under a dotted name prefix.
pub use secretfill_derive::Secrets;
