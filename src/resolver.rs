//! The resolve engine: plan collection, deduplicated concurrent fetching,
//! fragment extraction, typed assignment, and error aggregation.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures_util::future::join_all;
use tokio::sync::Semaphore;

use crate::error::{CloseError, FieldError, ProviderError, ResolveError};
use crate::fragment;
use crate::provider::Provider;
use crate::record::{self, FieldBinding, Secrets, SlotAccess};
use crate::tag::{parse_tag, ParsedTag};

const DEFAULT_PARALLELISM: usize = 10;

/// Version token requested for the previous slot of a `Versioned<T>` pair.
pub(crate) const PREVIOUS_VERSION: &str = "previous";

/// Resolves `secret`-annotated record fields from configured providers.
///
/// Cheap to clone; clones share the same provider set.
#[derive(Clone)]
pub struct Resolver {
    default_provider: Option<Arc<dyn Provider>>,
    providers: HashMap<String, Arc<dyn Provider>>,
    parallelism: usize,
}

/// Builder for [`Resolver`].
#[derive(Default)]
pub struct ResolverBuilder {
    default_provider: Option<Arc<dyn Provider>>,
    providers: HashMap<String, Arc<dyn Provider>>,
    parallelism: Option<usize>,
}

impl ResolverBuilder {
    /// Sets the provider used for bare keys (tags with no URI scheme).
    pub fn default_provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.default_provider = Some(provider);
        self
    }

    /// Registers a provider for the given URI scheme.
    pub fn provider(mut self, scheme: impl Into<String>, provider: Arc<dyn Provider>) -> Self {
        self.providers.insert(scheme.into(), provider);
        self
    }

    /// Sets the maximum number of concurrent secret fetches.
    ///
    /// Defaults to 10; values below 1 are clamped to 1.
    pub fn parallelism(mut self, n: usize) -> Self {
        self.parallelism = Some(n);
        self
    }

    /// Applies the tunables from a [`ResolverConfig`](crate::ResolverConfig).
    pub fn config(mut self, config: &crate::ResolverConfig) -> Self {
        self.parallelism = Some(config.parallelism);
        self
    }

    pub fn build(self) -> Resolver {
        Resolver {
            default_provider: self.default_provider,
            providers: self.providers,
            parallelism: self.parallelism.unwrap_or(DEFAULT_PARALLELISM).max(1),
        }
    }
}

/// A planned fetch, deduplicated across fields by canonical URI + version.
///
/// An empty version denotes the current value, fetched through
/// [`Provider::get`]; any other value goes through
/// [`Provider::get_version`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FetchKey {
    uri: String,
    version: String,
}

/// One annotated field bound to its provider for this pass.
struct FieldTask<'a> {
    binding: FieldBinding<'a>,
    tag: ParsedTag,
    provider: Arc<dyn Provider>,
    provider_name: String,
    versioned: bool,
}

struct FetchSpec {
    key: FetchKey,
    provider: Arc<dyn Provider>,
    secret_key: String,
}

type FetchResults = HashMap<FetchKey, Result<Vec<u8>, ProviderError>>;

impl Resolver {
    pub fn builder() -> ResolverBuilder {
        ResolverBuilder::default()
    }

    /// Populates every `secret`-annotated field of `record`.
    ///
    /// Unique `(uri, version)` pairs are fetched once each, concurrently up
    /// to the configured parallelism; fields sharing a secret share its
    /// fetch. Assignments happen in declaration order. Every per-field
    /// failure is collected into one [`ResolveError`].
    pub async fn resolve<R: Secrets>(&self, record: &mut R) -> Result<(), ResolveError> {
        let mut errors = Vec::new();
        let mut tasks = Vec::new();
        for binding in record.secret_fields() {
            if let Some(task) = self.plan_field(binding, &mut errors) {
                tasks.push(task);
            }
        }
        if tasks.is_empty() {
            return if errors.is_empty() {
                Ok(())
            } else {
                Err(ResolveError::new(errors))
            };
        }

        let specs = build_plan(&tasks);
        tracing::debug!(
            fields = tasks.len(),
            fetches = specs.len(),
            "resolving secrets"
        );
        let results = self.run_fetches(specs).await;

        for task in &mut tasks {
            apply_task(task, &results, &mut errors);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ResolveError::new(errors))
        }
    }

    /// Checks `R` against this resolver without contacting any provider.
    ///
    /// Reports every defect at once: malformed tags, schemes with no
    /// registered provider, bare keys with no default provider, and
    /// `Versioned<T>` fields bound to providers without versioning (or
    /// carrying a contradictory `version=` option).
    pub fn validate<R: Secrets>(&self) -> Result<(), ResolveError> {
        let mut errors = Vec::new();
        for spec in R::field_specs("") {
            let tag = match parse_tag(spec.tag) {
                Ok(tag) => tag,
                Err(source) => {
                    errors.push(FieldError::Tag {
                        field: spec.name,
                        source,
                    });
                    continue;
                }
            };
            let provider = match &tag.scheme {
                Some(scheme) => match self.providers.get(scheme) {
                    Some(provider) => provider,
                    None => {
                        errors.push(FieldError::UnknownProvider {
                            field: spec.name,
                            scheme: scheme.clone(),
                            uri: tag.uri(),
                        });
                        continue;
                    }
                },
                None => match &self.default_provider {
                    Some(provider) => provider,
                    None => {
                        errors.push(FieldError::NoDefaultProvider {
                            field: spec.name,
                            key: tag.key,
                        });
                        continue;
                    }
                },
            };
            if spec.versioned {
                if tag.version.is_some() {
                    errors.push(FieldError::ConflictingVersion { field: spec.name });
                    continue;
                }
                if !provider.supports_versioning() {
                    errors.push(FieldError::VersioningNotSupported {
                        field: spec.name,
                        provider: tag
                            .scheme
                            .unwrap_or_else(|| "default".to_string()),
                    });
                }
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ResolveError::new(errors))
        }
    }

    /// Closes every distinct provider exactly once.
    ///
    /// A provider bound both as default and under one or more schemes is
    /// closed a single time (deduplicated by instance identity).
    pub async fn close(&self) -> Result<(), CloseError> {
        let mut seen: Vec<&Arc<dyn Provider>> = Vec::new();
        let mut targets: Vec<(String, &Arc<dyn Provider>)> = Vec::new();
        if let Some(provider) = &self.default_provider {
            seen.push(provider);
            targets.push(("default".to_string(), provider));
        }
        for (scheme, provider) in &self.providers {
            if seen.iter().any(|other| Arc::ptr_eq(other, provider)) {
                continue;
            }
            seen.push(provider);
            targets.push((scheme.clone(), provider));
        }

        let mut errors = Vec::new();
        for (name, provider) in targets {
            if let Err(err) = provider.close().await {
                tracing::warn!(provider = %name, error = %err, "provider close failed");
                errors.push((name, err));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(CloseError::new(errors))
        }
    }

    /// Parses one binding's tag and resolves its provider, recording any
    /// defect. Returns `None` when the field cannot be fetched.
    fn plan_field<'a>(
        &self,
        binding: FieldBinding<'a>,
        errors: &mut Vec<FieldError>,
    ) -> Option<FieldTask<'a>> {
        let tag = match parse_tag(binding.tag) {
            Ok(tag) => tag,
            Err(source) => {
                errors.push(FieldError::Tag {
                    field: binding.name.clone(),
                    source,
                });
                return None;
            }
        };

        let (provider, provider_name) = match &tag.scheme {
            Some(scheme) => match self.providers.get(scheme) {
                Some(provider) => (provider.clone(), scheme.clone()),
                None => {
                    errors.push(FieldError::UnknownProvider {
                        field: binding.name.clone(),
                        scheme: scheme.clone(),
                        uri: tag.uri(),
                    });
                    return None;
                }
            },
            None => match &self.default_provider {
                Some(provider) => (provider.clone(), "default".to_string()),
                None => {
                    errors.push(FieldError::NoDefaultProvider {
                        field: binding.name.clone(),
                        key: tag.key.clone(),
                    });
                    return None;
                }
            },
        };

        let versioned = record::slot_is_versioned(&mut *binding.slot);
        if versioned {
            if tag.version.is_some() {
                errors.push(FieldError::ConflictingVersion {
                    field: binding.name.clone(),
                });
                return None;
            }
            if !provider.supports_versioning() {
                errors.push(FieldError::VersioningNotSupported {
                    field: binding.name.clone(),
                    provider: provider_name,
                });
                return None;
            }
        }

        Some(FieldTask {
            binding,
            tag,
            provider,
            provider_name,
            versioned,
        })
    }

    /// Runs every planned fetch, bounded by the configured parallelism.
    async fn run_fetches(&self, specs: Vec<FetchSpec>) -> FetchResults {
        let semaphore = Semaphore::new(self.parallelism);
        let fetches = specs.into_iter().map(|spec| {
            let semaphore = &semaphore;
            async move {
                let _permit = semaphore
                    .acquire()
                    .await
                    .expect("fetch semaphore never closed");
                let result = if spec.key.version.is_empty() {
                    spec.provider.get(&spec.secret_key).await
                } else {
                    spec.provider
                        .get_version(&spec.secret_key, &spec.key.version)
                        .await
                };
                if let Err(error) = &result {
                    tracing::debug!(key = %spec.secret_key, %error, "secret fetch failed");
                }
                (spec.key, result)
            }
        });
        join_all(fetches).await.into_iter().collect()
    }
}

/// Projects the task list onto the set of unique fetches.
fn build_plan(tasks: &[FieldTask<'_>]) -> Vec<FetchSpec> {
    let mut seen = HashSet::new();
    let mut specs = Vec::new();
    let mut push = |key: FetchKey, task: &FieldTask<'_>| {
        if seen.insert(key.clone()) {
            specs.push(FetchSpec {
                key,
                provider: task.provider.clone(),
                secret_key: task.tag.key.clone(),
            });
        }
    };

    for task in tasks {
        let uri = task.tag.uri();
        if task.versioned {
            push(
                FetchKey {
                    uri: uri.clone(),
                    version: String::new(),
                },
                task,
            );
            push(
                FetchKey {
                    uri,
                    version: PREVIOUS_VERSION.to_string(),
                },
                task,
            );
        } else {
            push(
                FetchKey {
                    uri,
                    version: task.tag.version.clone().unwrap_or_default(),
                },
                task,
            );
        }
    }
    specs
}

/// Applies the fetched bytes to one field, recording any failure.
fn apply_task(task: &mut FieldTask<'_>, results: &FetchResults, errors: &mut Vec<FieldError>) {
    let field = task.binding.name.clone();
    let uri = task.tag.uri();
    let optional = task.tag.optional;
    let secret_key = task.tag.key.clone();
    let provider_name = task.provider_name.clone();
    let fragment_path = task.tag.fragment.clone();
    let tag_version = task.tag.version.clone().unwrap_or_default();

    match task.binding.slot.access() {
        SlotAccess::Value(slot) => {
            let key = FetchKey {
                uri,
                version: tag_version,
            };
            let Some(result) = results.get(&key) else {
                return;
            };
            match result {
                Err(err) => {
                    if optional && err.is_not_found() {
                        return;
                    }
                    errors.push(fetch_error(field, &secret_key, &provider_name, err));
                }
                Ok(data) => {
                    let Some(value) =
                        extract_value(data, &field, fragment_path.as_deref(), errors)
                    else {
                        return;
                    };
                    if let Err(source) = slot.assign(&value) {
                        errors.push(conversion_error(field, slot.type_name(), &value, source));
                    }
                }
            }
        }
        SlotAccess::Pair { current, previous } => {
            let current_key = FetchKey {
                uri: uri.clone(),
                version: String::new(),
            };
            let Some(result) = results.get(&current_key) else {
                return;
            };
            let data = match result {
                Err(err) => {
                    if !(optional && err.is_not_found()) {
                        errors.push(fetch_error(field, &secret_key, &provider_name, err));
                    }
                    return;
                }
                Ok(data) => data,
            };
            let Some(value) = extract_value(data, &field, fragment_path.as_deref(), errors)
            else {
                return;
            };
            if let Err(source) = current.assign(&value) {
                errors.push(conversion_error(
                    format!("{field}.current"),
                    current.type_name(),
                    &value,
                    source,
                ));
                return;
            }

            // The previous version is best-effort: absent means the secret
            // has never been rotated and the slot stays at its default.
            let previous_key = FetchKey {
                uri,
                version: PREVIOUS_VERSION.to_string(),
            };
            let Some(result) = results.get(&previous_key) else {
                return;
            };
            let data = match result {
                Err(err) => {
                    if !err.is_not_found() {
                        errors.push(fetch_error(field, &secret_key, &provider_name, err));
                    }
                    return;
                }
                Ok(data) => data,
            };
            let Some(value) = extract_value(data, &field, fragment_path.as_deref(), errors)
            else {
                return;
            };
            if let Err(source) = previous.assign(&value) {
                errors.push(conversion_error(
                    format!("{field}.previous"),
                    previous.type_name(),
                    &value,
                    source,
                ));
            }
        }
    }
}

/// Applies the tag's fragment path, if any, recording extraction failures.
fn extract_value(
    data: &[u8],
    field: &str,
    fragment_path: Option<&str>,
    errors: &mut Vec<FieldError>,
) -> Option<Vec<u8>> {
    match fragment_path {
        None => Some(data.to_vec()),
        Some(path) => match fragment::extract(data, path) {
            Ok(value) => Some(value),
            Err(source) => {
                errors.push(FieldError::Fragment {
                    field: field.to_string(),
                    source,
                });
                None
            }
        },
    }
}

fn fetch_error(
    field: String,
    secret_key: &str,
    provider_name: &str,
    err: &ProviderError,
) -> FieldError {
    match err {
        ProviderError::VersioningNotSupported => FieldError::VersioningNotSupported {
            field,
            provider: provider_name.to_string(),
        },
        _ => FieldError::Fetch {
            field,
            key: secret_key.to_string(),
            source: err.clone(),
        },
    }
}

fn conversion_error(
    field: String,
    type_name: &'static str,
    raw: &[u8],
    source: crate::error::ConvertError,
) -> FieldError {
    FieldError::Conversion {
        field,
        type_name,
        raw: String::from_utf8_lossy(raw).into_owned(),
        source,
    }
}
