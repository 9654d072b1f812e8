//! Error types for the resolver and its collaborators.
//!
//! Providers report failures through [`ProviderError`]; its `NotFound`
//! variant is the sentinel the resolver inspects for `optional` tags and for
//! the previous slot of a [`Versioned`](crate::Versioned) pair, so wrappers
//! must pass it through unchanged. A resolve pass collects one
//! [`FieldError`] per failing field and returns them joined as a single
//! [`ResolveError`].

use std::fmt;
use std::sync::Arc;

/// Errors reported by secret providers.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    /// The requested key (or key/version pair) does not exist.
    #[error("secret not found: {0}")]
    NotFound(String),

    /// The provider does not implement versioned lookups.
    #[error("provider does not support versioned secrets")]
    VersioningNotSupported,

    /// I/O failure while reaching the backend.
    #[error("io error: {0}")]
    Io(#[source] Arc<std::io::Error>),

    /// Backend-specific failure.
    #[error("{0}")]
    Backend(String),
}

impl ProviderError {
    /// Whether this error is the not-found sentinel.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ProviderError::NotFound(_))
    }
}

impl From<std::io::Error> for ProviderError {
    fn from(err: std::io::Error) -> Self {
        ProviderError::Io(Arc::new(err))
    }
}

/// Errors produced while parsing a `secret` tag.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TagError {
    #[error("empty tag")]
    Empty,

    #[error("empty key in tag {0:?}")]
    EmptyKey(String),

    #[error("invalid scheme {0:?}")]
    InvalidScheme(String),

    #[error("unknown tag option {0:?}")]
    UnknownOption(String),
}

/// Errors produced while extracting a fragment from a JSON payload.
#[derive(Debug, thiserror::Error)]
pub enum FragmentError {
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("fragment {path:?} not found")]
    NotFound { path: String },

    #[error("fragment {path:?}: {segment:?} is not a valid array index")]
    BadIndex { path: String, segment: String },

    #[error("fragment {path:?}: index {index} out of range (len {len})")]
    IndexOutOfRange { path: String, index: usize, len: usize },

    #[error("fragment {path:?}: cannot descend into a scalar value")]
    Scalar { path: String },
}

/// Errors produced while converting raw secret bytes to a field value.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("invalid utf-8 in secret value")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("invalid boolean literal {0:?}")]
    Bool(String),

    #[error(transparent)]
    Int(#[from] std::num::ParseIntError),

    #[error(transparent)]
    Float(#[from] std::num::ParseFloatError),

    #[error(transparent)]
    Duration(#[from] humantime::DurationError),

    /// Failure from a user-defined [`SecretValue`](crate::SecretValue) impl.
    #[error(transparent)]
    Custom(Box<dyn std::error::Error + Send + Sync>),
}

/// A failure scoped to a single annotated field.
#[derive(Debug, thiserror::Error)]
pub enum FieldError {
    /// The field's tag did not parse.
    #[error("field {field}: {source}")]
    Tag {
        field: String,
        #[source]
        source: TagError,
    },

    /// The tag has no scheme and the resolver has no default provider.
    #[error("field {field}: no default provider for bare key {key:?}")]
    NoDefaultProvider { field: String, key: String },

    /// The tag's scheme has no registered provider.
    #[error("field {field}: no provider registered for scheme {scheme:?} ({uri})")]
    UnknownProvider {
        field: String,
        scheme: String,
        uri: String,
    },

    /// The provider call failed.
    #[error("field {field}: key {key:?}: {source}")]
    Fetch {
        field: String,
        key: String,
        #[source]
        source: ProviderError,
    },

    /// Fragment extraction failed on the fetched payload.
    #[error("field {field}: {source}")]
    Fragment {
        field: String,
        #[source]
        source: FragmentError,
    },

    /// The raw bytes could not be converted to the field's type.
    #[error("field {field}: cannot convert {raw:?} to {type_name}: {source}")]
    Conversion {
        field: String,
        type_name: &'static str,
        raw: String,
        #[source]
        source: ConvertError,
    },

    /// A versioned lookup was required but the provider cannot do them.
    #[error("field {field}: provider {provider:?} does not support versioned secrets")]
    VersioningNotSupported { field: String, provider: String },

    /// A `version=` option on a `Versioned` field is contradictory.
    #[error("field {field}: version= option cannot be combined with a versioned pair")]
    ConflictingVersion { field: String },
}

impl FieldError {
    /// The dotted name of the field this error is scoped to.
    pub fn field(&self) -> &str {
        match self {
            FieldError::Tag { field, .. }
            | FieldError::NoDefaultProvider { field, .. }
            | FieldError::UnknownProvider { field, .. }
            | FieldError::Fetch { field, .. }
            | FieldError::Fragment { field, .. }
            | FieldError::Conversion { field, .. }
            | FieldError::VersioningNotSupported { field, .. }
            | FieldError::ConflictingVersion { field } => field,
        }
    }

    /// Whether the underlying cause is the not-found sentinel.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            FieldError::Fetch {
                source: ProviderError::NotFound(_),
                ..
            }
        )
    }
}

/// Every per-field failure of one resolve (or validate) pass, joined.
///
/// The rendering names each failing field and key so one pass over the
/// message locates every defect; [`errors`](ResolveError::errors) exposes
/// the individual [`FieldError`]s for identity-level inspection.
#[derive(Debug)]
pub struct ResolveError {
    errors: Vec<FieldError>,
}

impl ResolveError {
    pub(crate) fn new(errors: Vec<FieldError>) -> Self {
        ResolveError { errors }
    }

    /// The individual per-field errors.
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Whether any constituent error bottoms out in the not-found sentinel.
    pub fn is_not_found(&self) -> bool {
        self.errors.iter().any(FieldError::is_not_found)
    }
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ResolveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.errors.first().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Failures while closing providers, one per failing provider.
#[derive(Debug)]
pub struct CloseError {
    errors: Vec<(String, ProviderError)>,
}

impl CloseError {
    pub(crate) fn new(errors: Vec<(String, ProviderError)>) -> Self {
        CloseError { errors }
    }

    /// `(provider name, error)` pairs, one per failing provider.
    pub fn errors(&self) -> &[(String, ProviderError)] {
        &self.errors
    }
}

impl fmt::Display for CloseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, err)) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "provider {name:?}: {err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for CloseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.errors
            .first()
            .map(|(_, e)| e as &(dyn std::error::Error + 'static))
    }
}
