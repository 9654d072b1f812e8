//! Environment variable provider.

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::provider::Provider;

/// Reads secrets from environment variables.
#[derive(Debug, Default)]
pub struct EnvProvider {
    prefix: Option<String>,
}

impl EnvProvider {
    pub fn new() -> Self {
        EnvProvider::default()
    }

    /// Prepends `prefix` to every key lookup, so `get("DB_PASS")` with
    /// prefix `"MYAPP_"` reads the variable `MYAPP_DB_PASS`.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        EnvProvider {
            prefix: Some(prefix.into()),
        }
    }
}

#[async_trait]
impl Provider for EnvProvider {
    async fn get(&self, key: &str) -> Result<Vec<u8>, ProviderError> {
        let name = match &self.prefix {
            Some(prefix) => format!("{prefix}{key}"),
            None => key.to_string(),
        };
        match std::env::var(&name) {
            Ok(value) => Ok(value.into_bytes()),
            Err(std::env::VarError::NotPresent) => {
                tracing::debug!(%name, "environment variable not set");
                Err(ProviderError::NotFound(name))
            }
            Err(std::env::VarError::NotUnicode(_)) => Err(ProviderError::Backend(format!(
                "environment variable {name} is not valid unicode"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn existing_var() {
        std::env::set_var("SECRETFILL_TEST_VAR", "s3cret");
        let p = EnvProvider::new();
        assert_eq!(p.get("SECRETFILL_TEST_VAR").await.unwrap(), b"s3cret");
        std::env::remove_var("SECRETFILL_TEST_VAR");
    }

    #[tokio::test]
    async fn missing_var_is_not_found() {
        let p = EnvProvider::new();
        let err = p.get("SECRETFILL_DEFINITELY_NOT_SET").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn prefix_applied() {
        std::env::set_var("MYAPP_DB_PASS", "hunter2");
        let p = EnvProvider::with_prefix("MYAPP_");
        assert_eq!(p.get("DB_PASS").await.unwrap(), b"hunter2");
        std::env::remove_var("MYAPP_DB_PASS");
    }
}
