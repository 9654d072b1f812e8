//! Filesystem provider.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::provider::Provider;

/// Reads secrets from files, keyed by path.
///
/// Pairs well with mounted secret volumes (e.g. `/run/secrets`).
#[derive(Debug, Default)]
pub struct FileProvider {
    base_dir: Option<PathBuf>,
    trim_newline: bool,
}

impl FileProvider {
    pub fn new() -> Self {
        FileProvider::default()
    }

    /// Resolves keys relative to `dir` instead of the process working
    /// directory.
    pub fn base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Trims one trailing `\n` or `\r\n` from file contents, which editors
    /// and tooling commonly append to secret files.
    pub fn trim_newline(mut self, trim: bool) -> Self {
        self.trim_newline = trim;
        self
    }
}

#[async_trait]
impl Provider for FileProvider {
    async fn get(&self, key: &str) -> Result<Vec<u8>, ProviderError> {
        let path = match &self.base_dir {
            Some(dir) => dir.join(key),
            None => PathBuf::from(key),
        };
        let mut data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(ProviderError::NotFound(path.display().to_string()));
            }
            Err(err) => return Err(err.into()),
        };
        if self.trim_newline {
            if data.last() == Some(&b'\n') {
                data.pop();
                if data.last() == Some(&b'\r') {
                    data.pop();
                }
            }
        }
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("db-pass"), b"s3cret").unwrap();

        let p = FileProvider::new().base_dir(dir.path());
        assert_eq!(p.get("db-pass").await.unwrap(), b"s3cret");
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let p = FileProvider::new().base_dir(dir.path());
        let err = p.get("no-such-file").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn trims_trailing_newline() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("unix"), b"value\n").unwrap();
        std::fs::write(dir.path().join("dos"), b"value\r\n").unwrap();
        std::fs::write(dir.path().join("bare"), b"value").unwrap();

        let p = FileProvider::new().base_dir(dir.path()).trim_newline(true);
        assert_eq!(p.get("unix").await.unwrap(), b"value");
        assert_eq!(p.get("dos").await.unwrap(), b"value");
        assert_eq!(p.get("bare").await.unwrap(), b"value");
    }

    #[tokio::test]
    async fn keeps_newline_by_default() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("unix"), b"value\n").unwrap();

        let p = FileProvider::new().base_dir(dir.path());
        assert_eq!(p.get("unix").await.unwrap(), b"value\n");
    }
}
