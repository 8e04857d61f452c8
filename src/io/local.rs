use super::Source;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;

/// Archive file on the local filesystem
pub struct LocalSource {
    path: PathBuf,
}

impl LocalSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Source for LocalSource {
    async fn fetch(&self) -> Result<Vec<u8>> {
        tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("cannot open {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_fetches_whole_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"0123456789").unwrap();

        let source = LocalSource::new(file.path());
        assert_eq!(source.fetch().await.unwrap(), b"0123456789");
        assert_eq!(source.transferred_bytes(), 0);
    }

    #[tokio::test]
    async fn test_missing_file_names_the_path() {
        let err = LocalSource::new("/definitely/not/here.zip")
            .fetch()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.zip"));
    }
}
