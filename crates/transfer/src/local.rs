//! Provider that publishes into a local or mounted directory

use crate::{validate_remote_name, ProviderSettings, TransferProvider};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use updkit_errors::{ConfigError, Error, PublishError};

const UPLOAD_PREFIX: &str = ".upload-";

#[derive(Debug, Clone)]
pub struct LocalDirectoryProvider {
    settings: ProviderSettings,
    root: PathBuf,
}

impl LocalDirectoryProvider {
    pub const NAME: &'static str = "local";

    /// # Errors
    ///
    /// Returns `ConfigError::MissingField` when no directory is configured.
    pub fn new(settings: ProviderSettings) -> Result<Self, Error> {
        let root = settings
            .directory
            .clone()
            .ok_or_else(|| ConfigError::MissingField {
                field: "publish.directory".to_string(),
            })?;
        Ok(Self { settings, root })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn target(&self, remote_name: &str) -> Result<PathBuf, Error> {
        validate_remote_name(remote_name)?;
        Ok(self.root.join(remote_name))
    }
}

#[async_trait]
impl TransferProvider for LocalDirectoryProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    async fn upload(&self, local: &Path, remote_name: &str) -> Result<(), Error> {
        let target = self.target(remote_name)?;
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| Error::io_with_path(&e, &self.root))?;

        // Copy under a hidden name first so readers never see a half-written file
        let staging = self.root.join(format!("{UPLOAD_PREFIX}{remote_name}"));
        tokio::fs::copy(local, &staging)
            .await
            .map_err(|e| Error::io_with_path(&e, local))?;
        if let Err(e) = tokio::fs::rename(&staging, &target).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(Error::io_with_path(&e, &target));
        }

        tracing::debug!(remote = remote_name, root = %self.root.display(), "uploaded");
        Ok(())
    }

    async fn download(&self, remote_name: &str, local: &Path) -> Result<(), Error> {
        let source = self.target(remote_name)?;
        tokio::fs::copy(&source, local)
            .await
            .map_err(|e| Error::io_with_path(&e, &source))?;
        Ok(())
    }

    async fn delete(&self, remote_name: &str) -> Result<(), Error> {
        let target = self.target(remote_name)?;
        tokio::fs::remove_file(&target).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PublishError::Provider {
                    message: format!("{remote_name} does not exist"),
                }
                .into()
            } else {
                Error::io_with_path(&e, &target)
            }
        })
    }

    async fn list(&self) -> Result<Vec<String>, Error> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::io_with_path(&e, &self.root)),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with(UPLOAD_PREFIX) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    async fn exists(&self, remote_name: &str) -> Result<bool, Error> {
        let target = self.target(remote_name)?;
        Ok(tokio::fs::try_exists(&target).await?)
    }
}
