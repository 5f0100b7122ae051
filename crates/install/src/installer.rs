//! Unpack a package and apply its operations

use crate::archive::extract_package;
use crate::context::OperationContext;
use crate::executor::{ExecutionReport, OperationExecutor};
use crate::placeholders::PathPlaceholders;
use crate::registry_store::{FileRegistryStore, RegistryStore};
use crate::retry::LockRetry;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use updkit_config::Config;
use updkit_errors::Error;
use updkit_events::{AppEvent, EventEmitter, EventSender, InstallEvent};
use updkit_types::{Operation, UpdateVersion};

/// Installer configuration
#[derive(Clone, Debug)]
pub struct InstallerConfig {
    /// Packages are extracted to `<work_dir>/<version>`
    pub work_dir: PathBuf,
    /// Installed application directory, exposed as `%program%`
    pub program_dir: PathBuf,
    pub lock_retry: LockRetry,
}

impl InstallerConfig {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            work_dir: config.work_path(),
            program_dir: config.program_path(),
            lock_retry: LockRetry::from(&config.install),
        }
    }
}

/// Installs downloaded packages one at a time
#[derive(Clone, Debug)]
pub struct Installer {
    config: InstallerConfig,
    registry: Arc<dyn RegistryStore>,
    tx: Option<EventSender>,
}

impl EventEmitter for Installer {
    fn event_sender(&self) -> Option<&EventSender> {
        self.tx.as_ref()
    }
}

impl Installer {
    #[must_use]
    pub fn new(
        config: InstallerConfig,
        registry: Arc<dyn RegistryStore>,
        tx: Option<EventSender>,
    ) -> Self {
        Self {
            config,
            registry,
            tx,
        }
    }

    /// Installer using the registry file and directories from `config`
    #[must_use]
    pub fn from_config(config: &Config, tx: Option<EventSender>) -> Self {
        let registry: Arc<dyn RegistryStore> =
            Arc::new(FileRegistryStore::new(config.registry_path()));
        Self::new(InstallerConfig::from_config(config), registry, tx)
    }

    #[must_use]
    pub fn config(&self) -> &InstallerConfig {
        &self.config
    }

    /// Extract `package` and run `operations` against its contents
    ///
    /// The extraction directory is removed after a successful run and kept
    /// after a failure for inspection.
    ///
    /// # Errors
    ///
    /// Returns extraction errors, or the executor's error for the first
    /// failing operation.
    pub async fn install(
        &self,
        package: &Path,
        version: &UpdateVersion,
        operations: &[Operation],
        cancel: &CancellationToken,
    ) -> Result<ExecutionReport, Error> {
        let payload_dir = self.config.work_dir.join(version.to_string());
        if tokio::fs::try_exists(&payload_dir).await? {
            tokio::fs::remove_dir_all(&payload_dir)
                .await
                .map_err(|e| Error::io_with_path(&e, &payload_dir))?;
        }

        let files = extract_package(package, &payload_dir).await?;
        self.emit(AppEvent::Install(InstallEvent::ExtractionCompleted {
            version: version.clone(),
            files,
        }));

        let context = OperationContext::new(
            &payload_dir,
            PathPlaceholders::for_program(&self.config.program_dir),
            Arc::clone(&self.registry),
        )
        .with_lock_retry(self.config.lock_retry);

        let mut executor = OperationExecutor::new(context, self.tx.clone());
        let report = executor.execute(operations, cancel).await?;

        if !report.is_cancelled() {
            if let Err(e) = tokio::fs::remove_dir_all(&payload_dir).await {
                self.emit_warning(format!(
                    "could not remove {}: {e}",
                    payload_dir.display()
                ));
            }
        }
        Ok(report)
    }
}
