//! Publishing and withdrawing update packages

use crate::compensation::{CompensationStack, UnwindReport};
use crate::history::{HistoryAction, HistoryEntry, PublishHistory};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use updkit_config::Config;
use updkit_errors::{ConfigError, Error, PublishError};
use updkit_events::{AppEvent, EventEmitter, EventSender, FailureContext, PublishEvent};
use updkit_transfer::{ProviderRegistry, ProviderSettings, TransferProvider};
use updkit_types::{UpdateConfiguration, UpdateVersion};

/// Publishing settings independent of the storage backend
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// Remote name of the configuration document
    pub document_name: String,
    /// URL prefix clients download packages from
    pub base_uri: Option<String>,
    /// Only needed for publishing; removal works without it
    pub secret_key: Option<PathBuf>,
    pub password: Option<String>,
    /// Publish history file; `None` keeps no history
    pub history: Option<PathBuf>,
}

impl PublisherConfig {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            document_name: config.publish.document_name.clone(),
            base_uri: config.publish.base_uri.clone(),
            secret_key: config.publish.secret_key.clone(),
            password: None,
            history: Some(config.publish_history_path()),
        }
    }
}

/// A package and the configuration to publish it under
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub package: PathBuf,
    /// Signature, size and package location are filled in by the publisher
    pub configuration: UpdateConfiguration,
}

/// Signs and uploads packages and keeps the configuration document in sync
///
/// Each side effect registers an undo action; a failing step unwinds the
/// ones before it.
#[derive(Debug)]
pub struct Publisher {
    provider: Arc<dyn TransferProvider>,
    config: PublisherConfig,
    history: Option<PublishHistory>,
    tx: Option<EventSender>,
}

impl EventEmitter for Publisher {
    fn event_sender(&self) -> Option<&EventSender> {
        self.tx.as_ref()
    }
}

/// Configuration document as fetched from the provider
struct RemoteDocument {
    configurations: Vec<UpdateConfiguration>,
    /// Local copy of the document as it was, `None` if it did not exist
    original: Option<PathBuf>,
}

impl Publisher {
    #[must_use]
    pub fn new(
        provider: Arc<dyn TransferProvider>,
        config: PublisherConfig,
        tx: Option<EventSender>,
    ) -> Self {
        Self {
            provider,
            history: config.history.clone().map(PublishHistory::new),
            config,
            tx,
        }
    }

    /// Publisher for the provider named in `config`
    ///
    /// # Errors
    ///
    /// Returns an error if the provider is unknown or cannot be created.
    pub fn from_config(
        config: &Config,
        registry: &ProviderRegistry,
        tx: Option<EventSender>,
    ) -> Result<Self, Error> {
        let provider = registry.create(
            &config.publish.provider,
            ProviderSettings::from_config(&config.publish),
        )?;
        Ok(Self::new(
            Arc::from(provider),
            PublisherConfig::from_config(config),
            tx,
        ))
    }

    #[must_use]
    pub fn with_password(mut self, password: Option<String>) -> Self {
        self.config.password = password;
        self
    }

    #[must_use]
    pub fn provider(&self) -> &dyn TransferProvider {
        self.provider.as_ref()
    }

    #[must_use]
    pub fn history(&self) -> Option<&PublishHistory> {
        self.history.as_ref()
    }

    /// Configurations currently published
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be fetched or parsed.
    pub async fn published(&self) -> Result<Vec<UpdateConfiguration>, Error> {
        let scratch = tempfile::tempdir()?;
        Ok(self.fetch_document(scratch.path()).await?.configurations)
    }

    /// Sign `request.package`, upload it and add its configuration to the
    /// document
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingField` without a secret key,
    /// `PublishError::AlreadyPublished` if the version is listed,
    /// `PublishError::StepFailed` naming the failing step after a clean
    /// rollback, or `PublishError::RollbackIncomplete` if undo actions failed
    /// too.
    pub async fn publish(&self, request: PublishRequest) -> Result<UpdateConfiguration, Error> {
        let PublishRequest {
            package,
            mut configuration,
        } = request;
        let secret_key = self.config.secret_key.clone().ok_or_else(|| ConfigError::MissingField {
            field: "publish.secret_key".to_string(),
        })?;
        let version = configuration.literal_version.clone();
        self.emit(AppEvent::Publish(PublishEvent::Started {
            version: version.clone(),
            provider: self.provider.name().to_string(),
        }));

        let scratch = tempfile::tempdir()?;
        let mut stack = CompensationStack::new();

        let document = self
            .step(&mut stack, "fetch_document", self.fetch_document(scratch.path()))
            .await?;
        if document
            .configurations
            .iter()
            .any(|c| c.literal_version == version)
        {
            return Err(PublishError::AlreadyPublished {
                version: version.to_string(),
            }
            .into());
        }

        let signature = self
            .step(
                &mut stack,
                "sign",
                updkit_signing::sign_package(
                    &package,
                    &secret_key,
                    self.config.password.clone(),
                ),
            )
            .await?;

        configuration.signature = signature;
        configuration.package_size = Some(tokio::fs::metadata(&package).await?.len());
        if let Some(base) = &self.config.base_uri {
            configuration.update_package_uri =
                format!("{}/{}", base.trim_end_matches('/'), package_name(&version));
        } else if configuration.update_package_uri.is_empty() {
            return Err(ConfigError::MissingField {
                field: "publish.base_uri".to_string(),
            }
            .into());
        }
        // Clients download the file the URI names, and removal deletes it
        let remote_name = remote_package_name(&configuration);

        self.step(
            &mut stack,
            "upload_package",
            self.provider.upload(&package, &remote_name),
        )
        .await?;
        let provider = Arc::clone(&self.provider);
        let uploaded = remote_name.clone();
        stack.push("upload_package", move || async move {
            provider.delete(&uploaded).await
        });

        let mut configurations = document.configurations;
        configurations.push(configuration.clone());
        self.step(
            &mut stack,
            "upload_document",
            self.upload_document(scratch.path(), &configurations),
        )
        .await?;

        self.record(HistoryAction::Upload, &version).await;
        self.emit(AppEvent::Publish(PublishEvent::Completed { version }));
        Ok(configuration)
    }

    /// Remove `version` from the document and delete its package
    ///
    /// # Errors
    ///
    /// Returns `PublishError::NotPublished` if the version is not listed, or
    /// a step failure as for [`publish`](Self::publish).
    pub async fn remove(&self, version: &UpdateVersion) -> Result<(), Error> {
        let scratch = tempfile::tempdir()?;
        let mut stack = CompensationStack::new();

        let document = self
            .step(&mut stack, "fetch_document", self.fetch_document(scratch.path()))
            .await?;
        let (removed, remaining): (Vec<_>, Vec<_>) = document
            .configurations
            .into_iter()
            .partition(|c| c.literal_version == *version);
        let Some(removed) = removed.into_iter().next() else {
            return Err(PublishError::NotPublished {
                version: version.to_string(),
            }
            .into());
        };

        self.step(
            &mut stack,
            "upload_document",
            self.upload_document(scratch.path(), &remaining),
        )
        .await?;
        self.push_document_restore(&mut stack, document.original);

        let remote_name = remote_package_name(&removed);
        let present = self
            .step(&mut stack, "check_package", self.provider.exists(&remote_name))
            .await?;
        if present {
            self.step(&mut stack, "delete_package", self.provider.delete(&remote_name))
                .await?;
        } else {
            self.emit_warning(format!("package {remote_name} was already gone"));
        }

        self.record(HistoryAction::Delete, version).await;
        self.emit(AppEvent::Publish(PublishEvent::Removed {
            version: version.clone(),
        }));
        Ok(())
    }

    /// Run one step, unwinding `stack` if it fails
    async fn step<T, F>(&self, stack: &mut CompensationStack, name: &str, work: F) -> Result<T, Error>
    where
        F: Future<Output = Result<T, Error>>,
    {
        match work.await {
            Ok(value) => {
                self.emit(AppEvent::Publish(PublishEvent::StepCompleted {
                    step: name.to_string(),
                }));
                Ok(value)
            }
            Err(e) => {
                self.emit(AppEvent::Publish(PublishEvent::StepFailed {
                    step: name.to_string(),
                    failure: FailureContext::from_error(&e),
                }));
                let report = self.rollback(std::mem::take(stack)).await;
                Err(step_error(name, &e, &report))
            }
        }
    }

    /// Append to the history; the publish itself already succeeded
    async fn record(&self, action: HistoryAction, version: &UpdateVersion) {
        let Some(history) = &self.history else {
            return;
        };
        if let Err(e) = history
            .append(HistoryEntry::now(action, version.clone()))
            .await
        {
            tracing::warn!(path = %history.path().display(), error = %e, "failed to update publish history");
            self.emit_warning_with_context(
                format!("publish history not updated for {version}"),
                e.to_string(),
            );
        }
    }

    async fn rollback(&self, stack: CompensationStack) -> UnwindReport {
        if stack.is_empty() {
            return UnwindReport::default();
        }
        self.emit(AppEvent::Publish(PublishEvent::RollbackStarted { steps: stack.len() }));
        let report = stack.unwind().await;
        self.emit(AppEvent::Publish(PublishEvent::RollbackCompleted {
            undone: report.undone.len(),
            failed: report.failed.iter().map(|(step, _)| step.clone()).collect(),
        }));
        report
    }

    async fn fetch_document(&self, scratch: &Path) -> Result<RemoteDocument, Error> {
        let name = &self.config.document_name;
        if !self.provider.exists(name).await? {
            return Ok(RemoteDocument {
                configurations: Vec::new(),
                original: None,
            });
        }

        let local = scratch.join("original.json");
        self.provider.download(name, &local).await?;
        let content = tokio::fs::read_to_string(&local)
            .await
            .map_err(|e| Error::io_with_path(&e, &local))?;
        Ok(RemoteDocument {
            configurations: UpdateConfiguration::parse_document(&content)?,
            original: Some(local),
        })
    }

    async fn upload_document(
        &self,
        scratch: &Path,
        configurations: &[UpdateConfiguration],
    ) -> Result<(), Error> {
        let local = scratch.join("updated.json");
        tokio::fs::write(&local, UpdateConfiguration::to_document(configurations)?)
            .await
            .map_err(|e| Error::io_with_path(&e, &local))?;
        self.provider
            .upload(&local, &self.config.document_name)
            .await
    }

    /// Undo for a document upload: put the original back, or delete it if
    /// there was none
    fn push_document_restore(&self, stack: &mut CompensationStack, original: Option<PathBuf>) {
        let provider = Arc::clone(&self.provider);
        let name = self.config.document_name.clone();
        stack.push("upload_document", move || async move {
            match original {
                Some(path) => provider.upload(&path, &name).await,
                None => provider.delete(&name).await,
            }
        });
    }
}

fn package_name(version: &UpdateVersion) -> String {
    format!("{version}.zip")
}

/// File name of a published package, taken from its download URI
fn remote_package_name(configuration: &UpdateConfiguration) -> String {
    configuration
        .update_package_uri
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .map_or_else(|| package_name(&configuration.literal_version), str::to_string)
}

fn step_error(step: &str, error: &Error, report: &UnwindReport) -> Error {
    if report.is_clean() {
        PublishError::StepFailed {
            step: step.to_string(),
            message: error.to_string(),
        }
        .into()
    } else {
        PublishError::RollbackIncomplete {
            step: step.to_string(),
            message: error.to_string(),
            failed_undos: report.failed.len(),
        }
        .into()
    }
}
