//! One update run: search, download, validate, install

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use updkit_config::Config;
use updkit_errors::{Error, SigningError};
use updkit_events::{
    AppEvent, CorrelatedEmitter, EventEmitter, EventSender, FailureContext, GeneralEvent,
    InstallEvent, ResolverEvent, SkipReason,
};
use updkit_install::{ExecutionReport, Installer, InstallerConfig, RegistryStore};
use updkit_net::{
    fetch_configurations, os_name, send_statistics, DownloadedPackage, NetClient, NetConfig,
    PackageTransferController, ProgressSink, TransferConfig, TransferOutcome,
};
use updkit_resolver::{unmet_requirements, HostInfo, ResolveOptions, UpdateConfigurationResolver, UpdateResult};
use updkit_signing::PackageValidator;
use updkit_types::UpdateVersion;

/// Everything one session needs, resolved up front
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub configuration_uri: String,
    pub current_version: UpdateVersion,
    pub resolve: ResolveOptions,
    /// Host versions checked against configuration requirements
    pub host: HostInfo,
    /// Base64 minisign public key; required when signatures are verified
    pub public_key: Option<String>,
    pub verify_signatures: bool,
    /// Send download statistics for configurations that opt in
    pub statistics: bool,
    pub net: NetConfig,
    pub transfer: TransferConfig,
    pub installer: InstallerConfig,
}

impl SessionConfig {
    /// Build from the loaded configuration and the probed host
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingField` when the configuration URI or
    /// current version is unset, or a version error if it is malformed.
    pub fn from_config(config: &Config, host: HostInfo) -> Result<Self, Error> {
        Ok(Self {
            configuration_uri: config.configuration_uri()?.to_string(),
            current_version: config.current_version()?,
            resolve: ResolveOptions {
                allow_alpha: config.updater.allow_alpha,
                allow_beta: config.updater.allow_beta,
                ..ResolveOptions::for_host()
            },
            host,
            public_key: config.security.public_key.clone(),
            verify_signatures: config.security.verify_signatures,
            statistics: config.updater.statistics,
            net: NetConfig::from(&config.network),
            transfer: TransferConfig::from_config(config),
            installer: InstallerConfig::from_config(config),
        })
    }
}

/// How [`UpdateSession::run`] ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SessionOutcome {
    UpToDate,
    Installed { versions: Vec<UpdateVersion> },
    Cancelled,
}

/// Drives the update pipeline for one run
///
/// Stages run strictly in sequence; each stage uses the result of the one
/// before it.
#[derive(Debug)]
pub struct UpdateSession {
    config: SessionConfig,
    client: NetClient,
    registry: Arc<dyn RegistryStore>,
    emitter: CorrelatedEmitter,
    tx: Option<EventSender>,
    cancel: CancellationToken,
    result: Option<UpdateResult>,
    downloaded: Vec<DownloadedPackage>,
}

impl EventEmitter for UpdateSession {
    fn event_sender(&self) -> Option<&EventSender> {
        self.emitter.event_sender()
    }

    fn correlation_id(&self) -> Option<&str> {
        self.emitter.correlation_id()
    }
}

impl UpdateSession {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(
        config: SessionConfig,
        registry: Arc<dyn RegistryStore>,
        tx: Option<EventSender>,
    ) -> Result<Self, Error> {
        let client = NetClient::new(config.net.clone())?;
        let emitter = CorrelatedEmitter::new(tx.clone(), uuid::Uuid::new_v4().to_string());
        Ok(Self {
            config,
            client,
            registry,
            emitter,
            tx,
            cancel: CancellationToken::new(),
            result: None,
            downloaded: Vec::new(),
        })
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Token that cancels the running download or install
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Result of the last search
    #[must_use]
    pub fn result(&self) -> Option<&UpdateResult> {
        self.result.as_ref()
    }

    #[must_use]
    pub fn downloaded(&self) -> &[DownloadedPackage] {
        &self.downloaded
    }

    /// Fetch the configuration document and select applicable updates
    ///
    /// Configurations whose host requirements are not met are dropped after
    /// resolution.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be fetched or parsed.
    pub async fn search(&mut self) -> Result<&UpdateResult, Error> {
        self.emit(AppEvent::Resolver(ResolverEvent::SearchStarted {
            current_version: self.config.current_version.clone(),
            configuration_uri: self.config.configuration_uri.clone(),
        }));

        let configurations =
            match fetch_configurations(&self.client, &self.config.configuration_uri, self.tx.as_ref())
                .await
            {
                Ok(configurations) => configurations,
                Err(e) => {
                    self.emit(AppEvent::Resolver(ResolverEvent::SearchFailed {
                        failure: FailureContext::from_error(&e),
                    }));
                    return Err(e);
                }
            };

        let resolved = UpdateConfigurationResolver::new(self.tx.clone()).resolve(
            &configurations,
            &self.config.current_version,
            &self.config.resolve,
        );

        let mut applicable = Vec::with_capacity(resolved.configurations.len());
        for configuration in resolved.configurations {
            let unmet = unmet_requirements(&configuration, &self.config.host);
            if unmet.is_empty() {
                applicable.push(configuration);
            } else {
                tracing::debug!(version = %configuration.literal_version, ?unmet, "requirements not met");
                self.emit(AppEvent::Resolver(ResolverEvent::CandidateSkipped {
                    version: configuration.literal_version.clone(),
                    reason: SkipReason::UnmetRequirement,
                }));
            }
        }

        let result = UpdateResult::new(applicable);
        self.emit(AppEvent::Resolver(ResolverEvent::SearchCompleted {
            current_version: self.config.current_version.clone(),
            newest: result.newest().map(|c| c.literal_version.clone()),
            update_count: result.configurations.len(),
            total_package_size: result.total_package_size(),
            necessary: result.is_necessary(),
        }));

        self.downloaded.clear();
        Ok(&*self.result.insert(result))
    }

    /// Download the packages found by the last search
    ///
    /// Sends a best-effort statistics ping for each completed package whose
    /// configuration opts in.
    ///
    /// # Errors
    ///
    /// Returns `NetworkError::TransferFailed` for the first package that
    /// cannot be downloaded, or an internal error if no search ran.
    pub async fn download(&mut self, sink: &dyn ProgressSink) -> Result<TransferOutcome, Error> {
        let configurations = self
            .result
            .as_ref()
            .map(|r| r.configurations.clone())
            .ok_or_else(|| Error::internal("download requested before search"))?;

        let controller = PackageTransferController::new(
            self.client.clone(),
            self.config.transfer.clone(),
            self.tx.clone(),
        );
        let outcome = controller.download(&configurations, sink, &self.cancel).await?;

        if self.config.statistics {
            let os = os_name();
            for package in outcome.packages() {
                match send_statistics(&self.client, &package.configuration, &os).await {
                    Ok(true) => self.emit(AppEvent::General(GeneralEvent::StatisticsReported {
                        version_id: package.configuration.version_id,
                        accepted: true,
                    })),
                    Ok(false) => {}
                    Err(e) => {
                        tracing::debug!(error = %e, "statistics ping failed");
                        self.emit_warning_with_context("statistics ping failed", e.to_string());
                    }
                }
            }
        }

        self.downloaded = outcome.packages().to_vec();
        Ok(outcome)
    }

    /// Verify the signature of every downloaded package
    ///
    /// # Errors
    ///
    /// Returns `SigningError::VerificationFailed` naming the first package
    /// whose signature does not match, `ConfigError::MissingField` when no
    /// public key is configured, or the validator's error.
    pub async fn validate(&self) -> Result<(), Error> {
        if !self.config.verify_signatures {
            self.emit_warning("signature verification is disabled");
            return Ok(());
        }

        let public_key = self.config.public_key.as_deref().ok_or_else(|| {
            updkit_errors::ConfigError::MissingField {
                field: "security.public_key".to_string(),
            }
        })?;
        let validator = PackageValidator::new(public_key)?;

        for package in &self.downloaded {
            let valid = validator.validate(&package.path, package.signature()).await?;
            self.emit(AppEvent::Install(InstallEvent::ValidationCompleted {
                version: package.version().clone(),
                valid,
            }));
            if !valid {
                return Err(SigningError::VerificationFailed {
                    reason: format!("signature mismatch for update {}", package.version()),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Install the downloaded packages, oldest version first
    ///
    /// Stops at the first failure or cancellation.
    ///
    /// # Errors
    ///
    /// Returns the installer's error for the first package that fails.
    pub async fn install(&self) -> Result<Vec<ExecutionReport>, Error> {
        let mut packages: Vec<&DownloadedPackage> = self.downloaded.iter().collect();
        packages.sort_by(|a, b| a.version().cmp(b.version()));

        let installer = Installer::new(
            self.config.installer.clone(),
            Arc::clone(&self.registry),
            self.tx.clone(),
        );

        let mut reports = Vec::with_capacity(packages.len());
        for package in packages {
            let report = installer
                .install(
                    &package.path,
                    package.version(),
                    &package.configuration.operations,
                    &self.cancel,
                )
                .await?;
            let cancelled = report.is_cancelled();
            reports.push(report);
            if cancelled {
                break;
            }
        }
        Ok(reports)
    }

    /// Run every stage in sequence
    ///
    /// # Errors
    ///
    /// Returns the error of the first stage that fails.
    pub async fn run(&mut self, sink: &dyn ProgressSink) -> Result<SessionOutcome, Error> {
        self.emit_operation_started("update");

        let outcome = self.run_stages(sink).await;
        match &outcome {
            Ok(_) => self.emit_operation_completed("update", true),
            Err(e) => self.emit_operation_failed("update", e.to_string()),
        }
        outcome
    }

    async fn run_stages(&mut self, sink: &dyn ProgressSink) -> Result<SessionOutcome, Error> {
        if !self.search().await?.updates_found {
            return Ok(SessionOutcome::UpToDate);
        }

        if self.download(sink).await?.is_cancelled() {
            return Ok(SessionOutcome::Cancelled);
        }

        self.validate().await?;

        let reports = self.install().await?;
        if reports.iter().any(ExecutionReport::is_cancelled) {
            return Ok(SessionOutcome::Cancelled);
        }

        let mut versions: Vec<UpdateVersion> =
            self.downloaded.iter().map(|p| p.version().clone()).collect();
        versions.sort();
        Ok(SessionOutcome::Installed { versions })
    }
}
