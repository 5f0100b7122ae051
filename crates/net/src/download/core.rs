//! Sequential package transfer

use super::config::{DownloadedPackage, TransferConfig, TransferOutcome};
use super::stream::{
    open_body, stream_to_file, BatchProgress, LockGuard, PartFile, StreamOutcome, StreamParams,
};
use super::validation::{validate_size, validate_url};
use crate::client::NetClient;
use crate::progress::ProgressSink;
use tokio_util::sync::CancellationToken;
use updkit_errors::{Error, NetworkError};
use updkit_events::{AppEvent, DownloadEvent, EventEmitter, EventSender, FailureContext};
use updkit_types::UpdateConfiguration;

/// Downloads update packages one after another into the staging directory
#[derive(Clone, Debug)]
pub struct PackageTransferController {
    client: NetClient,
    config: TransferConfig,
    tx: Option<EventSender>,
}

impl EventEmitter for PackageTransferController {
    fn event_sender(&self) -> Option<&EventSender> {
        self.tx.as_ref()
    }
}

/// Per-package result inside a batch
enum PackageOutcome {
    Done(DownloadedPackage),
    Cancelled,
}

impl PackageTransferController {
    #[must_use]
    pub fn new(client: NetClient, config: TransferConfig, tx: Option<EventSender>) -> Self {
        Self { client, config, tx }
    }

    #[must_use]
    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Download every package in `configurations`, in order
    ///
    /// Packages land in `<staging_dir>/<version>.zip`. Cancellation is
    /// honoured between packages and while waiting for a response or the
    /// next chunk. It removes the partial file, keeps completed ones and is
    /// not an error.
    ///
    /// # Errors
    ///
    /// Returns `NetworkError::TransferFailed` for the first package that
    /// cannot be downloaded. The batch stops there and the partial file is
    /// removed; packages completed before it stay on disk.
    pub async fn download(
        &self,
        configurations: &[UpdateConfiguration],
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<TransferOutcome, Error> {
        tokio::fs::create_dir_all(&self.config.staging_dir)
            .await
            .map_err(|e| Error::io_with_path(&e, &self.config.staging_dir))?;

        let hinted: Option<u64> = configurations
            .iter()
            .map(|c| c.package_size)
            .try_fold(0u64, |sum, size| size.map(|s| sum + s));
        self.emit(AppEvent::Download(DownloadEvent::BatchStarted {
            packages: configurations.len(),
            total_bytes: hinted,
        }));

        let initial_total = configurations.iter().filter_map(|c| c.package_size).sum();
        let mut progress = BatchProgress::new(sink, self.config.progress_interval, initial_total);
        let mut completed = Vec::with_capacity(configurations.len());

        for configuration in configurations {
            if cancel.is_cancelled() {
                return Ok(self.cancelled(completed));
            }

            match self.download_one(configuration, &mut progress, cancel).await {
                Ok(PackageOutcome::Done(package)) => completed.push(package),
                Ok(PackageOutcome::Cancelled) => return Ok(self.cancelled(completed)),
                Err(err) => {
                    let err = transfer_failed(configuration, err);
                    tracing::debug!(version = %configuration.literal_version, error = %err, "package transfer failed");
                    self.emit(AppEvent::Download(DownloadEvent::Failed {
                        url: configuration.update_package_uri.clone(),
                        version: configuration.literal_version.clone(),
                        failure: FailureContext::from_error(&err),
                    }));
                    return Err(err);
                }
            }
        }

        self.emit(AppEvent::Download(DownloadEvent::BatchCompleted {
            packages: completed.len(),
            total_bytes: completed.iter().map(|p| p.size).sum(),
        }));
        Ok(TransferOutcome::Completed(completed))
    }

    async fn download_one(
        &self,
        configuration: &UpdateConfiguration,
        progress: &mut BatchProgress<'_>,
        cancel: &CancellationToken,
    ) -> Result<PackageOutcome, Error> {
        let version = &configuration.literal_version;
        let url = validate_url(&configuration.update_package_uri)?;
        validate_size(configuration.package_size, self.config.max_file_size)?;

        let dest = self.config.staging_dir.join(format!("{version}.zip"));
        let _lock = LockGuard::acquire(dest.with_extension("zip.lock")).await?;

        let body = tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(PackageOutcome::Cancelled),
            body = open_body(&self.client, &url) => body?,
        };
        validate_size(body.content_length, self.config.max_file_size)?;
        if let Some(actual) = body.content_length {
            progress.adjust_total(configuration.package_size, actual);
        }

        self.emit(AppEvent::Download(DownloadEvent::Started {
            url: url.to_string(),
            version: version.clone(),
            total_size: body.content_length.or(configuration.package_size),
        }));

        let part = PartFile::new(dest.with_extension("zip.part"));
        let params = StreamParams {
            version,
            url: &url,
            chunk_timeout: self.config.chunk_timeout,
            max_file_size: self.config.max_file_size,
            cancel,
        };

        match stream_to_file(body, &part, &params, progress).await? {
            StreamOutcome::Cancelled => Ok(PackageOutcome::Cancelled),
            StreamOutcome::Finished { size, blake3 } => {
                if body_length_differs(configuration, size) {
                    tracing::debug!(%version, size, "package size differs from declared size");
                }
                part.persist(&dest).await?;
                progress.finish_file(size);

                self.emit(AppEvent::Download(DownloadEvent::Completed {
                    version: version.clone(),
                    path: dest.clone(),
                    final_size: size,
                    blake3: blake3.clone(),
                }));

                Ok(PackageOutcome::Done(DownloadedPackage {
                    configuration: configuration.clone(),
                    path: dest,
                    size,
                    blake3,
                }))
            }
        }
    }

    fn cancelled(&self, completed: Vec<DownloadedPackage>) -> TransferOutcome {
        self.emit(AppEvent::Download(DownloadEvent::Cancelled {
            completed: completed.len(),
        }));
        TransferOutcome::Cancelled { completed }
    }
}

fn body_length_differs(configuration: &UpdateConfiguration, size: u64) -> bool {
    configuration.package_size.is_some_and(|declared| declared != size)
}

fn transfer_failed(configuration: &UpdateConfiguration, err: Error) -> Error {
    match err {
        Error::Network(NetworkError::TransferFailed { .. }) => err,
        other => NetworkError::TransferFailed {
            version: configuration.literal_version.to_string(),
            message: other.to_string(),
        }
        .into(),
    }
}
