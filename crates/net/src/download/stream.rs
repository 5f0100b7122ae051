//! Low-level streaming download mechanics

use super::validation::validate_size;
use crate::client::NetClient;
use crate::progress::{percentage, ProgressSink, ProgressThrottle, TransferProgress};
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;
use updkit_errors::{Error, NetworkError};
use updkit_types::UpdateVersion;
use url::Url;

/// RAII guard for the download lock file
pub(super) struct LockGuard {
    path: PathBuf,
    _file: File,
}

impl LockGuard {
    pub(super) async fn acquire(lock_path: PathBuf) -> Result<Self, Error> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::AlreadyExists {
                    NetworkError::DownloadFailed(format!(
                        "{} is already being downloaded by another process",
                        lock_path.display()
                    ))
                } else {
                    NetworkError::DownloadFailed(format!(
                        "failed to create lock file {}: {e}",
                        lock_path.display()
                    ))
                }
            })?;

        Ok(Self {
            path: lock_path,
            _file: file,
        })
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Partially written package, removed on drop unless persisted
pub(super) struct PartFile {
    path: PathBuf,
    persisted: bool,
}

impl PartFile {
    pub(super) fn new(path: PathBuf) -> Self {
        Self {
            path,
            persisted: false,
        }
    }

    pub(super) fn path(&self) -> &Path {
        &self.path
    }

    /// Move the finished file to `dest`
    pub(super) async fn persist(mut self, dest: &Path) -> Result<(), Error> {
        tokio::fs::rename(&self.path, dest)
            .await
            .map_err(|e| Error::io_with_path(&e, dest))?;
        self.persisted = true;
        Ok(())
    }
}

impl Drop for PartFile {
    fn drop(&mut self) {
        if !self.persisted {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Response body of a package, from HTTP or a local mirror
pub(super) struct PackageBody {
    pub(super) content_length: Option<u64>,
    pub(super) chunks: BoxStream<'static, Result<Bytes, Error>>,
}

/// Open the package at `url` for streaming
pub(super) async fn open_body(client: &NetClient, url: &Url) -> Result<PackageBody, Error> {
    if url.scheme() == "file" {
        let path = url
            .to_file_path()
            .map_err(|()| NetworkError::InvalidUrl(url.to_string()))?;
        let file = File::open(&path)
            .await
            .map_err(|e| Error::io_with_path(&e, &path))?;
        let content_length = file.metadata().await.ok().map(|m| m.len());
        let chunks = ReaderStream::new(file).map(|chunk| chunk.map_err(Error::from));
        return Ok(PackageBody {
            content_length,
            chunks: chunks.boxed(),
        });
    }

    let response = client.get_success(url.as_str()).await?;
    let content_length = response.content_length();
    let chunks = response
        .bytes_stream()
        .map(|chunk| chunk.map_err(|e| NetworkError::DownloadFailed(e.to_string()).into()));
    Ok(PackageBody {
        content_length,
        chunks: chunks.boxed(),
    })
}

/// Batch-wide progress accounting
pub(super) struct BatchProgress<'a> {
    sink: &'a dyn ProgressSink,
    throttle: ProgressThrottle,
    completed_bytes: u64,
    total_bytes: u64,
}

impl<'a> BatchProgress<'a> {
    pub(super) fn new(sink: &'a dyn ProgressSink, interval: Duration, total_bytes: u64) -> Self {
        Self {
            sink,
            throttle: ProgressThrottle::new(interval),
            completed_bytes: 0,
            total_bytes,
        }
    }

    /// Replace a package's size hint with its actual length
    pub(super) fn adjust_total(&mut self, hint: Option<u64>, actual: u64) {
        self.total_bytes = self
            .total_bytes
            .saturating_sub(hint.unwrap_or(0))
            .saturating_add(actual);
    }

    pub(super) fn finish_file(&mut self, size: u64) {
        self.completed_bytes += size;
    }

    pub(super) fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    fn report(&mut self, version: &UpdateVersion, file_bytes: u64, force: bool) {
        let bytes_received = self.completed_bytes + file_bytes;
        let total_bytes = self.total_bytes.max(bytes_received);
        if let Some(bytes_per_second) = self.throttle.tick(bytes_received, force) {
            self.sink.report(&TransferProgress {
                version: version.clone(),
                bytes_received,
                total_bytes,
                percentage: percentage(bytes_received, total_bytes),
                bytes_per_second,
            });
        }
    }
}

/// What became of a streamed file
pub(super) enum StreamOutcome {
    Finished { size: u64, blake3: String },
    Cancelled,
}

pub(super) struct StreamParams<'a> {
    pub(super) version: &'a UpdateVersion,
    pub(super) url: &'a Url,
    pub(super) chunk_timeout: Duration,
    pub(super) max_file_size: u64,
    pub(super) cancel: &'a CancellationToken,
}

/// Write `body` to `part`, hashing and reporting as chunks arrive
pub(super) async fn stream_to_file(
    mut body: PackageBody,
    part: &PartFile,
    params: &StreamParams<'_>,
    progress: &mut BatchProgress<'_>,
) -> Result<StreamOutcome, Error> {
    let mut file = File::create(part.path())
        .await
        .map_err(|e| Error::io_with_path(&e, part.path()))?;
    let mut hasher = blake3::Hasher::new();
    let mut written: u64 = 0;

    loop {
        let next = tokio::select! {
            biased;
            () = params.cancel.cancelled() => return Ok(StreamOutcome::Cancelled),
            next = tokio::time::timeout(params.chunk_timeout, body.chunks.next()) => {
                next.map_err(|_| NetworkError::Timeout {
                    url: params.url.to_string(),
                })?
            }
        };

        let Some(chunk) = next else { break };
        let chunk = chunk?;

        written += chunk.len() as u64;
        validate_size(Some(written), params.max_file_size)?;

        hasher.update(&chunk);
        file.write_all(&chunk).await?;
        progress.report(params.version, written, false);

        if params.cancel.is_cancelled() {
            return Ok(StreamOutcome::Cancelled);
        }
    }

    file.flush().await?;
    drop(file);

    if params.cancel.is_cancelled() {
        return Ok(StreamOutcome::Cancelled);
    }

    progress.report(params.version, written, true);

    Ok(StreamOutcome::Finished {
        size: written,
        blake3: hasher.finalize().to_hex().to_string(),
    })
}
