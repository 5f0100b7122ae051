#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Network operations for updkit
//!
//! Fetches the update configuration document, transfers packages into the
//! staging directory and sends download statistics.

mod client;
mod download;
mod progress;
mod statistics;

pub use client::{NetClient, NetConfig};
pub use download::{DownloadedPackage, PackageTransferController, TransferConfig, TransferOutcome};
pub use progress::{NoProgress, ProgressCallback, ProgressSink, TransferProgress};
pub use statistics::{os_name, send_statistics, statistics_url};

use download::validate_url;
use updkit_errors::{Error, NetworkError};
use updkit_events::{EventEmitter, EventSender};
use updkit_types::UpdateConfiguration;
use url::Url;

/// Fetch text content from an http, https or file URL
///
/// # Errors
///
/// Returns an error if the URL is invalid, the request fails, the server
/// returns an error status, or the body cannot be decoded as text.
pub async fn fetch_text(
    client: &NetClient,
    url: &str,
    tx: Option<&EventSender>,
) -> Result<String, Error> {
    let parsed = validate_url(url)?;
    if let Some(tx) = tx {
        tx.emit_debug(format!("Fetching {url}"));
    }

    if parsed.scheme() == "file" {
        let path = parsed
            .to_file_path()
            .map_err(|()| NetworkError::InvalidUrl(url.to_string()))?;
        return tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| Error::io_with_path(&e, &path));
    }

    client
        .get_success(url)
        .await?
        .text()
        .await
        .map_err(|e| NetworkError::DownloadFailed(e.to_string()).into())
}

/// Fetch and parse the update configuration document
///
/// An empty document yields no configurations.
///
/// # Errors
///
/// Returns an error if the document cannot be fetched, or
/// `NetworkError::InvalidConfigurationDocument` if it is not a valid
/// configuration array.
pub async fn fetch_configurations(
    client: &NetClient,
    url: &str,
    tx: Option<&EventSender>,
) -> Result<Vec<UpdateConfiguration>, Error> {
    let document = fetch_text(client, url, tx).await?;
    UpdateConfiguration::parse_document(&document)
}

/// Parse and validate a URL
///
/// # Errors
///
/// Returns an error if the URL string is malformed.
pub fn parse_url(url: &str) -> Result<Url, Error> {
    Url::parse(url).map_err(|e| NetworkError::InvalidUrl(e.to_string()).into())
}
