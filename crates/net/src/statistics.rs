//! Download statistics ping

use crate::client::NetClient;
use crate::parse_url;
use updkit_errors::Error;
use updkit_types::UpdateConfiguration;

/// Operating system name sent with statistics pings
#[must_use]
pub fn os_name() -> String {
    format!("{} {}", std::env::consts::OS, std::env::consts::ARCH)
}

/// Build the statistics URL `<endpoint>?versionid=<id>&os=<os>`
///
/// # Errors
///
/// Returns `NetworkError::InvalidUrl` if `endpoint` is not a valid URL.
pub fn statistics_url(endpoint: &str, version_id: u32, os: &str) -> Result<url::Url, Error> {
    let mut url = parse_url(endpoint)?;
    url.query_pairs_mut()
        .append_pair("versionid", &version_id.to_string())
        .append_pair("os", os);
    Ok(url)
}

/// Report a completed download to the configuration's statistics endpoint
///
/// Returns `Ok(false)` without a request when the configuration has
/// statistics disabled or no endpoint.
///
/// # Errors
///
/// Returns an error if the endpoint is invalid or answers with a failure
/// status. Callers treat this as best effort.
pub async fn send_statistics(
    client: &NetClient,
    configuration: &UpdateConfiguration,
    os: &str,
) -> Result<bool, Error> {
    let Some(endpoint) = configuration
        .update_php_file_uri
        .as_deref()
        .filter(|_| configuration.use_statistics)
    else {
        return Ok(false);
    };

    let url = statistics_url(endpoint, configuration.version_id, os)?;
    tracing::debug!(%url, "sending statistics");
    client.get_success(url.as_str()).await?;
    Ok(true)
}
