//! URL validation and HTTP response validation for downloads

use updkit_errors::{Error, NetworkError};
use url::Url;

/// Validate URL and check for supported protocols
pub(crate) fn validate_url(url: &str) -> Result<Url, Error> {
    let parsed = Url::parse(url).map_err(|e| NetworkError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" | "file" => Ok(parsed),
        scheme => Err(NetworkError::UnsupportedProtocol {
            protocol: scheme.to_string(),
        }
        .into()),
    }
}

/// Reject declared sizes above the configured limit
pub(super) fn validate_size(size: Option<u64>, limit: u64) -> Result<(), Error> {
    match size {
        Some(size) if size > limit => Err(NetworkError::FileSizeExceeded { size, limit }.into()),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_schemes() {
        assert!(validate_url("https://example.com/p.zip").is_ok());
        assert!(validate_url("file:///tmp/p.zip").is_ok());
        assert!(matches!(
            validate_url("ftp://example.com/p.zip"),
            Err(Error::Network(NetworkError::UnsupportedProtocol { .. }))
        ));
        assert!(matches!(
            validate_url("not a url"),
            Err(Error::Network(NetworkError::InvalidUrl(_)))
        ));
    }

    #[test]
    fn test_size_limit() {
        assert!(validate_size(None, 10).is_ok());
        assert!(validate_size(Some(10), 10).is_ok());
        assert!(validate_size(Some(11), 10).is_err());
    }
}
