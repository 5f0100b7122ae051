#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Minisign package validation and signing
//!
//! Updates are accepted only when the downloaded package verifies against the
//! detached signature published in its configuration record and the public
//! key embedded in the application.

mod signer;

pub use signer::{generate_keypair, sign_bytes, sign_package, GeneratedKeyPair};

use minisign_verify::{PublicKey, Signature};
use std::path::Path;
use updkit_errors::{Error, SigningError};

/// Verifies update packages against one public key
pub struct PackageValidator {
    public_key: PublicKey,
}

impl std::fmt::Debug for PackageValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageValidator").finish_non_exhaustive()
    }
}

impl PackageValidator {
    /// Create a validator for a base64 key or a full minisign public key file
    ///
    /// # Errors
    ///
    /// Returns `SigningError::InvalidPublicKey` if the key cannot be decoded.
    pub fn new(public_key: &str) -> Result<Self, Error> {
        Ok(Self {
            public_key: decode_public_key(public_key)?,
        })
    }

    /// Check `path` against a detached minisign signature
    ///
    /// A signature made by another key or over other content yields `Ok(false)`.
    ///
    /// # Errors
    ///
    /// Returns `SigningError::PackageNotFound` if the file does not exist and
    /// `SigningError::InvalidSignatureFormat` if the signature cannot be parsed.
    pub async fn validate(&self, path: &Path, signature: &str) -> Result<bool, Error> {
        let content = tokio::fs::read(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SigningError::PackageNotFound {
                    path: path.display().to_string(),
                }
                .into()
            } else {
                Error::io_with_path(&e, path)
            }
        })?;
        self.validate_bytes(&content, signature)
    }

    /// Check raw bytes against a detached minisign signature
    ///
    /// # Errors
    ///
    /// Returns `SigningError::InvalidSignatureFormat` if the signature cannot be parsed.
    pub fn validate_bytes(&self, content: &[u8], signature: &str) -> Result<bool, Error> {
        let signature = Signature::decode(signature.trim())
            .map_err(|e| SigningError::InvalidSignatureFormat(e.to_string()))?;

        match self.public_key.verify(content, &signature, false) {
            Ok(()) => Ok(true),
            Err(e) => {
                tracing::debug!(error = %e, "signature did not verify");
                Ok(false)
            }
        }
    }
}

/// Validate a package file in one call
///
/// # Errors
///
/// See [`PackageValidator::new`] and [`PackageValidator::validate`].
pub async fn validate(path: &Path, signature: &str, public_key: &str) -> Result<bool, Error> {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Err(SigningError::PackageNotFound {
            path: path.display().to_string(),
        }
        .into());
    }
    PackageValidator::new(public_key)?
        .validate(path, signature)
        .await
}

fn decode_public_key(public_key: &str) -> Result<PublicKey, Error> {
    let trimmed = public_key.trim();
    let decoded = if trimmed.contains('\n') {
        PublicKey::decode(trimmed)
    } else {
        PublicKey::from_base64(trimmed)
    };
    decoded.map_err(|e| SigningError::InvalidPublicKey(e.to_string()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_garbage_key_rejected() {
        let err = PackageValidator::new("definitely not a key").unwrap_err();
        assert!(matches!(
            err,
            Error::Signing(SigningError::InvalidPublicKey(_))
        ));
    }

    #[test]
    fn test_garbage_signature_rejected() {
        let keys = generate_keypair(None).unwrap();
        let validator = PackageValidator::new(&keys.public_key).unwrap();
        let err = validator.validate_bytes(b"data", "nonsense").unwrap_err();
        assert!(matches!(
            err,
            Error::Signing(SigningError::InvalidSignatureFormat(_))
        ));
    }

    #[test]
    fn test_public_key_file_form_accepted() {
        let keys = generate_keypair(None).unwrap();
        assert!(PackageValidator::new(&keys.public_key_file).is_ok());
    }
}
