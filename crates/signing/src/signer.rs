//! Publisher-side signing with Minisign

use minisign::{sign, KeyPair, SecretKeyBox};
use std::io::Cursor;
use std::path::Path;
use tokio::fs;
use updkit_errors::{Error, SigningError};

const TRUSTED_COMMENT: &str = "updkit package signature";

/// Freshly generated key material in text form
#[derive(Debug, Clone)]
pub struct GeneratedKeyPair {
    /// Base64 public key, the form embedded in applications
    pub public_key: String,
    /// Public key file contents (comment line plus key)
    pub public_key_file: String,
    /// Secret key file contents, encrypted with the generation password
    pub secret_key_file: String,
}

/// Generate a minisign key pair
///
/// The secret key is always stored in minisign's encrypted form; `None`
/// stands for the empty password so the key can be loaded without a
/// terminal prompt.
///
/// # Errors
///
/// Returns an error if key generation or serialization fails.
pub fn generate_keypair(password: Option<String>) -> Result<GeneratedKeyPair, Error> {
    let KeyPair { pk, sk } =
        KeyPair::generate_encrypted_keypair(Some(password.unwrap_or_default()))
            .map_err(signing_failed)?;

    let secret_key_file = sk.to_box(None).map_err(signing_failed)?.to_string();
    let public_key_file = pk.to_box().map_err(signing_failed)?.to_string();

    Ok(GeneratedKeyPair {
        public_key: pk.to_base64(),
        public_key_file,
        secret_key_file,
    })
}

/// Sign bytes with a secret key file's contents, returning the signature text
///
/// `None` is treated as the empty password; minisign never prompts.
///
/// # Errors
///
/// Returns `SigningError::SigningFailed` if the key cannot be parsed or
/// decrypted, or signing fails.
pub fn sign_bytes(
    content: &[u8],
    secret_key_file: &str,
    password: Option<String>,
    untrusted_comment: &str,
) -> Result<String, Error> {
    let secret_key = SecretKeyBox::from_string(secret_key_file)
        .map_err(signing_failed)?
        .into_secret_key(Some(password.unwrap_or_default()))
        .map_err(signing_failed)?;

    let signature = sign(
        None,
        &secret_key,
        Cursor::new(content),
        Some(TRUSTED_COMMENT),
        Some(untrusted_comment),
    )
    .map_err(signing_failed)?;

    Ok(signature.into_string())
}

/// Sign a package file with the secret key stored at `secret_key_path`
///
/// # Errors
///
/// Returns `SigningError::PackageNotFound` when the package is missing and
/// `SigningError::SigningFailed` when the key cannot be read or used.
pub async fn sign_package(
    package_path: &Path,
    secret_key_path: &Path,
    password: Option<String>,
) -> Result<String, Error> {
    let content = fs::read(package_path)
        .await
        .map_err(|_| SigningError::PackageNotFound {
            path: package_path.display().to_string(),
        })?;

    let key_file = fs::read_to_string(secret_key_path)
        .await
        .map_err(|e| SigningError::SigningFailed {
            message: format!(
                "failed to read secret key {}: {e}",
                secret_key_path.display()
            ),
        })?;

    let untrusted_comment = format!(
        "signature for {}",
        package_path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
    );

    sign_bytes(&content, &key_file, password, &untrusted_comment)
}

fn signing_failed(err: impl std::fmt::Display) -> Error {
    SigningError::SigningFailed {
        message: err.to_string(),
    }
    .into()
}
