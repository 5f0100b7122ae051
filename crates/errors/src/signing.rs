//! Signing error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SigningError {
    #[error("package not found: {path}")]
    PackageNotFound { path: String },

    #[error("signature verification failed: {reason}")]
    VerificationFailed { reason: String },

    #[error("invalid signature format: {0}")]
    InvalidSignatureFormat(String),

    #[error("invalid public key format: {0}")]
    InvalidPublicKey(String),

    #[error("signing failed: {message}")]
    SigningFailed { message: String },
}

impl UserFacingError for SigningError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::PackageNotFound { .. } => Some("Download the update package again."),
            Self::InvalidSignatureFormat(_) => {
                Some("The published signature is malformed; republish the package.")
            }
            Self::InvalidPublicKey(_) => {
                Some("Embed the base64 minisign public key that was used to sign packages.")
            }
            Self::VerificationFailed { .. } => {
                Some("The package may have been tampered with; do not install it.")
            }
            Self::SigningFailed { .. } => Some("Check the secret key path and password."),
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::PackageNotFound { .. } => "signing.package_not_found",
            Self::VerificationFailed { .. } => "signing.verification_failed",
            Self::InvalidSignatureFormat(_) => "signing.invalid_signature",
            Self::InvalidPublicKey(_) => "signing.invalid_public_key",
            Self::SigningFailed { .. } => "signing.signing_failed",
        };
        Some(code)
    }
}
