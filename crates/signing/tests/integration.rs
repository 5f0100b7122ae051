//! Integration tests for package validation and signing

#[cfg(test)]
mod tests {
    use tempfile::tempdir;
    use updkit_errors::{Error, SigningError};
    use updkit_signing::*;

    async fn signed_package(
        dir: &std::path::Path,
        content: &[u8],
    ) -> (std::path::PathBuf, String, GeneratedKeyPair) {
        let keys = generate_keypair(None).unwrap();
        let package = dir.join("1.1.0.zip");
        let key_path = dir.join("updkit.key");
        tokio::fs::write(&package, content).await.unwrap();
        tokio::fs::write(&key_path, &keys.secret_key_file)
            .await
            .unwrap();
        let signature = sign_package(&package, &key_path, None).await.unwrap();
        (package, signature, keys)
    }

    #[tokio::test]
    async fn test_valid_signature_accepted() {
        let temp = tempdir().unwrap();
        let (package, signature, keys) = signed_package(temp.path(), b"package bytes").await;

        assert!(validate(&package, &signature, &keys.public_key).await.unwrap());
        assert!(signature.contains("updkit package signature"));
    }

    #[tokio::test]
    async fn test_tampered_package_rejected() {
        let temp = tempdir().unwrap();
        let (package, signature, keys) = signed_package(temp.path(), b"package bytes").await;

        tokio::fs::write(&package, b"package bytez").await.unwrap();
        assert!(!validate(&package, &signature, &keys.public_key).await.unwrap());
    }

    #[tokio::test]
    async fn test_other_key_rejected() {
        let temp = tempdir().unwrap();
        let (package, signature, _) = signed_package(temp.path(), b"package bytes").await;
        let other = generate_keypair(None).unwrap();

        assert!(!validate(&package, &signature, &other.public_key).await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_package() {
        let temp = tempdir().unwrap();
        let keys = generate_keypair(None).unwrap();
        let err = validate(&temp.path().join("missing.zip"), "sig", &keys.public_key)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Signing(SigningError::PackageNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_malformed_inputs() {
        let temp = tempdir().unwrap();
        let (package, signature, keys) = signed_package(temp.path(), b"package bytes").await;

        let err = validate(&package, "not a signature", &keys.public_key)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Signing(SigningError::InvalidSignatureFormat(_))
        ));

        let err = validate(&package, &signature, "%%%").await.unwrap_err();
        assert!(matches!(
            err,
            Error::Signing(SigningError::InvalidPublicKey(_))
        ));
    }

    #[tokio::test]
    async fn test_sign_with_missing_key_file() {
        let temp = tempdir().unwrap();
        let package = temp.path().join("p.zip");
        tokio::fs::write(&package, b"x").await.unwrap();

        let err = sign_package(&package, &temp.path().join("none.key"), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Signing(SigningError::SigningFailed { .. })
        ));
    }

    #[test]
    fn test_sign_bytes_and_validate_bytes() {
        let keys = generate_keypair(None).unwrap();
        let signature = sign_bytes(b"document", &keys.secret_key_file, None, "doc").unwrap();
        let validator = PackageValidator::new(&keys.public_key).unwrap();
        assert!(validator.validate_bytes(b"document", &signature).unwrap());
        assert!(!validator.validate_bytes(b"other", &signature).unwrap());
    }

    #[test]
    fn test_password_protected_key() {
        let keys = generate_keypair(Some("hunter2".to_string())).unwrap();
        let signature = sign_bytes(
            b"document",
            &keys.secret_key_file,
            Some("hunter2".to_string()),
            "doc",
        )
        .unwrap();
        let validator = PackageValidator::new(&keys.public_key).unwrap();
        assert!(validator.validate_bytes(b"document", &signature).unwrap());

        let err = sign_bytes(b"document", &keys.secret_key_file, None, "doc").unwrap_err();
        assert!(matches!(
            err,
            Error::Signing(SigningError::SigningFailed { .. })
        ));
    }
}
