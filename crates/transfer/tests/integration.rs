//! Integration tests for transfer crate

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::tempdir;
use updkit_errors::{ConfigError, Error, PublishError};
use updkit_transfer::*;

#[tokio::test]
async fn test_local_provider_round_trip() {
    let remote = tempdir().unwrap();
    let scratch = tempdir().unwrap();
    let provider =
        LocalDirectoryProvider::new(ProviderSettings::local(remote.path().join("updates")))
            .unwrap();

    let package = scratch.path().join("package.zip");
    std::fs::write(&package, b"zip bytes").unwrap();

    provider.upload(&package, "1.1.0.zip").await.unwrap();
    provider.upload(&package, "updates.json").await.unwrap();
    assert_eq!(
        provider.list().await.unwrap(),
        vec!["1.1.0.zip".to_string(), "updates.json".to_string()]
    );
    assert!(provider.exists("1.1.0.zip").await.unwrap());

    let fetched = scratch.path().join("fetched.zip");
    provider.download("1.1.0.zip", &fetched).await.unwrap();
    assert_eq!(std::fs::read(&fetched).unwrap(), b"zip bytes");

    provider.delete("1.1.0.zip").await.unwrap();
    assert!(!provider.exists("1.1.0.zip").await.unwrap());
    assert!(matches!(
        provider.delete("1.1.0.zip").await,
        Err(Error::Publish(PublishError::Provider { .. }))
    ));
}

#[tokio::test]
async fn test_upload_replaces_existing_file() {
    let remote = tempdir().unwrap();
    let provider = LocalDirectoryProvider::new(ProviderSettings::local(remote.path())).unwrap();
    let scratch = tempdir().unwrap();
    let document = scratch.path().join("doc.json");

    std::fs::write(&document, b"[]").unwrap();
    provider.upload(&document, "updates.json").await.unwrap();
    std::fs::write(&document, b"[{}]").unwrap();
    provider.upload(&document, "updates.json").await.unwrap();

    assert_eq!(
        std::fs::read(remote.path().join("updates.json")).unwrap(),
        b"[{}]"
    );
    assert_eq!(provider.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_list_of_missing_directory_is_empty() {
    let remote = tempdir().unwrap();
    let provider =
        LocalDirectoryProvider::new(ProviderSettings::local(remote.path().join("absent"))).unwrap();
    assert!(provider.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_rejects_nested_remote_names() {
    let remote = tempdir().unwrap();
    let provider = LocalDirectoryProvider::new(ProviderSettings::local(remote.path())).unwrap();
    assert!(provider.delete("../outside.zip").await.is_err());
}

#[test]
fn test_local_provider_requires_directory() {
    assert!(matches!(
        LocalDirectoryProvider::new(ProviderSettings::default()),
        Err(Error::Config(ConfigError::MissingField { .. }))
    ));
}

#[test]
fn test_registry_lookup() {
    let registry = ProviderRegistry::with_builtin();
    assert!(registry.contains("local"));

    let dir = tempdir().unwrap();
    let provider = registry
        .create("local", ProviderSettings::local(dir.path()))
        .unwrap();
    assert_eq!(provider.name(), "local");
    assert_eq!(provider.settings().directory.as_deref(), Some(dir.path()));

    assert!(matches!(
        registry.create("ftp", ProviderSettings::default()),
        Err(Error::Publish(PublishError::UnknownProvider { .. }))
    ));
}

#[test]
fn test_registered_factory_is_used() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let mut registry = ProviderRegistry::new();
    registry.register("mirror", move |settings| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(LocalDirectoryProvider::new(settings)?) as Box<dyn TransferProvider>)
    });

    let dir = tempdir().unwrap();
    registry
        .create("mirror", ProviderSettings::local(dir.path()))
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(registry.names(), vec!["mirror"]);
}
