//! Integration tests for ops crate

use async_trait::async_trait;
use httpmock::prelude::*;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::{tempdir, TempDir};
use updkit_errors::{Error, PublishError, SigningError};
use updkit_events::{channel, AppEvent, PublishEvent};
use updkit_install::{FileRegistryStore, InstallerConfig, LockRetry};
use updkit_net::{NetConfig, NoProgress, TransferConfig};
use updkit_ops::*;
use updkit_resolver::{HostInfo, ResolveOptions};
use updkit_signing::{generate_keypair, sign_package, PackageValidator};
use updkit_transfer::{LocalDirectoryProvider, ProviderSettings, TransferProvider};
use updkit_types::{Operation, OperationArea, OperationMethod, UpdateConfiguration, UpdateVersion};
use zip::write::SimpleFileOptions;

struct Keys {
    public_key: String,
    secret_key: PathBuf,
}

fn write_keys(dir: &Path) -> Keys {
    let keys = generate_keypair(None).unwrap();
    let secret_key = dir.join("updkit.key");
    std::fs::write(&secret_key, &keys.secret_key_file).unwrap();
    Keys {
        public_key: keys.public_key,
        secret_key,
    }
}

fn build_package(path: &Path, entries: &[(&str, &[u8])]) {
    let file = std::fs::File::create(path).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    for (name, content) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap();
}

fn copy_app_operation() -> Operation {
    Operation::new(
        OperationArea::Files,
        OperationMethod::Create,
        "%program%",
        vec!["app.bin".to_string()],
    )
}

fn session_config(root: &TempDir, configuration_uri: String, public_key: &str) -> SessionConfig {
    SessionConfig {
        configuration_uri,
        current_version: UpdateVersion::parse("1.0.0").unwrap(),
        resolve: ResolveOptions {
            os_is_64bit: true,
            ..ResolveOptions::default()
        },
        host: HostInfo::default(),
        public_key: Some(public_key.to_string()),
        verify_signatures: true,
        statistics: false,
        net: NetConfig {
            retry_count: 0,
            ..NetConfig::default()
        },
        transfer: TransferConfig {
            progress_interval: Duration::ZERO,
            ..TransferConfig::new(root.path().join("staging"))
        },
        installer: InstallerConfig {
            work_dir: root.path().join("work"),
            program_dir: root.path().join("program"),
            lock_retry: LockRetry::default(),
        },
    }
}

fn registry(root: &TempDir) -> Arc<FileRegistryStore> {
    Arc::new(FileRegistryStore::new(root.path().join("registry.json")))
}

/// Serve a signed package for 1.1.0 and a document announcing it
async fn serve_release(server: &MockServer, root: &TempDir, keys: &Keys, tamper: bool) {
    let package = root.path().join("release-1.1.0.zip");
    build_package(&package, &[("app.bin", b"version 1.1.0")]);
    let signature = sign_package(&package, &keys.secret_key, None).await.unwrap();
    if tamper {
        build_package(&package, &[("app.bin", b"something else")]);
    }
    let body = std::fs::read(&package).unwrap();

    let mut configuration = UpdateConfiguration::new(
        UpdateVersion::parse("1.1.0").unwrap(),
        server.url("/packages/1.1.0.zip"),
    );
    configuration.signature = signature;
    configuration.package_size = Some(body.len() as u64);
    configuration.operations = vec![copy_app_operation()];
    let document = UpdateConfiguration::to_document(&[configuration]).unwrap();

    server
        .mock_async(|when, then| {
            when.method(GET).path("/updates.json");
            then.status(200).body(document);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/packages/1.1.0.zip");
            then.status(200).body(body);
        })
        .await;
}

#[tokio::test]
async fn test_session_installs_signed_update() {
    let root = tempdir().unwrap();
    let keys = write_keys(root.path());
    let server = MockServer::start_async().await;
    serve_release(&server, &root, &keys, false).await;

    let (tx, _rx) = channel();
    let mut session = UpdateSession::new(
        session_config(&root, server.url("/updates.json"), &keys.public_key),
        registry(&root),
        Some(tx),
    )
    .unwrap();

    let outcome = session.run(&NoProgress).await.unwrap();
    assert_eq!(
        outcome,
        SessionOutcome::Installed {
            versions: vec![UpdateVersion::parse("1.1.0").unwrap()]
        }
    );
    assert_eq!(
        std::fs::read(root.path().join("program").join("app.bin")).unwrap(),
        b"version 1.1.0"
    );
    assert!(!root.path().join("work").join("1.1.0").exists());
    assert_eq!(session.downloaded().len(), 1);
}

#[tokio::test]
async fn test_tampered_package_is_not_installed() {
    let root = tempdir().unwrap();
    let keys = write_keys(root.path());
    let server = MockServer::start_async().await;
    serve_release(&server, &root, &keys, true).await;

    let mut session = UpdateSession::new(
        session_config(&root, server.url("/updates.json"), &keys.public_key),
        registry(&root),
        None,
    )
    .unwrap();

    let err = session.run(&NoProgress).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Signing(SigningError::VerificationFailed { .. })
    ));
    assert!(!root.path().join("program").join("app.bin").exists());
}

#[tokio::test]
async fn test_session_up_to_date() {
    let root = tempdir().unwrap();
    let server = MockServer::start_async().await;
    let document = UpdateConfiguration::to_document(&[UpdateConfiguration::new(
        UpdateVersion::parse("1.0.0").unwrap(),
        server.url("/packages/1.0.0.zip"),
    )])
    .unwrap();
    server
        .mock_async(|when, then| {
            when.method(GET).path("/updates.json");
            then.status(200).body(document);
        })
        .await;

    let mut session = UpdateSession::new(
        session_config(&root, server.url("/updates.json"), "unused"),
        registry(&root),
        None,
    )
    .unwrap();

    assert_eq!(session.run(&NoProgress).await.unwrap(), SessionOutcome::UpToDate);
    assert!(session.result().is_some_and(|r| !r.updates_found));
}

#[tokio::test]
async fn test_download_requires_search() {
    let root = tempdir().unwrap();
    let mut session = UpdateSession::new(
        session_config(&root, "http://127.0.0.1:1/updates.json".into(), "unused"),
        registry(&root),
        None,
    )
    .unwrap();
    assert!(session.download(&NoProgress).await.is_err());
}

fn publisher_config(keys: &Keys) -> PublisherConfig {
    PublisherConfig {
        document_name: "updates.json".to_string(),
        base_uri: Some("https://updates.example.com/app/".to_string()),
        secret_key: Some(keys.secret_key.clone()),
        password: None,
        history: None,
    }
}

fn request(package: &Path, version: &str) -> PublishRequest {
    PublishRequest {
        package: package.to_path_buf(),
        configuration: UpdateConfiguration::new(UpdateVersion::parse(version).unwrap(), ""),
    }
}

#[tokio::test]
async fn test_publish_and_remove_with_local_provider() {
    let root = tempdir().unwrap();
    let keys = write_keys(root.path());
    let remote = root.path().join("remote");
    let package = root.path().join("build.zip");
    build_package(&package, &[("app.bin", b"release")]);

    let provider = Arc::new(LocalDirectoryProvider::new(ProviderSettings::local(&remote)).unwrap());
    let publisher = Publisher::new(provider, publisher_config(&keys), None);

    let published = publisher.publish(request(&package, "1.1.0")).await.unwrap();
    assert_eq!(
        published.update_package_uri,
        "https://updates.example.com/app/1.1.0.zip"
    );
    assert_eq!(
        published.package_size,
        Some(std::fs::metadata(&package).unwrap().len())
    );
    let validator = PackageValidator::new(&keys.public_key).unwrap();
    assert!(validator
        .validate(&remote.join("1.1.0.zip"), &published.signature)
        .await
        .unwrap());

    let listed = publisher.published().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].literal_version, published.literal_version);
    assert_eq!(listed[0].signature, published.signature);

    let err = publisher
        .publish(request(&package, "1.1.0"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Publish(PublishError::AlreadyPublished { .. })
    ));

    let version = UpdateVersion::parse("1.1.0").unwrap();
    publisher.remove(&version).await.unwrap();
    assert!(!remote.join("1.1.0.zip").exists());
    assert!(publisher.published().await.unwrap().is_empty());

    let err = publisher.remove(&version).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Publish(PublishError::NotPublished { .. })
    ));
}

/// Local provider that refuses to store one file and can fail lookups of another
#[derive(Debug)]
struct RefusingProvider {
    inner: LocalDirectoryProvider,
    refused: &'static str,
    failing_lookup: Option<&'static str>,
}

impl RefusingProvider {
    fn new(remote: &Path, refused: &'static str) -> Self {
        Self {
            inner: LocalDirectoryProvider::new(ProviderSettings::local(remote)).unwrap(),
            refused,
            failing_lookup: None,
        }
    }
}

#[async_trait]
impl TransferProvider for RefusingProvider {
    fn name(&self) -> &str {
        "refusing"
    }

    fn settings(&self) -> &ProviderSettings {
        self.inner.settings()
    }

    async fn upload(&self, local: &Path, remote_name: &str) -> Result<(), Error> {
        if remote_name == self.refused {
            return Err(PublishError::Provider {
                message: "disk quota exceeded".to_string(),
            }
            .into());
        }
        self.inner.upload(local, remote_name).await
    }

    async fn download(&self, remote_name: &str, local: &Path) -> Result<(), Error> {
        self.inner.download(remote_name, local).await
    }

    async fn delete(&self, remote_name: &str) -> Result<(), Error> {
        self.inner.delete(remote_name).await
    }

    async fn list(&self) -> Result<Vec<String>, Error> {
        self.inner.list().await
    }

    async fn exists(&self, remote_name: &str) -> Result<bool, Error> {
        if self.failing_lookup == Some(remote_name) {
            return Err(PublishError::Provider {
                message: "connection reset".to_string(),
            }
            .into());
        }
        self.inner.exists(remote_name).await
    }
}

#[tokio::test]
async fn test_failed_document_upload_rolls_back_package() {
    let root = tempdir().unwrap();
    let keys = write_keys(root.path());
    let remote = root.path().join("remote");
    let package = root.path().join("build.zip");
    build_package(&package, &[("app.bin", b"release")]);

    let provider = Arc::new(RefusingProvider::new(&remote, "updates.json"));
    let history = root.path().join("history.json");
    let config = PublisherConfig {
        history: Some(history.clone()),
        ..publisher_config(&keys)
    };
    let (tx, mut rx) = channel();
    let publisher = Publisher::new(provider, config, Some(tx));

    let err = publisher
        .publish(request(&package, "2.0.0"))
        .await
        .unwrap_err();
    match err {
        Error::Publish(PublishError::StepFailed { step, message }) => {
            assert_eq!(step, "upload_document");
            assert!(message.contains("disk quota exceeded"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!remote.join("2.0.0.zip").exists());
    assert!(!history.exists());

    let mut rollback_started = false;
    let mut rollback_clean = false;
    while let Ok(message) = rx.try_recv() {
        match message.event {
            AppEvent::Publish(PublishEvent::RollbackStarted { steps }) => {
                rollback_started = steps == 1;
            }
            AppEvent::Publish(PublishEvent::RollbackCompleted { undone, failed }) => {
                rollback_clean = undone == 1 && failed.is_empty();
            }
            _ => {}
        }
    }
    assert!(rollback_started);
    assert!(rollback_clean);
}

#[tokio::test]
async fn test_missing_base_uri_and_package_uri_is_rejected() {
    let root = tempdir().unwrap();
    let keys = write_keys(root.path());
    let package = root.path().join("build.zip");
    build_package(&package, &[("app.bin", b"release")]);

    let provider = Arc::new(
        LocalDirectoryProvider::new(ProviderSettings::local(root.path().join("remote"))).unwrap(),
    );
    let config = PublisherConfig {
        base_uri: None,
        ..publisher_config(&keys)
    };
    let publisher = Publisher::new(provider, config, None);
    assert!(publisher.publish(request(&package, "1.0.1")).await.is_err());
}

#[tokio::test]
async fn test_caller_package_uri_names_remote_file() {
    let root = tempdir().unwrap();
    let keys = write_keys(root.path());
    let remote = root.path().join("remote");
    let package = root.path().join("build.zip");
    build_package(&package, &[("app.bin", b"release")]);

    let provider = Arc::new(LocalDirectoryProvider::new(ProviderSettings::local(&remote)).unwrap());
    let config = PublisherConfig {
        base_uri: None,
        ..publisher_config(&keys)
    };
    let publisher = Publisher::new(provider, config, None);

    let mut request = request(&package, "1.1.0");
    request.configuration.update_package_uri = "https://cdn.example.com/app/package.zip".to_string();
    let published = publisher.publish(request).await.unwrap();

    assert_eq!(
        published.update_package_uri,
        "https://cdn.example.com/app/package.zip"
    );
    assert_eq!(
        publisher.provider().list().await.unwrap(),
        vec!["package.zip".to_string(), "updates.json".to_string()]
    );

    publisher
        .remove(&UpdateVersion::parse("1.1.0").unwrap())
        .await
        .unwrap();
    assert_eq!(
        publisher.provider().list().await.unwrap(),
        vec!["updates.json".to_string()]
    );
}

#[tokio::test]
async fn test_failed_package_lookup_restores_document() {
    let root = tempdir().unwrap();
    let keys = write_keys(root.path());
    let remote = root.path().join("remote");
    let package = root.path().join("build.zip");
    build_package(&package, &[("app.bin", b"release")]);

    let local = Arc::new(LocalDirectoryProvider::new(ProviderSettings::local(&remote)).unwrap());
    Publisher::new(local, publisher_config(&keys), None)
        .publish(request(&package, "1.1.0"))
        .await
        .unwrap();

    let flaky = Arc::new(RefusingProvider {
        failing_lookup: Some("1.1.0.zip"),
        ..RefusingProvider::new(&remote, "")
    });
    let publisher = Publisher::new(flaky, publisher_config(&keys), None);

    let err = publisher
        .remove(&UpdateVersion::parse("1.1.0").unwrap())
        .await
        .unwrap_err();
    match err {
        Error::Publish(PublishError::StepFailed { step, .. }) => assert_eq!(step, "check_package"),
        other => panic!("unexpected error: {other:?}"),
    }

    let listed = publisher.published().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].literal_version.to_string(), "1.1.0");
    assert!(remote.join("1.1.0.zip").exists());
}

#[tokio::test]
async fn test_publish_and_remove_are_recorded_in_history() {
    let root = tempdir().unwrap();
    let keys = write_keys(root.path());
    let package = root.path().join("build.zip");
    build_package(&package, &[("app.bin", b"release")]);

    let provider = Arc::new(
        LocalDirectoryProvider::new(ProviderSettings::local(root.path().join("remote"))).unwrap(),
    );
    let config = PublisherConfig {
        history: Some(root.path().join("data").join("history.json")),
        ..publisher_config(&keys)
    };
    let publisher = Publisher::new(provider, config, None);
    let version = UpdateVersion::parse("1.1.0").unwrap();

    publisher.publish(request(&package, "1.1.0")).await.unwrap();
    publisher.remove(&version).await.unwrap();
    assert!(publisher.remove(&version).await.is_err());

    let entries = publisher.history().unwrap().entries().await.unwrap();
    assert_eq!(
        entries
            .iter()
            .map(|e| (e.action, e.version.to_string()))
            .collect::<Vec<_>>(),
        vec![
            (HistoryAction::Upload, "1.1.0".to_string()),
            (HistoryAction::Delete, "1.1.0".to_string()),
        ]
    );
}
