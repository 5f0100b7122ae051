//! Integration tests for install crate

use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;
use updkit_errors::{Error, InstallError};
use updkit_events::{channel, AppEvent, InstallEvent};
use updkit_install::*;
use updkit_types::{Operation, OperationArea, OperationMethod, UpdateVersion};
use zip::write::SimpleFileOptions;

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

fn op(area: OperationArea, method: OperationMethod, target: &str, args: &[&str]) -> Operation {
    Operation::new(
        area,
        method,
        target,
        args.iter().map(ToString::to_string).collect(),
    )
}

fn context(payload: &Path, program: &Path, registry: &Path) -> OperationContext {
    OperationContext::new(
        payload,
        PathPlaceholders::empty().with("program", program),
        Arc::new(FileRegistryStore::new(registry)),
    )
}

#[tokio::test]
async fn test_extract_and_copy_payload() {
    let dir = tempdir().unwrap();
    let package = dir.path().join("1.1.0.zip");
    build_package(
        &package,
        &[
            ("app.bin", b"new binary"),
            ("plugins/a.so", b"plugin a"),
            ("plugins/nested/b.so", b"plugin b"),
        ],
    );

    let payload = dir.path().join("work");
    assert_eq!(extract_package(&package, &payload).await.unwrap(), 3);

    let program = dir.path().join("program");
    let mut executor = OperationExecutor::new(
        context(&payload, &program, &dir.path().join("registry.json")),
        None,
    );
    let report = executor
        .execute(
            &[op(
                OperationArea::Files,
                OperationMethod::Create,
                "%program%",
                &["app.bin", "plugins"],
            )],
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.completed, vec![0]);
    assert_eq!(*executor.state(), ExecutionState::Succeeded);
    assert_eq!(std::fs::read(program.join("app.bin")).unwrap(), b"new binary");
    assert_eq!(
        std::fs::read(program.join("plugins").join("nested").join("b.so")).unwrap(),
        b"plugin b"
    );
}

#[tokio::test]
async fn test_failure_reports_index_and_keeps_earlier_work() {
    let dir = tempdir().unwrap();
    let payload = dir.path().join("payload");
    std::fs::create_dir_all(&payload).unwrap();
    std::fs::write(payload.join("FileA"), b"a").unwrap();
    let program = dir.path().join("program");

    let (tx, mut rx) = channel();
    let mut executor = OperationExecutor::new(
        context(&payload, &program, &dir.path().join("registry.json")),
        Some(tx),
    );
    let operations = vec![
        op(OperationArea::Files, OperationMethod::Create, "%program%", &["FileA"]),
        op(OperationArea::Files, OperationMethod::Create, "%program%", &["FileB"]),
        op(OperationArea::Files, OperationMethod::Create, "%program%", &["FileA"]),
    ];

    let err = executor
        .execute(&operations, &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        Error::Install(InstallError::OperationFailed { index, area, method, .. }) => {
            assert_eq!(index, 1);
            assert_eq!(area, "Files");
            assert_eq!(method, "Create");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(matches!(executor.state(), ExecutionState::Failed { index: 1, .. }));
    assert!(program.join("FileA").exists());

    let mut started = Vec::new();
    let mut failed = None;
    while let Ok(message) = rx.try_recv() {
        match message.event {
            AppEvent::Install(InstallEvent::OperationStarted { index, .. }) => started.push(index),
            AppEvent::Install(InstallEvent::OperationFailed { index, .. }) => failed = Some(index),
            _ => {}
        }
    }
    assert_eq!(started, vec![0, 1]);
    assert_eq!(failed, Some(1));
}

#[tokio::test]
async fn test_unsupported_pair_runs_nothing() {
    let dir = tempdir().unwrap();
    let program = dir.path().join("program");
    std::fs::create_dir_all(&program).unwrap();
    std::fs::write(program.join("old.txt"), b"old").unwrap();

    let mut executor = OperationExecutor::new(
        context(dir.path(), &program, &dir.path().join("registry.json")),
        None,
    );
    let operations = vec![
        op(OperationArea::Files, OperationMethod::Delete, "%program%", &["old.txt"]),
        op(OperationArea::Files, OperationMethod::SetValue, "%program%", &["x=y"]),
    ];

    let err = executor
        .execute(&operations, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Install(InstallError::UnsupportedOperation { .. })
    ));
    assert!(program.join("old.txt").exists());
}

#[tokio::test]
async fn test_delete_and_rename() {
    let dir = tempdir().unwrap();
    let program = dir.path().join("program");
    std::fs::create_dir_all(program.join("cache")).unwrap();
    std::fs::write(program.join("cache").join("x"), b"x").unwrap();
    std::fs::write(program.join("stale.log"), b"log").unwrap();
    std::fs::write(program.join("app.new"), b"app").unwrap();

    let mut executor = OperationExecutor::new(
        context(dir.path(), &program, &dir.path().join("registry.json")),
        None,
    );
    let operations = vec![
        op(
            OperationArea::Files,
            OperationMethod::Delete,
            "%program%",
            &["stale.log", "cache", "never-existed"],
        ),
        op(
            OperationArea::Files,
            OperationMethod::Rename,
            "%program%/app.new",
            &["app"],
        ),
    ];

    let report = executor
        .execute(&operations, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.completed, vec![0, 1]);
    assert!(!program.join("stale.log").exists());
    assert!(!program.join("cache").exists());
    assert_eq!(std::fs::read(program.join("app")).unwrap(), b"app");
    assert!(!program.join("app.new").exists());
}

#[tokio::test]
async fn test_rename_requires_single_name() {
    let dir = tempdir().unwrap();
    let mut executor = OperationExecutor::new(
        context(dir.path(), dir.path(), &dir.path().join("registry.json")),
        None,
    );
    let err = executor
        .execute(
            &[op(OperationArea::Files, OperationMethod::Rename, "%program%/a", &[])],
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Install(InstallError::OperationFailed { index: 0, .. })
    ));
}

#[tokio::test]
async fn test_registry_operations() {
    let dir = tempdir().unwrap();
    let registry_path = dir.path().join("registry.json");
    let mut executor =
        OperationExecutor::new(context(dir.path(), dir.path(), &registry_path), None);

    let operations = vec![
        op(OperationArea::Registry, OperationMethod::Create, r"HKCU\Software", &["Demo", "Old"]),
        op(
            OperationArea::Registry,
            OperationMethod::SetValue,
            r"HKCU\Software\Demo",
            &["Version=1.1.0", "Channel=beta"],
        ),
        op(OperationArea::Registry, OperationMethod::DeleteValue, r"HKCU\Software\Demo", &["Channel"]),
        op(OperationArea::Registry, OperationMethod::Delete, r"HKCU\Software", &["Old"]),
    ];
    executor
        .execute(&operations, &CancellationToken::new())
        .await
        .unwrap();

    let store = FileRegistryStore::new(&registry_path);
    assert_eq!(
        store
            .get_value(r"HKCU\Software\Demo", "Version")
            .await
            .unwrap()
            .as_deref(),
        Some("1.1.0")
    );
    assert_eq!(
        store.get_value(r"HKCU\Software\Demo", "Channel").await.unwrap(),
        None
    );
    assert!(!store.key_exists(r"HKCU\Software\Old").await.unwrap());
}

#[tokio::test]
async fn test_cancelled_before_first_operation() {
    let dir = tempdir().unwrap();
    let program = dir.path().join("program");
    let mut executor = OperationExecutor::new(
        context(dir.path(), &program, &dir.path().join("registry.json")),
        None,
    );
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = executor
        .execute(
            &[op(OperationArea::Registry, OperationMethod::Create, "HKCU", &["A"])],
            &cancel,
        )
        .await
        .unwrap();
    assert!(report.is_cancelled());
    assert!(report.completed.is_empty());
    assert_eq!(*executor.state(), ExecutionState::Cancelled { completed: 0 });
}

#[cfg(unix)]
#[tokio::test]
async fn test_execute_checks_exit_status() {
    let dir = tempdir().unwrap();
    let mut executor = OperationExecutor::new(
        context(dir.path(), dir.path(), &dir.path().join("registry.json")),
        None,
    );
    let marker = dir.path().join("ran");
    let script = format!("touch '{}'", marker.display());

    executor
        .execute(
            &[op(OperationArea::Processes, OperationMethod::Execute, "/bin/sh", &["-c", &script])],
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert!(marker.exists());

    let err = executor
        .execute(
            &[op(OperationArea::Processes, OperationMethod::Execute, "/bin/sh", &["-c", "exit 3"])],
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Install(InstallError::OperationFailed { index: 0, .. })
    ));
}

#[tokio::test]
async fn test_traversal_entry_rejects_whole_package() {
    let dir = tempdir().unwrap();
    let package = dir.path().join("evil.zip");
    build_package(&package, &[("ok.txt", b"fine"), ("../escape.txt", b"evil")]);

    let dest = dir.path().join("work");
    let err = extract_package(&package, &dest).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Install(InstallError::PathTraversal { .. })
    ));
    assert!(!dest.join("ok.txt").exists());
    assert!(!dir.path().join("escape.txt").exists());
}

#[tokio::test]
async fn test_installer_end_to_end() {
    let dir = tempdir().unwrap();
    let package = dir.path().join("2.0.0.zip");
    build_package(&package, &[("app.bin", b"v2")]);

    let program = dir.path().join("program");
    let work = dir.path().join("work");
    let (tx, mut rx) = channel();
    let installer = Installer::new(
        InstallerConfig {
            work_dir: work.clone(),
            program_dir: program.clone(),
            lock_retry: LockRetry::default(),
        },
        Arc::new(FileRegistryStore::new(dir.path().join("registry.json"))),
        Some(tx),
    );

    let report = installer
        .install(
            &package,
            &UpdateVersion::parse("2.0.0").unwrap(),
            &[op(OperationArea::Files, OperationMethod::Create, "%program%", &["app.bin"])],
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.state, ExecutionState::Succeeded);
    assert_eq!(std::fs::read(program.join("app.bin")).unwrap(), b"v2");
    assert!(!work.join("2.0.0").exists());

    let mut extracted = None;
    while let Ok(message) = rx.try_recv() {
        if let AppEvent::Install(InstallEvent::ExtractionCompleted { files, .. }) = message.event {
            extracted = Some(files);
        }
    }
    assert_eq!(extracted, Some(1));
}
