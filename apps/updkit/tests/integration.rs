//! Integration tests for the updkit CLI

use std::path::Path;
use std::process::{Command, Output};
use tempfile::tempdir;

fn updkit(config: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_updkit"))
        .env_remove("UPDKIT_KEY_PASSWORD")
        .arg("--config")
        .arg(config)
        .args(args)
        .output()
        .expect("Failed to execute updkit")
}

fn empty_config(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("config.toml");
    std::fs::write(&path, "").unwrap();
    path
}

#[test]
fn test_cli_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_updkit"))
        .arg("--version")
        .output()
        .expect("Failed to execute updkit");

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("updkit"));
}

#[test]
fn test_cli_help_lists_commands() {
    let output = Command::new(env!("CARGO_BIN_EXE_updkit"))
        .arg("--help")
        .output()
        .expect("Failed to execute updkit");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["check", "update", "install", "verify", "keygen", "sign", "publish", "unpublish", "history"] {
        assert!(stdout.contains(command), "help is missing {command}");
    }
}

#[test]
fn test_cli_invalid_command() {
    let output = Command::new(env!("CARGO_BIN_EXE_updkit"))
        .arg("invalid-command")
        .output()
        .expect("Failed to execute updkit");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unrecognized subcommand"));
}

#[test]
fn test_keygen_sign_verify() {
    let dir = tempdir().unwrap();
    let config = empty_config(dir.path());
    let keys = dir.path().join("keys");
    let keys_arg = keys.to_str().unwrap();

    let output = updkit(&config, &["keygen", "--output-dir", keys_arg]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(keys.join("updkit.key").exists());
    assert!(keys.join("updkit.pub").exists());

    let again = updkit(&config, &["keygen", "--output-dir", keys_arg]);
    assert!(!again.status.success());

    let package = dir.path().join("1.1.0.zip");
    std::fs::write(&package, b"package bytes").unwrap();
    let secret = keys.join("updkit.key");
    let output = updkit(
        &config,
        &["sign", package.to_str().unwrap(), "--key", secret.to_str().unwrap()],
    );
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let signature = dir.path().join("1.1.0.zip.minisig");
    std::fs::write(&signature, &output.stdout).unwrap();

    let public = keys.join("updkit.pub");
    let verify = |package: &Path| {
        updkit(
            &config,
            &[
                "--json",
                "verify",
                package.to_str().unwrap(),
                "--signature",
                signature.to_str().unwrap(),
                "--key",
                public.to_str().unwrap(),
            ],
        )
    };

    let output = verify(&package);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("\"valid\": true"));

    std::fs::write(&package, b"tampered bytes").unwrap();
    let output = verify(&package);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("\"valid\": false"));
}

#[test]
fn test_check_without_configuration_uri_fails() {
    let dir = tempdir().unwrap();
    let config = empty_config(dir.path());
    let output = updkit(&config, &["check", "--current", "1.0.0"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("configuration_uri"));
}

#[test]
fn test_history_starts_empty() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("config.toml");
    let data = dir.path().join("data");
    std::fs::write(
        &config,
        format!("[paths]\ndata_path = {:?}\n", data.to_str().unwrap()),
    )
    .unwrap();

    let output = updkit(&config, &["history"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(String::from_utf8_lossy(&output.stdout).contains("Nothing has been published yet"));

    let output = updkit(&config, &["--json", "history"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("\"type\": \"history\""));
}
