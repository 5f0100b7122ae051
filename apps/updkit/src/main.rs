//! updkit - application auto-update toolkit
//!
//! Front end over the ops crate: checks for and installs updates on the
//! client side, signs and publishes them on the release side.

mod cli;
mod display;
mod error;
mod events;
mod logging;

use crate::cli::{Cli, Commands, GlobalArgs};
use crate::display::{CheckReport, CommandResult, OutputRenderer};
use crate::error::CliError;
use crate::events::EventHandler;
use clap::Parser;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use updkit_config::Config;
use updkit_errors::{ConfigError, SigningError};
use updkit_events::{EventReceiver, EventSender};
use updkit_install::{FileRegistryStore, Installer, RegistryStore};
use updkit_ops::{
    PublishHistory, PublishRequest, Publisher, SessionConfig, SessionOutcome, UpdateSession,
};
use updkit_resolver::HostInfo;
use updkit_signing::PackageValidator;
use updkit_transfer::ProviderRegistry;
use updkit_types::{ColorChoice, Operation, UpdateConfiguration, UpdateVersion};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json_mode = cli.global.json;

    init_tracing(json_mode, cli.global.debug);

    match run(cli).await {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            error!("Application error: {}", e);
            if !json_mode {
                eprintln!("Error: {e}");
            }
            process::exit(e.exit_code());
        }
    }
}

/// Main application logic; `Ok(false)` means the command ran but reported failure
async fn run(cli: Cli) -> Result<bool, CliError> {
    info!("Starting updkit v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load_or_default(cli.global.config.as_deref()).await?;
    config.merge_env()?;
    apply_cli_config(&mut config, &cli.global, &cli.command)?;

    let (event_sender, event_receiver) = updkit_events::channel();

    let colors_enabled = match cli.global.color.unwrap_or(config.general.color) {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => console::Term::stderr().features().colors_supported(),
    };
    let mut event_handler = EventHandler::new(colors_enabled, cli.global.json, cli.global.debug);
    let renderer = OutputRenderer::new(cli.global.json, colors_enabled);

    let result = execute_command_with_events(
        cli.command,
        config,
        event_sender,
        event_receiver,
        &mut event_handler,
    )
    .await?;

    renderer.render_result(&result)?;

    info!("Command completed");
    Ok(!matches!(result, CommandResult::Verify { valid: false, .. }))
}

/// Execute command with concurrent event handling
async fn execute_command_with_events(
    command: Commands,
    config: Config,
    event_sender: EventSender,
    mut event_receiver: EventReceiver,
    event_handler: &mut EventHandler,
) -> Result<CommandResult, CliError> {
    let mut command_future = Box::pin(execute_command(command, config, event_sender));

    loop {
        select! {
            result = &mut command_future => {
                while let Ok(event) = event_receiver.try_recv() {
                    event_handler.handle_event(event);
                }
                return result;
            }

            event = event_receiver.recv() => {
                match event {
                    Some(event) => event_handler.handle_event(event),
                    None => return command_future.await,
                }
            }
        }
    }
}

/// Execute the specified command
async fn execute_command(
    command: Commands,
    config: Config,
    tx: EventSender,
) -> Result<CommandResult, CliError> {
    match command {
        Commands::Check { .. } => {
            let mut session = build_session(&config, tx).await?;
            let current = session.config().current_version.clone();
            let result = session.search().await?;
            Ok(CommandResult::Check(CheckReport::new(
                current,
                result,
                &config.updater.culture,
            )))
        }

        Commands::Update { .. } => {
            let mut session = build_session(&config, tx.clone()).await?;
            cancel_on_ctrl_c(session.cancellation_token());
            let outcome = session.run(&tx).await?;
            if matches!(outcome, SessionOutcome::Installed { .. }) {
                if let Some(command) = &config.install.restart_command {
                    restart_application(command)?;
                }
            }
            Ok(CommandResult::Update(outcome))
        }

        Commands::Install {
            package,
            configuration,
            version,
            skip_verify,
        } => {
            let update = select_configuration(&configuration, version.as_deref()).await?;

            if skip_verify || !config.security.verify_signatures {
                tracing::warn!("installing {} without signature verification", package.display());
            } else {
                let validator = PackageValidator::new(config.public_key()?)?;
                if !validator.validate(&package, &update.signature).await? {
                    return Err(updkit_errors::Error::from(SigningError::VerificationFailed {
                        reason: format!("signature mismatch for {}", package.display()),
                    })
                    .into());
                }
            }

            let installer = Installer::from_config(&config, Some(tx));
            let cancel = CancellationToken::new();
            cancel_on_ctrl_c(cancel.clone());
            let report = installer
                .install(&package, &update.literal_version, &update.operations, &cancel)
                .await?;
            Ok(CommandResult::Install {
                version: update.literal_version,
                operations: report.completed.len(),
                cancelled: report.is_cancelled(),
            })
        }

        Commands::Verify {
            package,
            signature,
            key,
        } => {
            let signature = read_text(&signature).await?;
            let public_key = match key {
                Some(key) if Path::new(&key).is_file() => read_text(Path::new(&key)).await?,
                Some(key) => key,
                None => config.public_key()?.to_string(),
            };
            let valid = updkit_signing::validate(&package, &signature, &public_key).await?;
            Ok(CommandResult::Verify { package, valid })
        }

        Commands::Keygen {
            output_dir,
            force,
            password,
        } => keygen(&output_dir, force, password).await,

        Commands::Sign {
            package,
            key,
            password,
        } => {
            let key = secret_key_path(key, &config)?;
            let signature = updkit_signing::sign_package(&package, &key, password).await?;
            Ok(CommandResult::Signature(signature))
        }

        Commands::Publish {
            package,
            version,
            necessary,
            architecture,
            changelogs,
            operations,
            unsupported_versions,
            password,
        } => {
            let mut configuration = UpdateConfiguration::new(UpdateVersion::parse(&version)?, "");
            configuration.necessary_update = necessary;
            configuration.architecture = architecture.into();
            configuration.changelog = parse_changelogs(&changelogs)?;
            configuration.unsupported_versions = unsupported_versions
                .iter()
                .map(|v| UpdateVersion::parse(v))
                .collect::<Result<_, _>>()?;
            if let Some(path) = operations {
                configuration.operations = read_operations(&path).await?;
            }

            let publisher =
                Publisher::from_config(&config, &ProviderRegistry::with_builtin(), Some(tx))?
                    .with_password(password);
            let published = publisher
                .publish(PublishRequest {
                    package,
                    configuration,
                })
                .await?;
            Ok(CommandResult::Publish(published))
        }

        Commands::Unpublish { version } => {
            let version = UpdateVersion::parse(&version)?;
            let publisher =
                Publisher::from_config(&config, &ProviderRegistry::with_builtin(), Some(tx))?;
            publisher.remove(&version).await?;
            Ok(CommandResult::Unpublish { version })
        }

        Commands::History => {
            let history = PublishHistory::new(config.publish_history_path());
            Ok(CommandResult::History(history.entries().await?))
        }
    }
}

async fn build_session(config: &Config, tx: EventSender) -> Result<UpdateSession, CliError> {
    let session_config = SessionConfig::from_config(config, HostInfo::detect().await)?;
    let registry: Arc<dyn RegistryStore> = Arc::new(FileRegistryStore::new(config.registry_path()));
    Ok(UpdateSession::new(session_config, registry, Some(tx))?)
}

/// Cancel `token` on the first Ctrl-C
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, cancelling");
            token.cancel();
        }
    });
}

/// Launch the updated application without waiting for it
fn restart_application(command: &str) -> Result<(), CliError> {
    let mut parts = command.split_whitespace();
    let Some(program) = parts.next() else {
        return Err(CliError::InvalidArguments(
            "install.restart_command is empty".to_string(),
        ));
    };
    tokio::process::Command::new(program).args(parts).spawn()?;
    info!(program, "restarted application");
    Ok(())
}

/// Pick the configuration for `version` from a local document
async fn select_configuration(
    document: &Path,
    version: Option<&str>,
) -> Result<UpdateConfiguration, CliError> {
    let configurations = UpdateConfiguration::parse_document(&read_text(document).await?)?;
    match version {
        Some(literal) => {
            let version = UpdateVersion::parse(literal)?;
            configurations
                .into_iter()
                .find(|c| c.literal_version == version)
                .ok_or_else(|| {
                    CliError::InvalidArguments(format!(
                        "{} does not list version {version}",
                        document.display()
                    ))
                })
        }
        None => {
            let mut configurations = configurations;
            if configurations.len() == 1 {
                Ok(configurations.remove(0))
            } else {
                Err(CliError::InvalidArguments(format!(
                    "{} lists {} versions; pass --update-version",
                    document.display(),
                    configurations.len()
                )))
            }
        }
    }
}

async fn keygen(
    output_dir: &Path,
    force: bool,
    password: Option<String>,
) -> Result<CommandResult, CliError> {
    let secret_key_path = output_dir.join("updkit.key");
    let public_key_path = output_dir.join("updkit.pub");
    if !force && (secret_key_path.exists() || public_key_path.exists()) {
        return Err(CliError::InvalidArguments(format!(
            "key files already exist in {}; pass --force to replace them",
            output_dir.display()
        )));
    }

    let keys = updkit_signing::generate_keypair(password)?;
    tokio::fs::create_dir_all(output_dir).await?;
    tokio::fs::write(&secret_key_path, &keys.secret_key_file).await?;
    restrict_permissions(&secret_key_path).await?;
    tokio::fs::write(&public_key_path, &keys.public_key_file).await?;

    Ok(CommandResult::Keygen {
        public_key: keys.public_key,
        public_key_path,
        secret_key_path,
    })
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

fn secret_key_path(key: Option<PathBuf>, config: &Config) -> Result<PathBuf, CliError> {
    key.or_else(|| config.publish.secret_key.clone())
        .ok_or_else(|| {
            CliError::Ops(
                ConfigError::MissingField {
                    field: "publish.secret_key".to_string(),
                }
                .into(),
            )
        })
}

/// Parse `culture=text` pairs; text without a culture is English
fn parse_changelogs(entries: &[String]) -> Result<BTreeMap<String, String>, CliError> {
    entries
        .iter()
        .map(|entry| match entry.split_once('=') {
            Some((culture, _)) if culture.trim().is_empty() => Err(CliError::InvalidArguments(
                format!("changelog '{entry}' has an empty culture"),
            )),
            Some((culture, text)) => Ok((culture.trim().to_string(), text.to_string())),
            None => Ok(("en".to_string(), entry.clone())),
        })
        .collect()
}

async fn read_operations(path: &Path) -> Result<Vec<Operation>, CliError> {
    serde_json::from_str(&read_text(path).await?).map_err(|e| {
        CliError::InvalidArguments(format!("invalid operations in {}: {e}", path.display()))
    })
}

async fn read_text(path: &Path) -> Result<String, CliError> {
    tokio::fs::read_to_string(path).await.map_err(|e| {
        CliError::Ops(updkit_errors::Error::io_with_path(&e, path))
    })
}

/// Initialize tracing/logging
fn init_tracing(json_mode: bool, debug_enabled_flag: bool) {
    let debug_enabled = std::env::var("RUST_LOG").is_ok() || debug_enabled_flag;
    let filter = |default: &str| {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default))
    };

    if debug_enabled {
        // Structured JSON logs to file; the terminal keeps the rendered events
        let log_dir = Config::default().logs_path();
        let log_file = log_dir.join(format!(
            "updkit-{}.log",
            chrono::Utc::now().format("%Y%m%d-%H%M%S")
        ));

        match std::fs::create_dir_all(&log_dir).and_then(|()| std::fs::File::create(&log_file)) {
            Ok(file) => {
                tracing_subscriber::fmt()
                    .json()
                    .with_writer(file)
                    .with_env_filter(filter("info,updkit=debug,updkit_ops=debug"))
                    .init();
                if !json_mode {
                    eprintln!("Debug logging enabled: {}", log_file.display());
                }
                return;
            }
            Err(e) if !json_mode => eprintln!("Warning: Failed to create log file: {e}"),
            Err(_) => {}
        }
    }

    if json_mode {
        // Keep stdout and stderr clean for the JSON result
        tracing_subscriber::fmt()
            .with_writer(std::io::sink)
            .with_env_filter("off")
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(filter("warn"))
            .init();
    }
}

/// Apply CLI configuration overrides (highest precedence)
fn apply_cli_config(
    config: &mut Config,
    global: &GlobalArgs,
    command: &Commands,
) -> Result<(), CliError> {
    if let Some(color) = global.color {
        config.general.color = color;
    }

    match command {
        Commands::Check { from, current } | Commands::Update { from, current, .. } => {
            if let Some(uri) = from {
                config.updater.configuration_uri = Some(uri.clone());
            }
            if let Some(version) = current {
                UpdateVersion::parse(version)?;
                config.updater.current_version = Some(version.clone());
            }
        }
        _ => {}
    }

    if let Commands::Update {
        skip_verify: true, ..
    } = command
    {
        config.security.verify_signatures = false;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_changelogs() {
        let parsed = parse_changelogs(&[
            "de=Fehler behoben".to_string(),
            "Bug fixes".to_string(),
        ])
        .unwrap();
        assert_eq!(parsed["de"], "Fehler behoben");
        assert_eq!(parsed["en"], "Bug fixes");
        assert!(parse_changelogs(&["=text".to_string()]).is_err());
    }

    #[test]
    fn test_cli_overrides_config() {
        let cli = Cli::parse_from([
            "updkit",
            "update",
            "--from",
            "https://example.com/updates.json",
            "--current",
            "1.2.0",
            "--skip-verify",
        ]);
        let mut config = Config::default();
        apply_cli_config(&mut config, &cli.global, &cli.command).unwrap();
        assert_eq!(
            config.updater.configuration_uri.as_deref(),
            Some("https://example.com/updates.json")
        );
        assert_eq!(config.current_version().unwrap().to_string(), "1.2.0");
        assert!(!config.security.verify_signatures);
    }

    #[test]
    fn test_invalid_current_version_rejected() {
        let cli = Cli::parse_from(["updkit", "check", "--current", "not-a-version"]);
        let mut config = Config::default();
        assert!(apply_cli_config(&mut config, &cli.global, &cli.command).is_err());
    }
}
