//! Output rendering and formatting

use crate::events::format_bytes;
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, ContentArrangement, Table};
use serde::Serialize;
use std::io;
use std::path::PathBuf;
use updkit_ops::{HistoryAction, HistoryEntry, SessionOutcome};
use updkit_resolver::UpdateResult;
use updkit_types::{UpdateConfiguration, UpdateVersion};

/// Final result of a command, rendered once it completes
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum CommandResult {
    Check(CheckReport),
    Update(SessionOutcome),
    Install {
        version: UpdateVersion,
        operations: usize,
        cancelled: bool,
    },
    Verify {
        package: PathBuf,
        valid: bool,
    },
    Keygen {
        public_key: String,
        public_key_path: PathBuf,
        secret_key_path: PathBuf,
    },
    Signature(String),
    Publish(UpdateConfiguration),
    Unpublish {
        version: UpdateVersion,
    },
    History(Vec<HistoryEntry>),
}

/// Summary of an update search
#[derive(Clone, Debug, Serialize)]
pub struct CheckReport {
    pub current_version: UpdateVersion,
    pub updates_found: bool,
    pub necessary: bool,
    pub total_package_size: u64,
    pub updates: Vec<UpdateSummary>,
}

#[derive(Clone, Debug, Serialize)]
pub struct UpdateSummary {
    pub version: UpdateVersion,
    pub necessary: bool,
    pub architecture: String,
    pub package_size: Option<u64>,
    pub changelog: Option<String>,
}

impl CheckReport {
    /// Summarize `result`, picking changelogs for `culture`
    pub fn new(current_version: UpdateVersion, result: &UpdateResult, culture: &str) -> Self {
        Self {
            current_version,
            updates_found: result.updates_found,
            necessary: result.is_necessary(),
            total_package_size: result.total_package_size(),
            updates: result
                .configurations
                .iter()
                .map(|c| UpdateSummary {
                    version: c.literal_version.clone(),
                    necessary: c.necessary_update,
                    architecture: c.architecture.to_string(),
                    package_size: c.package_size,
                    changelog: c.changelog_for(culture).map(str::to_string),
                })
                .collect(),
        }
    }
}

/// Output renderer for CLI results
#[derive(Clone)]
pub struct OutputRenderer {
    json_output: bool,
    colors: bool,
}

impl OutputRenderer {
    pub fn new(json_output: bool, colors: bool) -> Self {
        Self {
            json_output,
            colors,
        }
    }

    pub fn render_result(&self, result: &CommandResult) -> io::Result<()> {
        if self.json_output {
            let json = serde_json::to_string_pretty(result).map_err(io::Error::other)?;
            println!("{json}");
            return Ok(());
        }

        match result {
            CommandResult::Check(report) => self.render_check(report),
            CommandResult::Update(outcome) => render_outcome(outcome),
            CommandResult::Install {
                version,
                operations,
                cancelled,
            } => {
                if *cancelled {
                    println!("Install of {version} was cancelled.");
                } else {
                    println!("Installed {version} ({operations} operation(s)).");
                }
            }
            CommandResult::Verify { package, valid } => {
                let verdict = if *valid { "valid" } else { "INVALID" };
                println!("{}: signature {verdict}", package.display());
            }
            CommandResult::Keygen {
                public_key,
                public_key_path,
                secret_key_path,
            } => {
                println!("Secret key: {}", secret_key_path.display());
                println!("Public key: {}", public_key_path.display());
                println!();
                println!("Embed this public key in the application:");
                println!("  {public_key}");
            }
            CommandResult::Signature(signature) => print!("{signature}"),
            CommandResult::Publish(configuration) => {
                println!(
                    "Published {} at {}",
                    configuration.literal_version, configuration.update_package_uri
                );
            }
            CommandResult::Unpublish { version } => println!("Unpublished {version}."),
            CommandResult::History(entries) => self.render_history(entries),
        }
        Ok(())
    }

    fn render_check(&self, report: &CheckReport) {
        if !report.updates_found {
            println!("{} is up to date.", report.current_version);
            return;
        }

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec![
            Cell::new("Version").add_attribute(Attribute::Bold),
            Cell::new("Architecture").add_attribute(Attribute::Bold),
            Cell::new("Size").add_attribute(Attribute::Bold),
            Cell::new("Mandatory").add_attribute(Attribute::Bold),
            Cell::new("Changes").add_attribute(Attribute::Bold),
        ]);

        for update in &report.updates {
            let mandatory = if update.necessary {
                self.colored(Cell::new("yes"), Color::Red)
            } else {
                Cell::new("no")
            };
            table.add_row(vec![
                Cell::new(update.version.to_string()),
                Cell::new(&update.architecture),
                Cell::new(update.package_size.map_or_else(|| "-".to_string(), format_bytes)),
                mandatory,
                Cell::new(update.changelog.as_deref().unwrap_or("-")),
            ]);
        }

        println!("{table}");
        println!(
            "{} update(s) for {}, {} to download.",
            report.updates.len(),
            report.current_version,
            format_bytes(report.total_package_size)
        );
    }

    fn render_history(&self, entries: &[HistoryEntry]) {
        if entries.is_empty() {
            println!("Nothing has been published yet.");
            return;
        }

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec![
            Cell::new("Time").add_attribute(Attribute::Bold),
            Cell::new("Action").add_attribute(Attribute::Bold),
            Cell::new("Version").add_attribute(Attribute::Bold),
        ]);

        for entry in entries {
            let action = match entry.action {
                HistoryAction::Upload => self.colored(Cell::new("upload"), Color::Green),
                HistoryAction::Delete => self.colored(Cell::new("delete"), Color::Red),
            };
            table.add_row(vec![
                Cell::new(entry.time.format("%Y-%m-%d %H:%M:%S UTC").to_string()),
                action,
                Cell::new(entry.version.to_string()),
            ]);
        }

        println!("{table}");
    }

    fn colored(&self, cell: Cell, color: Color) -> Cell {
        if self.colors {
            cell.fg(color)
        } else {
            cell
        }
    }
}

fn render_outcome(outcome: &SessionOutcome) {
    match outcome {
        SessionOutcome::UpToDate => println!("Already up to date."),
        SessionOutcome::Installed { versions } => {
            let versions: Vec<String> = versions.iter().map(ToString::to_string).collect();
            println!("Installed {}.", versions.join(", "));
        }
        SessionOutcome::Cancelled => println!("Update cancelled."),
    }
}
