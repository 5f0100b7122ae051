//! Event rendering for the terminal

use crate::logging::log_event_with_tracing;
use console::{style, Term};
use updkit_events::{
    AppEvent, DownloadEvent, EventMessage, GeneralEvent, InstallEvent, PublishEvent,
    ResolverEvent,
};

/// Renders events on stderr and forwards them to tracing
pub struct EventHandler {
    term: Term,
    colors: bool,
    /// Print nothing but logs; stdout carries the JSON result
    quiet: bool,
    debug: bool,
    /// Whole percent last drawn, to avoid redrawing the same line
    last_percent: Option<u32>,
}

impl EventHandler {
    pub fn new(colors: bool, quiet: bool, debug: bool) -> Self {
        Self {
            term: Term::stderr(),
            colors,
            quiet,
            debug,
            last_percent: None,
        }
    }

    pub fn handle_event(&mut self, message: EventMessage) {
        log_event_with_tracing(&message);
        if self.quiet {
            return;
        }

        match message.event {
            AppEvent::Resolver(event) => self.handle_resolver(event),
            AppEvent::Download(event) => self.handle_download(event),
            AppEvent::Install(event) => self.handle_install(event),
            AppEvent::Publish(event) => self.handle_publish(event),
            AppEvent::General(event) => self.handle_general(event),
        }
    }

    fn handle_resolver(&mut self, event: ResolverEvent) {
        match event {
            ResolverEvent::SearchStarted {
                current_version,
                configuration_uri,
            } => self.show_status(&format!(
                "Searching for updates to {current_version} at {configuration_uri}"
            )),
            ResolverEvent::CandidateSkipped { version, reason } if self.debug => {
                self.show_detail(&format!("skipped {version}: {reason:?}"));
            }
            ResolverEvent::SearchCompleted { update_count, .. } if update_count == 0 => {
                self.show_status("No updates available");
            }
            ResolverEvent::SearchCompleted {
                update_count,
                newest,
                necessary,
                ..
            } => {
                let newest = newest.map(|v| v.to_string()).unwrap_or_default();
                let mandatory = if necessary { " (mandatory)" } else { "" };
                self.show_status(&format!(
                    "Found {update_count} update(s), newest {newest}{mandatory}"
                ));
            }
            ResolverEvent::SearchFailed { failure } => self.show_error(&failure.message),
            ResolverEvent::CandidateSkipped { .. } => {}
        }
    }

    fn handle_download(&mut self, event: DownloadEvent) {
        match event {
            DownloadEvent::Started { version, .. } => {
                self.show_status(&format!("Downloading {version}"));
            }
            DownloadEvent::Progress {
                bytes_received,
                total_bytes,
                percentage,
                bytes_per_second,
                ..
            } => self.draw_progress(bytes_received, total_bytes, percentage, bytes_per_second),
            DownloadEvent::Completed {
                version,
                final_size,
                blake3,
                ..
            } => {
                self.finish_progress();
                self.show_success(&format!("Downloaded {version} ({})", format_bytes(final_size)));
                if self.debug {
                    self.show_detail(&format!("blake3 {blake3}"));
                }
            }
            DownloadEvent::Failed { version, failure, .. } => {
                self.finish_progress();
                self.show_error(&format!("Download of {version} failed: {}", failure.message));
            }
            DownloadEvent::Cancelled { completed } => {
                self.finish_progress();
                self.show_warning(&format!("Download cancelled after {completed} package(s)"));
            }
            DownloadEvent::BatchStarted { .. } | DownloadEvent::BatchCompleted { .. } => {}
        }
    }

    fn handle_install(&mut self, event: InstallEvent) {
        match event {
            InstallEvent::ValidationCompleted { version, valid: true } => {
                self.show_success(&format!("Signature of {version} verified"));
            }
            InstallEvent::ValidationCompleted { version, valid: false } => {
                self.show_error(&format!("Signature of {version} does not match"));
            }
            InstallEvent::ExtractionCompleted { version, files } => {
                self.show_status(&format!("Extracted {files} file(s) from {version}"));
            }
            InstallEvent::OperationStarted {
                index,
                area,
                method,
                target,
            } if self.debug => self.show_detail(&format!("#{index} {area}/{method} {target}")),
            InstallEvent::OperationRetrying { path, attempt, .. } => {
                self.show_warning(&format!("{path} is locked, retry {attempt}"));
            }
            InstallEvent::OperationFailed { index, failure } => {
                self.show_error(&format!("Operation #{index} failed: {}", failure.message));
            }
            InstallEvent::Completed { operations } => {
                self.show_success(&format!("Applied {operations} operation(s)"));
            }
            InstallEvent::Cancelled { completed } => {
                self.show_warning(&format!("Install cancelled after {completed} operation(s)"));
            }
            InstallEvent::OperationStarted { .. } | InstallEvent::OperationCompleted { .. } => {}
        }
    }

    fn handle_publish(&mut self, event: PublishEvent) {
        match event {
            PublishEvent::Started { version, provider } => {
                self.show_status(&format!("Publishing {version} via {provider}"));
            }
            PublishEvent::StepCompleted { step } if self.debug => self.show_detail(&step),
            PublishEvent::StepFailed { step, failure } => {
                self.show_error(&format!("{step} failed: {}", failure.message));
            }
            PublishEvent::RollbackStarted { steps } => {
                self.show_warning(&format!("Rolling back {steps} step(s)"));
            }
            PublishEvent::RollbackCompleted { failed, .. } if failed.is_empty() => {
                self.show_status("Rollback complete");
            }
            PublishEvent::RollbackCompleted { failed, .. } => {
                self.show_error(&format!("Could not undo: {}", failed.join(", ")));
            }
            PublishEvent::Completed { version } => {
                self.show_success(&format!("Published {version}"));
            }
            PublishEvent::Removed { version } => {
                self.show_success(&format!("Removed {version}"));
            }
            PublishEvent::StepCompleted { .. } => {}
        }
    }

    fn handle_general(&mut self, event: GeneralEvent) {
        match event {
            GeneralEvent::Warning { message, context } => match context {
                Some(context) => self.show_warning(&format!("{message}: {context}")),
                None => self.show_warning(&message),
            },
            GeneralEvent::Error { message, details } => match details {
                Some(details) => self.show_error(&format!("{message}: {details}")),
                None => self.show_error(&message),
            },
            GeneralEvent::DebugLog { message, .. } if self.debug => self.show_detail(&message),
            _ => {}
        }
    }

    fn draw_progress(&mut self, received: u64, total: u64, percentage: f32, rate: f64) {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let percent = percentage.floor() as u32;
        if self.last_percent == Some(percent) {
            return;
        }
        self.last_percent = Some(percent);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let rate = format_bytes(rate as u64);
        let line = format!(
            "  {percent:>3}%  {} / {}  {rate}/s",
            format_bytes(received),
            format_bytes(total)
        );
        let _ = self.term.clear_line();
        let _ = self.term.write_str(&line);
    }

    fn finish_progress(&mut self) {
        if self.last_percent.take().is_some() {
            let _ = self.term.clear_line();
        }
    }

    fn show_status(&self, message: &str) {
        let _ = self.term.write_line(message);
    }

    fn show_detail(&self, message: &str) {
        if self.colors {
            let _ = self.term.write_line(&format!("  {}", style(message).dim()));
        } else {
            let _ = self.term.write_line(&format!("  {message}"));
        }
    }

    fn show_success(&self, message: &str) {
        self.prefixed("[OK]", message, |s| style(s).green());
    }

    fn show_warning(&self, message: &str) {
        self.prefixed("[WARN]", message, |s| style(s).yellow());
    }

    fn show_error(&self, message: &str) {
        self.prefixed("[ERROR]", message, |s| style(s).red().bold());
    }

    fn prefixed(
        &self,
        prefix: &str,
        message: &str,
        paint: impl Fn(&str) -> console::StyledObject<&str>,
    ) {
        let line = if self.colors {
            format!("{} {message}", paint(prefix))
        } else {
            format!("{prefix} {message}")
        };
        let _ = self.term.write_line(&line);
    }
}

/// Human readable byte count
#[allow(clippy::cast_precision_loss)]
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = UNITS[0];
    for next in &UNITS[1..] {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = *next;
    }
    format!("{value:.1} {unit}")
}
