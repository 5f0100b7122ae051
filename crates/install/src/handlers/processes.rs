//! Starting, stopping and running processes

use super::{unsupported, OperationHandler};
use crate::context::StepContext;
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use updkit_errors::{Error, InstallError};
use updkit_types::{Operation, OperationMethod};

#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessesHandler;

#[async_trait]
impl OperationHandler for ProcessesHandler {
    async fn execute(&self, step: &StepContext<'_>, operation: &Operation) -> Result<(), Error> {
        match operation.method {
            OperationMethod::Start => {
                let program = step.resolve(&operation.target)?;
                let child = Command::new(&program)
                    .args(&operation.arguments)
                    .stdin(Stdio::null())
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .spawn()
                    .map_err(|e| process_failed(&operation.target, e.to_string()))?;
                tracing::debug!(program = %program.display(), pid = ?child.id(), "process started");
                Ok(())
            }
            OperationMethod::Execute => {
                let program = step.resolve(&operation.target)?;
                let output = Command::new(&program)
                    .args(&operation.arguments)
                    .stdin(Stdio::null())
                    .output()
                    .await
                    .map_err(|e| process_failed(&operation.target, e.to_string()))?;
                if output.status.success() {
                    Ok(())
                } else {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    Err(process_failed(
                        &operation.target,
                        format!("exited with {}: {}", output.status, stderr.trim()),
                    ))
                }
            }
            OperationMethod::Stop => stop(&operation.target).await,
            _ => Err(unsupported(operation)),
        }
    }
}

/// Terminate every process named `name`; no matching process is not an error
async fn stop(name: &str) -> Result<(), Error> {
    let (program, args, not_found_code) = if cfg!(windows) {
        let image = if name.to_ascii_lowercase().ends_with(".exe") {
            name.to_string()
        } else {
            format!("{name}.exe")
        };
        ("taskkill", vec!["/F".to_string(), "/IM".to_string(), image], 128)
    } else {
        ("pkill", vec!["-x".to_string(), name.to_string()], 1)
    };

    let output = Command::new(program)
        .args(&args)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| process_failed(program, e.to_string()))?;

    match output.status.code() {
        Some(0) => Ok(()),
        Some(code) if code == not_found_code => {
            tracing::debug!(name, "no running process to stop");
            Ok(())
        }
        _ => Err(process_failed(
            name,
            format!(
                "{program} exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        )),
    }
}

fn process_failed(program: &str, message: String) -> Error {
    InstallError::ProcessFailed {
        program: program.to_string(),
        message,
    }
    .into()
}
