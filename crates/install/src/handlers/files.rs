//! `Files/Create`, `Files/Delete` and `Files/Rename`

use super::{invalid_arguments, unsupported, OperationHandler};
use crate::archive::safe_entry_path;
use crate::context::StepContext;
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use updkit_errors::Error;
use updkit_types::{Operation, OperationMethod};

#[derive(Debug, Clone, Copy, Default)]
pub struct FilesHandler;

#[async_trait]
impl OperationHandler for FilesHandler {
    async fn execute(&self, step: &StepContext<'_>, operation: &Operation) -> Result<(), Error> {
        match operation.method {
            OperationMethod::Create => create(step, operation).await,
            OperationMethod::Delete => delete(step, operation).await,
            OperationMethod::Rename => rename(step, operation).await,
            _ => Err(unsupported(operation)),
        }
    }
}

/// Copy payload items into the target directory
async fn create(step: &StepContext<'_>, operation: &Operation) -> Result<(), Error> {
    let dest_dir = step.resolve(&operation.target)?;
    tokio::fs::create_dir_all(&dest_dir)
        .await
        .map_err(|e| Error::io_with_path(&e, &dest_dir))?;

    for item in &operation.arguments {
        let relative = safe_entry_path(item).map_err(|e| invalid_arguments(operation, e.to_string()))?;
        let source = step.context.payload_dir.join(&relative);
        let Some(name) = relative.file_name() else {
            return Err(invalid_arguments(operation, format!("'{item}' has no file name")));
        };
        let target = dest_dir.join(name);

        let metadata = tokio::fs::metadata(&source)
            .await
            .map_err(|e| Error::io_with_path(&e, &source))?;
        if metadata.is_dir() {
            copy_tree(step, &source, &target).await?;
        } else {
            copy_file(step, &source, &target).await?;
        }
    }
    Ok(())
}

async fn copy_file(step: &StepContext<'_>, source: &Path, target: &Path) -> Result<(), Error> {
    step.retry_locked(target, move || async move {
        tokio::fs::copy(source, target).await.map(|_| ())
    })
    .await
}

async fn copy_tree(step: &StepContext<'_>, source: &Path, target: &Path) -> Result<(), Error> {
    let mut pending: Vec<(PathBuf, PathBuf)> = vec![(source.to_path_buf(), target.to_path_buf())];

    while let Some((from, to)) = pending.pop() {
        tokio::fs::create_dir_all(&to)
            .await
            .map_err(|e| Error::io_with_path(&e, &to))?;
        let mut entries = tokio::fs::read_dir(&from)
            .await
            .map_err(|e| Error::io_with_path(&e, &from))?;

        while let Some(entry) = entries.next_entry().await? {
            let child = to.join(entry.file_name());
            if entry.file_type().await?.is_dir() {
                pending.push((entry.path(), child));
            } else {
                copy_file(step, &entry.path(), &child).await?;
            }
        }
    }
    Ok(())
}

/// Delete the listed entries of the target directory; missing ones are skipped
async fn delete(step: &StepContext<'_>, operation: &Operation) -> Result<(), Error> {
    let dir = step.resolve(&operation.target)?;

    for item in &operation.arguments {
        let relative = safe_entry_path(item).map_err(|e| invalid_arguments(operation, e.to_string()))?;
        let path = dir.join(relative);

        let metadata = match tokio::fs::symlink_metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(Error::io_with_path(&e, &path)),
        };

        let target = path.as_path();
        if metadata.is_dir() {
            step.retry_locked(target, move || async move {
                ignore_missing(tokio::fs::remove_dir_all(target).await)
            })
            .await?;
        } else {
            step.retry_locked(target, move || async move {
                ignore_missing(tokio::fs::remove_file(target).await)
            })
            .await?;
        }
    }
    Ok(())
}

/// Rename the target file to the single name in the arguments
async fn rename(step: &StepContext<'_>, operation: &Operation) -> Result<(), Error> {
    let path = step.resolve(&operation.target)?;
    let new_name = match operation.arguments.as_slice() {
        [name] if is_plain_name(name) => name,
        [name] => {
            return Err(invalid_arguments(
                operation,
                format!("'{name}' is not a plain file name"),
            ))
        }
        _ => return Err(invalid_arguments(operation, "expected exactly one new file name")),
    };
    let renamed = path.with_file_name(new_name);

    let (from, to) = (path.as_path(), renamed.as_path());
    step.retry_locked(from, move || async move { tokio::fs::rename(from, to).await })
        .await
}

fn ignore_missing(result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}
