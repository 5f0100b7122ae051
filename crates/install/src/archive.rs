//! Package archive extraction

use std::fs::File;
use std::io;
use std::path::{Component, Path, PathBuf};
use updkit_errors::{Error, InstallError};
use zip::ZipArchive;

/// Extract the zip package at `package` into `dest`
///
/// `dest` is created if needed. Returns the number of files written.
///
/// # Errors
///
/// Returns `InstallError::PathTraversal` if any entry would land outside
/// `dest`, `InstallError::InvalidPackage` if the archive is unreadable, or
/// an I/O error.
pub async fn extract_package(package: &Path, dest: &Path) -> Result<usize, Error> {
    let package = package.to_path_buf();
    let dest = dest.to_path_buf();
    tokio::task::spawn_blocking(move || extract_blocking(&package, &dest))
        .await
        .map_err(|e| Error::internal(format!("extraction task failed: {e}")))?
}

fn extract_blocking(package: &Path, dest: &Path) -> Result<usize, Error> {
    let file = File::open(package).map_err(|e| Error::io_with_path(&e, package))?;
    let mut archive = ZipArchive::new(file).map_err(|e| InstallError::InvalidPackage {
        message: format!("{}: {e}", package.display()),
    })?;

    // Validate every entry before writing anything
    let mut targets = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let entry = archive.by_index(index)?;
        let relative = safe_entry_path(entry.name())?;
        targets.push((relative, entry.is_dir()));
    }

    std::fs::create_dir_all(dest).map_err(|e| Error::io_with_path(&e, dest))?;

    let mut files = 0;
    for (index, (relative, is_dir)) in targets.into_iter().enumerate() {
        let target = dest.join(&relative);
        if is_dir {
            std::fs::create_dir_all(&target).map_err(|e| Error::io_with_path(&e, &target))?;
            continue;
        }

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io_with_path(&e, parent))?;
        }
        let mut entry = archive.by_index(index)?;
        let mut out = File::create(&target).map_err(|e| Error::io_with_path(&e, &target))?;
        io::copy(&mut entry, &mut out).map_err(|e| Error::io_with_path(&e, &target))?;

        apply_mode(&target, entry.unix_mode())?;

        files += 1;
    }

    tracing::debug!(package = %package.display(), files, "package extracted");
    Ok(files)
}

#[cfg(unix)]
fn apply_mode(target: &Path, mode: Option<u32>) -> Result<(), Error> {
    use std::os::unix::fs::PermissionsExt;
    if let Some(mode) = mode.map(|m| m & 0o777).filter(|m| *m != 0) {
        std::fs::set_permissions(target, std::fs::Permissions::from_mode(mode))
            .map_err(|e| Error::io_with_path(&e, target))?;
    }
    Ok(())
}

#[cfg(not(unix))]
#[allow(clippy::unnecessary_wraps)]
fn apply_mode(_target: &Path, _mode: Option<u32>) -> Result<(), Error> {
    Ok(())
}

/// Relative path for an archive entry, rejecting anything that could escape
/// the extraction directory
///
/// # Errors
///
/// Returns `InstallError::PathTraversal` for empty, absolute or climbing
/// names and names with control characters.
pub fn safe_entry_path(name: &str) -> Result<PathBuf, Error> {
    let traversal = || -> Error {
        InstallError::PathTraversal {
            entry: name.to_string(),
        }
        .into()
    };

    let normalized = name.replace('\\', "/");
    if normalized.is_empty()
        || normalized.starts_with('/')
        || normalized.chars().any(char::is_control)
    {
        return Err(traversal());
    }

    let mut relative = PathBuf::new();
    for component in Path::new(&normalized).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(traversal())
            }
        }
    }

    if relative.as_os_str().is_empty() {
        return Err(traversal());
    }
    Ok(relative)
}
