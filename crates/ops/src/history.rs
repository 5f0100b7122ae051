//! Persisted record of publish actions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use updkit_errors::{Error, PublishError};
use updkit_types::UpdateVersion;

/// What was done to a published version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistoryAction {
    Upload,
    Delete,
}

/// One line of the publish history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub time: DateTime<Utc>,
    pub action: HistoryAction,
    pub version: UpdateVersion,
}

impl HistoryEntry {
    #[must_use]
    pub fn now(action: HistoryAction, version: UpdateVersion) -> Self {
        Self {
            time: Utc::now(),
            action,
            version,
        }
    }
}

/// Publish history kept as a JSON array, oldest entry first
#[derive(Debug)]
pub struct PublishHistory {
    path: PathBuf,
    lock: Mutex<()>,
}

impl PublishHistory {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All recorded entries; a missing file is an empty history
    ///
    /// # Errors
    ///
    /// Returns `PublishError::CorruptHistory` if the file is not a valid
    /// history, or an I/O error if it cannot be read.
    pub async fn entries(&self) -> Result<Vec<HistoryEntry>, Error> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(Vec::new()),
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                PublishError::CorruptHistory {
                    path: self.path.display().to_string(),
                    message: e.to_string(),
                }
                .into()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(Error::io_with_path(&e, &self.path)),
        }
    }

    /// Append `entry` and rewrite the file
    ///
    /// # Errors
    ///
    /// Returns an error if the history cannot be read or written.
    pub async fn append(&self, entry: HistoryEntry) -> Result<(), Error> {
        let _guard = self.lock.lock().await;
        let mut entries = self.entries().await?;
        entries.push(entry);

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::io_with_path(&e, parent))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_string_pretty(&entries)?)
            .await
            .map_err(|e| Error::io_with_path(&e, &tmp))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| Error::io_with_path(&e, &self.path))
    }
}
