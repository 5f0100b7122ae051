//! Persistent key/value tree backing registry operations

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use updkit_errors::{Error, InstallError};

/// Hierarchical key store with named string values
///
/// Key paths use `\` or `/` as separators, like `HKEY_CURRENT_USER\Software\App`.
#[async_trait]
pub trait RegistryStore: Send + Sync + fmt::Debug {
    /// Create `path` and any missing parents
    async fn create_key(&self, path: &str) -> Result<(), Error>;

    /// Delete `path` with all sub keys and values
    async fn delete_key(&self, path: &str) -> Result<(), Error>;

    /// Set a value, creating the key if needed
    async fn set_value(&self, path: &str, name: &str, value: &str) -> Result<(), Error>;

    /// Remove a value; a missing value is not an error
    async fn delete_value(&self, path: &str, name: &str) -> Result<(), Error>;

    async fn get_value(&self, path: &str, name: &str) -> Result<Option<String>, Error>;

    async fn key_exists(&self, path: &str) -> Result<bool, Error>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct RegistryKey {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    values: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    keys: BTreeMap<String, RegistryKey>,
}

impl RegistryKey {
    fn find(&self, segments: &[&str]) -> Option<&Self> {
        segments
            .iter()
            .try_fold(self, |key, segment| key.keys.get(*segment))
    }

    fn find_mut(&mut self, segments: &[&str]) -> Option<&mut Self> {
        segments
            .iter()
            .try_fold(self, |key, segment| key.keys.get_mut(*segment))
    }

    fn ensure(&mut self, segments: &[&str]) -> &mut Self {
        segments.iter().fold(self, |key, segment| {
            key.keys.entry((*segment).to_string()).or_default()
        })
    }
}

/// Registry store persisted as a JSON document
pub struct FileRegistryStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl fmt::Debug for FileRegistryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileRegistryStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl FileRegistryStore {
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

    async fn load(&self) -> Result<RegistryKey, Error> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(RegistryKey::default()),
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                InstallError::RegistryError {
                    key: self.path.display().to_string(),
                    message: format!("corrupt registry file: {e}"),
                }
                .into()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(RegistryKey::default()),
            Err(e) => Err(Error::io_with_path(&e, &self.path)),
        }
    }

    async fn save(&self, root: &RegistryKey) -> Result<(), Error> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::io_with_path(&e, parent))?;
        }
        let content = serde_json::to_string_pretty(root)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content)
            .await
            .map_err(|e| Error::io_with_path(&e, &tmp))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| Error::io_with_path(&e, &self.path))
    }

    /// Load, apply `change`, save
    async fn update<F>(&self, change: F) -> Result<(), Error>
    where
        F: FnOnce(&mut RegistryKey) -> Result<(), Error> + Send,
    {
        let _guard = self.lock.lock().await;
        let mut root = self.load().await?;
        change(&mut root)?;
        self.save(&root).await
    }
}

fn segments(path: &str) -> Result<Vec<&str>, Error> {
    let segments: Vec<&str> = path
        .split(['\\', '/'])
        .filter(|segment| !segment.is_empty())
        .collect();
    if segments.is_empty() {
        return Err(InstallError::RegistryError {
            key: path.to_string(),
            message: "empty key path".to_string(),
        }
        .into());
    }
    Ok(segments)
}

fn missing_key(path: &str) -> Error {
    InstallError::RegistryError {
        key: path.to_string(),
        message: "key does not exist".to_string(),
    }
    .into()
}

#[async_trait]
impl RegistryStore for FileRegistryStore {
    async fn create_key(&self, path: &str) -> Result<(), Error> {
        let segments = segments(path)?;
        self.update(|root| {
            root.ensure(&segments);
            Ok(())
        })
        .await
    }

    async fn delete_key(&self, path: &str) -> Result<(), Error> {
        let segments = segments(path)?;
        self.update(|root| {
            let (leaf, parents) = segments.split_last().ok_or_else(|| missing_key(path))?;
            root.find_mut(parents)
                .and_then(|parent| parent.keys.remove(*leaf))
                .map(|_| ())
                .ok_or_else(|| missing_key(path))
        })
        .await
    }

    async fn set_value(&self, path: &str, name: &str, value: &str) -> Result<(), Error> {
        let segments = segments(path)?;
        self.update(|root| {
            root.ensure(&segments)
                .values
                .insert(name.to_string(), value.to_string());
            Ok(())
        })
        .await
    }

    async fn delete_value(&self, path: &str, name: &str) -> Result<(), Error> {
        let segments = segments(path)?;
        self.update(|root| {
            let key = root.find_mut(&segments).ok_or_else(|| missing_key(path))?;
            key.values.remove(name);
            Ok(())
        })
        .await
    }

    async fn get_value(&self, path: &str, name: &str) -> Result<Option<String>, Error> {
        let segments = segments(path)?;
        let _guard = self.lock.lock().await;
        let root = self.load().await?;
        Ok(root
            .find(&segments)
            .and_then(|key| key.values.get(name).cloned()))
    }

    async fn key_exists(&self, path: &str) -> Result<bool, Error> {
        let segments = segments(path)?;
        let _guard = self.lock.lock().await;
        let root = self.load().await?;
        Ok(root.find(&segments).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_keys_and_values_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        let store = FileRegistryStore::new(&path);

        store.create_key(r"HKCU\Software\Demo\Settings").await.unwrap();
        store
            .set_value(r"HKCU\Software\Demo", "InstallDir", "/opt/demo")
            .await
            .unwrap();

        let reopened = FileRegistryStore::new(&path);
        assert!(reopened.key_exists("HKCU/Software/Demo/Settings").await.unwrap());
        assert_eq!(
            reopened
                .get_value(r"HKCU\Software\Demo", "InstallDir")
                .await
                .unwrap()
                .as_deref(),
            Some("/opt/demo")
        );
    }

    #[tokio::test]
    async fn test_delete_key_is_recursive() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRegistryStore::new(dir.path().join("registry.json"));
        store.set_value(r"HKCU\A\B\C", "v", "1").await.unwrap();

        store.delete_key(r"HKCU\A").await.unwrap();
        assert!(!store.key_exists(r"HKCU\A\B").await.unwrap());
        assert!(store.key_exists("HKCU").await.unwrap());
        assert!(store.delete_key(r"HKCU\A").await.is_err());
    }

    #[tokio::test]
    async fn test_delete_value() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRegistryStore::new(dir.path().join("registry.json"));
        store.set_value(r"HKCU\App", "Version", "1.0").await.unwrap();

        store.delete_value(r"HKCU\App", "Version").await.unwrap();
        store.delete_value(r"HKCU\App", "Version").await.unwrap();
        assert_eq!(store.get_value(r"HKCU\App", "Version").await.unwrap(), None);
        assert!(store.delete_value(r"HKCU\Missing", "Version").await.is_err());
    }

    #[tokio::test]
    async fn test_empty_path_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRegistryStore::new(dir.path().join("registry.json"));
        assert!(store.create_key(r"\\").await.is_err());
    }
}
