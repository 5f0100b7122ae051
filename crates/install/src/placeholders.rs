//! `%name%` path placeholders in operation targets

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use updkit_errors::{Error, InstallError};

/// Named directories substituted into operation targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPlaceholders {
    values: BTreeMap<String, PathBuf>,
}

impl PathPlaceholders {
    /// Placeholders for `program` and the current user's standard directories
    ///
    /// Provides `%program%`, `%appdata%`, `%temp%` and `%desktop%`.
    #[must_use]
    pub fn for_program(program: impl Into<PathBuf>) -> Self {
        let home = dirs::home_dir().unwrap_or_else(std::env::temp_dir);
        let appdata = dirs::data_dir().unwrap_or_else(|| home.clone());
        let desktop = dirs::desktop_dir().unwrap_or_else(|| home.join("Desktop"));

        Self::empty()
            .with("program", program)
            .with("appdata", appdata)
            .with("temp", std::env::temp_dir())
            .with("desktop", desktop)
    }

    #[must_use]
    pub fn empty() -> Self {
        Self {
            values: BTreeMap::new(),
        }
    }

    /// Add or replace a placeholder; names are case-insensitive
    #[must_use]
    pub fn with(mut self, name: &str, path: impl Into<PathBuf>) -> Self {
        self.values.insert(name.to_ascii_lowercase(), path.into());
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Path> {
        self.values.get(&name.to_ascii_lowercase()).map(PathBuf::as_path)
    }

    /// Replace every `%name%` in `input`
    ///
    /// A `%` that does not start a well-formed name is kept literally.
    ///
    /// # Errors
    ///
    /// Returns `InstallError::UnknownPlaceholder` for a well-formed name
    /// that is not defined.
    pub fn expand(&self, input: &str) -> Result<PathBuf, Error> {
        let mut output = String::with_capacity(input.len());
        let mut rest = input;

        while let Some(start) = rest.find('%') {
            output.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            let name = after
                .find('%')
                .map(|end| &after[..end])
                .filter(|name| is_placeholder_name(name));

            match name {
                Some(name) => {
                    let value = self.get(name).ok_or_else(|| InstallError::UnknownPlaceholder {
                        placeholder: format!("%{name}%"),
                    })?;
                    output.push_str(&value.to_string_lossy());
                    rest = &after[name.len() + 1..];
                }
                None => {
                    output.push('%');
                    rest = after;
                }
            }
        }
        output.push_str(rest);

        Ok(PathBuf::from(output))
    }
}

fn is_placeholder_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn placeholders() -> PathPlaceholders {
        PathPlaceholders::empty()
            .with("program", "/opt/app")
            .with("temp", "/tmp")
    }

    #[test]
    fn test_expands_known_names() {
        let p = placeholders();
        assert_eq!(
            p.expand("%program%/bin").unwrap(),
            PathBuf::from("/opt/app/bin")
        );
        assert_eq!(
            p.expand("%PROGRAM%/%temp%").unwrap(),
            PathBuf::from("/opt/app//tmp")
        );
        assert_eq!(p.expand("plain/path").unwrap(), PathBuf::from("plain/path"));
    }

    #[test]
    fn test_stray_percent_is_literal() {
        let p = placeholders();
        assert_eq!(p.expand("100%").unwrap(), PathBuf::from("100%"));
        assert_eq!(
            p.expand("a % b %program%").unwrap(),
            PathBuf::from("a % b /opt/app")
        );
    }

    #[test]
    fn test_unknown_name_fails() {
        assert!(matches!(
            placeholders().expand("%desktop%/x"),
            Err(Error::Install(InstallError::UnknownPlaceholder { .. }))
        ));
    }

    #[test]
    fn test_standard_set() {
        let p = PathPlaceholders::for_program("/opt/app");
        for name in ["program", "appdata", "temp", "desktop"] {
            assert!(p.get(name).is_some(), "{name} missing");
        }
    }
}
