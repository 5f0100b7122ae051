//! Name-to-factory lookup for transfer providers

use crate::{LocalDirectoryProvider, ProviderSettings, TransferProvider};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use updkit_errors::{Error, PublishError};

/// Builds a provider from its settings
pub type ProviderFactory =
    Arc<dyn Fn(ProviderSettings) -> Result<Box<dyn TransferProvider>, Error> + Send + Sync>;

/// Registered transfer providers
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    factories: BTreeMap<String, ProviderFactory>,
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .finish()
    }
}

impl ProviderRegistry {
    /// An empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the providers shipped with updkit
    #[must_use]
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(LocalDirectoryProvider::NAME, |settings| {
            Ok(Box::new(LocalDirectoryProvider::new(settings)?) as Box<dyn TransferProvider>)
        });
        registry
    }

    /// Register `factory` under `name`, replacing any previous entry
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(ProviderSettings) -> Result<Box<dyn TransferProvider>, Error> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Instantiate the provider registered under `name`
    ///
    /// # Errors
    ///
    /// Returns `PublishError::UnknownProvider` for unregistered names, or the
    /// factory's error.
    pub fn create(
        &self,
        name: &str,
        settings: ProviderSettings,
    ) -> Result<Box<dyn TransferProvider>, Error> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| PublishError::UnknownProvider {
                name: name.to_string(),
            })?;
        factory(settings)
    }
}
