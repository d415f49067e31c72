//! Name to factory maps for pluggable backends.
//!
//! A [`Registry`] is filled once at start-up and only read afterwards. It is
//! shared behind an `Arc` with no interior mutability, so concurrent lookups
//! need no locking.

use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("cannot register a {domain} backend with an empty type name")]
    EmptyName { domain: &'static str },

    #[error("{domain} backend type '{name}' is already registered")]
    Duplicate { domain: &'static str, name: String },
}

/// Factories for one backend domain (databases, storages or notifiers)
pub struct Registry<F> {
    domain: &'static str,
    factories: BTreeMap<String, F>,
}

impl<F> Registry<F> {
    pub fn new(domain: &'static str) -> Self {
        Self {
            domain,
            factories: BTreeMap::new(),
        }
    }

    /// Register `factory` under `name`.
    ///
    /// A name may be registered only once; a second registration is rejected
    /// instead of replacing the first.
    pub fn register(&mut self, name: &str, factory: F) -> Result<(), RegistryError> {
        if name.trim().is_empty() {
            return Err(RegistryError::EmptyName {
                domain: self.domain,
            });
        }
        if self.factories.contains_key(name) {
            return Err(RegistryError::Duplicate {
                domain: self.domain,
                name: name.to_string(),
            });
        }

        debug!("Registered {} backend: {}", self.domain, name);
        self.factories.insert(name.to_string(), factory);
        Ok(())
    }

    /// Look up the factory for `name`; `None` when the type is unknown
    pub fn get(&self, name: &str) -> Option<&F> {
        self.factories.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered type names, sorted
    pub fn list_types(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn domain(&self) -> &'static str {
        self.domain
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl<F> std::fmt::Debug for Registry<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("domain", &self.domain)
            .field("types", &self.list_types())
            .finish()
    }
}
