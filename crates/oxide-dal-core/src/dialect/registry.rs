//! Dialect registry keyed by name.

use std::collections::BTreeMap;

use super::{Dialect, GENERIC, MYSQL, POSTGRES, SQLITE};
use crate::error::RegistryError;

/// Registered dialects.
#[derive(Debug, Clone, Default)]
pub struct DialectRegistry {
    dialects: BTreeMap<&'static str, &'static Dialect>,
}

impl DialectRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in dialects.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut dialects = BTreeMap::new();
        for dialect in [&SQLITE, &POSTGRES, &MYSQL, &GENERIC] {
            dialects.insert(dialect.name, dialect);
        }
        Self { dialects }
    }

    /// Registers a dialect.
    ///
    /// # Errors
    ///
    /// Fails if the name is taken or the dialect's quoting is misconfigured.
    pub fn register(&mut self, dialect: &'static Dialect) -> Result<(), RegistryError> {
        if self.dialects.contains_key(dialect.name) {
            return Err(RegistryError::Duplicate(dialect.name.to_string()));
        }
        dialect.validate()?;
        self.dialects.insert(dialect.name, dialect);
        Ok(())
    }

    /// Looks up a dialect by name. `postgresql` and `mariadb` are accepted as
    /// aliases.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Unknown`] if no such dialect is registered.
    pub fn get(&self, name: &str) -> Result<&'static Dialect, RegistryError> {
        let key = match name {
            "postgresql" => "postgres",
            "mariadb" => "mysql",
            other => other,
        };
        self.dialects
            .get(key)
            .copied()
            .ok_or_else(|| RegistryError::Unknown(name.to_string()))
    }

    /// Picks the dialect for a connection URL from its scheme.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Unknown`] for unrecognized schemes.
    pub fn for_url(&self, url: &str) -> Result<&'static Dialect, RegistryError> {
        let scheme = url.split(':').next().unwrap_or_default();
        self.get(scheme)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.dialects.keys().copied()
    }
}
