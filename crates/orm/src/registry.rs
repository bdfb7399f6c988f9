//! Unit registry
//!
//! Maps identifiers to constructors for migrations and seeders. The managers
//! only depend on the [`Loader`] trait; [`Registry`] is the in-process table
//! applications fill at startup.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{OrmError, OrmResult};

/// Constructor stored for each identifier
pub type UnitFactory<U> = Arc<dyn Fn() -> Box<U> + Send + Sync>;

/// Resolves identifiers to executable units
pub trait Loader<U: ?Sized>: Send + Sync {
    /// Every identifier this loader can resolve, sorted ascending
    fn identifiers(&self) -> Vec<String>;

    /// Build a fresh unit for `identifier`
    fn load(&self, identifier: &str) -> OrmResult<Box<U>>;
}

/// Identifier → constructor lookup table
pub struct Registry<U: ?Sized> {
    factories: BTreeMap<String, UnitFactory<U>>,
}

impl<U: ?Sized> Registry<U> {
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Register a constructor under `identifier`
    ///
    /// Identifiers must be non-empty, free of whitespace and unique.
    pub fn register<F>(&mut self, identifier: impl Into<String>, factory: F) -> OrmResult<&mut Self>
    where
        F: Fn() -> Box<U> + Send + Sync + 'static,
    {
        let identifier = identifier.into();
        if identifier.is_empty() || identifier.chars().any(char::is_whitespace) {
            return Err(OrmError::Configuration(format!(
                "Invalid unit identifier '{}'",
                identifier
            )));
        }
        if self.factories.contains_key(&identifier) {
            return Err(OrmError::Configuration(format!(
                "Unit '{}' is registered twice",
                identifier
            )));
        }

        self.factories.insert(identifier, Arc::new(factory));
        Ok(self)
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.factories.contains_key(identifier)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl<U: ?Sized> Default for Registry<U> {
    fn default() -> Self {
        Self::new()
    }
}

impl<U: ?Sized> Loader<U> for Registry<U> {
    fn identifiers(&self) -> Vec<String> {
        // BTreeMap iterates in ascending key order
        self.factories.keys().cloned().collect()
    }

    fn load(&self, identifier: &str) -> OrmResult<Box<U>> {
        self.factories
            .get(identifier)
            .map(|factory| factory())
            .ok_or_else(|| OrmError::NotFound(format!("No unit registered for '{}'", identifier)))
    }
}
