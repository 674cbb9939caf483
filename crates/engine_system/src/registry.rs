//! System registry: tracks registered systems by name.
//!
//! Registration is where the dependency graph is validated: a system may only
//! name dependencies that are already registered. Since a name must exist
//! before anything can depend on it, no registration order can produce a
//! cycle.

use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::error::ScheduleError;
use crate::system::{System, SystemEntry};

/// Result of a successful [`SystemRegistry::register`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// The system was added.
    Registered,
    /// A system with the same name was already registered. The new one was
    /// dropped and the existing one kept.
    Duplicate,
}

/// Registry of all systems known to a scheduler, keyed by name.
#[derive(Debug, Default)]
pub struct SystemRegistry {
    systems: BTreeMap<String, SystemEntry>,
}

impl SystemRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            systems: BTreeMap::new(),
        }
    }

    /// Register a system.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::MissingDependency`] if any dependency is not
    /// registered yet; the system is not added.
    pub fn register(&mut self, system: Box<dyn System>) -> Result<Registration, ScheduleError> {
        let entry = SystemEntry::new(system);

        if let Some(missing) = entry
            .dependencies()
            .iter()
            .find(|dep| !self.systems.contains_key(dep.as_str()))
        {
            return Err(ScheduleError::MissingDependency {
                system: entry.name().to_string(),
                dependency: missing.clone(),
            });
        }

        if self.systems.contains_key(entry.name()) {
            warn!(system = entry.name(), "could not add system: already registered");
            return Ok(Registration::Duplicate);
        }

        info!(
            system = entry.name(),
            dependencies = ?entry.dependencies(),
            "system registered"
        );
        self.systems.insert(entry.name().to_string(), entry);
        Ok(Registration::Registered)
    }

    /// Remove a system by name.
    ///
    /// Dependents are not checked; any that remain are logged and will never
    /// become ready until the name is registered again.
    pub fn unregister(&mut self, name: &str) -> Option<SystemEntry> {
        let removed = self.systems.remove(name)?;
        let dependents = self.dependents_of(name);
        if dependents.is_empty() {
            info!(system = name, "system unregistered");
        } else {
            warn!(
                system = name,
                ?dependents,
                "system unregistered while other systems still depend on it"
            );
        }
        Some(removed)
    }

    /// Names of registered systems that list `name` as a direct dependency.
    #[must_use]
    pub fn dependents_of(&self, name: &str) -> Vec<String> {
        self.systems
            .values()
            .filter(|entry| entry.dependencies().iter().any(|dep| dep == name))
            .map(|entry| entry.name().to_string())
            .collect()
    }

    /// Returns the entry for a system by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SystemEntry> {
        self.systems.get(name)
    }

    /// Returns `true` if a system with this name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.systems.contains_key(name)
    }

    /// Returns an iterator over all registered systems, ordered by name.
    pub fn iter(&self) -> impl Iterator<Item = &SystemEntry> {
        self.systems.values()
    }

    /// Clone every entry. Clones share the underlying systems.
    #[must_use]
    pub fn snapshot(&self) -> Vec<SystemEntry> {
        self.systems.values().cloned().collect()
    }

    /// Returns the number of registered systems.
    #[must_use]
    pub fn len(&self) -> usize {
        self.systems.len()
    }

    /// Returns `true` if no systems are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }
}
