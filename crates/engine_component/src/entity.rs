//! Entity type and allocation utilities.
//!
//! An [`Entity`] is a lightweight `u64` identifier with no inherent data.
//! Identifiers are handed out by a single [`EntityAllocator`] and are never
//! recycled, so a stale handle can never alias a newer entity.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// A unique entity identifier.
///
/// Entities are pure identifiers; they carry no data of their own. Components
/// are associated with entities to give them meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Entity(pub u64);

impl Entity {
    /// The null / invalid entity sentinel.
    pub const INVALID: Entity = Entity(0);

    /// Create an entity from a raw `u64` identifier.
    #[must_use]
    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw `u64` identifier.
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }

    /// Returns `true` if this is a valid (non-zero) entity.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Entity({})", self.0)
    }
}

/// Allocates monotonically increasing entity IDs.
///
/// Allocation is a single atomic increment, so any number of threads may
/// create entities at once without coordination.
#[derive(Debug)]
pub struct EntityAllocator {
    last_id: AtomicU64,
}

impl EntityAllocator {
    /// Creates a new allocator. IDs start at 1 (0 is reserved for [`Entity::INVALID`]).
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last_id: AtomicU64::new(0),
        }
    }

    /// Allocates a fresh entity ID.
    pub fn allocate(&self) -> Entity {
        Entity(self.last_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Returns the number of entities allocated so far.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.last_id.load(Ordering::Relaxed)
    }
}

impl Default for EntityAllocator {
    fn default() -> Self {
        Self::new()
    }
}
