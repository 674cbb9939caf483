//! # engine_component
//!
//! The "E" and "C" in ECS: entity identity, component identity, and the
//! shared index of which entities carry which components.
//!
//! This crate provides:
//!
//! - [`Entity`] / [`EntityAllocator`]: never-recycled `u64` entity identifiers.
//! - [`ComponentType`]: registry-issued component type identifiers.
//! - [`Component`]: the compile-time capability every attached value needs.
//! - [`AssociationIndex`]: the bidirectional entity ↔ type index.
//! - [`ComponentRegistry`]: the lock-protected index plus listener fan-out.
//! - [`Listener`] / [`LifecycleEvent`]: lifecycle notifications.

pub mod component;
pub mod entity;
pub mod index;
pub mod listener;
pub mod registry;
pub mod slots;

pub use component::{Component, ComponentInstance, ComponentType, ComponentTypeAllocator};
pub use entity::{Entity, EntityAllocator};
pub use index::{AssociationIndex, Attach};
pub use listener::{LifecycleEvent, Listener, ListenerId, Listeners};
pub use registry::ComponentRegistry;
pub use slots::{IndexedSet, IndexedSlots};
