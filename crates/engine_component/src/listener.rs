//! Lifecycle events and the per-type listener table.
//!
//! Listeners are registered against a single [`ComponentType`] and receive a
//! [`LifecycleEvent`] whenever a component of that type is added to or removed
//! from an entity, or an entity carrying it is destroyed.
//!
//! ## Delivery
//!
//! Delivery is synchronous on the thread that performed the mutation, after
//! the association index lock has been released and before the mutating call
//! returns. Listeners may query or mutate the registry from inside a callback.
//! Because the lock is released first, another thread's mutation can land
//! between the index update and the callback: an `Added` event may arrive
//! after the component has already been detached again.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::component::ComponentType;
use crate::entity::Entity;

/// A change to the association between an entity and a component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// A component was attached (or replaced).
    Added {
        entity: Entity,
        component_type: ComponentType,
    },
    /// A component was detached from a live entity.
    Removed {
        entity: Entity,
        component_type: ComponentType,
    },
    /// An entity carrying this component type was destroyed.
    Destroyed {
        entity: Entity,
        component_type: ComponentType,
    },
}

impl LifecycleEvent {
    /// The entity the event concerns.
    #[must_use]
    pub fn entity(&self) -> Entity {
        match *self {
            Self::Added { entity, .. }
            | Self::Removed { entity, .. }
            | Self::Destroyed { entity, .. } => entity,
        }
    }

    /// The component type the event concerns.
    #[must_use]
    pub fn component_type(&self) -> ComponentType {
        match *self {
            Self::Added { component_type, .. }
            | Self::Removed { component_type, .. }
            | Self::Destroyed { component_type, .. } => component_type,
        }
    }
}

/// An observer of [`LifecycleEvent`]s for one component type.
///
/// Closures taking `&LifecycleEvent` implement this trait.
pub trait Listener: Send + Sync {
    fn on_event(&self, event: &LifecycleEvent);
}

impl<F> Listener for F
where
    F: Fn(&LifecycleEvent) + Send + Sync,
{
    fn on_event(&self, event: &LifecycleEvent) {
        self(event);
    }
}

/// Handle returned by listener registration, used to remove the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

type Registered = (ListenerId, Arc<dyn Listener>);

/// Listener table keyed by component type.
///
/// Backed by a sharded map, so registering or removing a listener for one
/// type does not contend with delivery to listeners of an unrelated type.
#[derive(Default)]
pub struct Listeners {
    last_id: AtomicU64,
    by_type: DashMap<ComponentType, Vec<Registered>>,
}

impl Listeners {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for events on `component_type`.
    pub fn register(&self, component_type: ComponentType, listener: Arc<dyn Listener>) -> ListenerId {
        let id = ListenerId(self.last_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.by_type
            .entry(component_type)
            .or_default()
            .push((id, listener));
        id
    }

    /// Remove a listener. Returns `false` if it was not registered for that type.
    pub fn remove(&self, component_type: ComponentType, id: ListenerId) -> bool {
        let (removed, now_empty) = match self.by_type.get_mut(&component_type) {
            Some(mut list) => {
                let before = list.len();
                list.retain(|(existing, _)| *existing != id);
                (list.len() != before, list.is_empty())
            }
            None => return false,
        };
        if now_empty {
            self.by_type
                .remove_if(&component_type, |_, list| list.is_empty());
        }
        removed
    }

    /// Number of listeners registered for `component_type`.
    #[must_use]
    pub fn count(&self, component_type: ComponentType) -> usize {
        self.by_type
            .get(&component_type)
            .map_or(0, |list| list.len())
    }

    /// Deliver `event` to every listener of its component type.
    ///
    /// The listener list is copied out before any callback runs, so callbacks
    /// may register or remove listeners themselves.
    pub fn notify(&self, event: &LifecycleEvent) {
        let targets: Vec<Arc<dyn Listener>> = match self.by_type.get(&event.component_type()) {
            Some(list) => list.iter().map(|(_, l)| Arc::clone(l)).collect(),
            None => return,
        };
        for listener in targets {
            listener.on_event(event);
        }
    }
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners")
            .field("types", &self.by_type.len())
            .finish_non_exhaustive()
    }
}
