//! The component registry: shared, lock-protected association index plus
//! lifecycle notification.
//!
//! All mutation goes through [`ComponentRegistry::create_entity`],
//! [`ComponentRegistry::attach`], [`ComponentRegistry::detach`] and
//! [`ComponentRegistry::destroy_entity`], each of which takes the index write
//! lock exactly once, so the two directions of the index can never be
//! observed half-updated. Queries take
//! the read lock and may run concurrently with each other.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use crate::component::{Component, ComponentInstance, ComponentType, ComponentTypeAllocator};
use crate::entity::{Entity, EntityAllocator};
use crate::index::{AssociationIndex, Attach};
use crate::listener::{LifecycleEvent, Listener, ListenerId, Listeners};

/// Issues entity ids and component types, and tracks which entities carry
/// which components.
///
/// Every entity manager sharing a registry draws ids from the same
/// allocator, so an id is never handed out twice.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    entities: EntityAllocator,
    types: ComponentTypeAllocator,
    index: RwLock<AssociationIndex>,
    listeners: Listeners,
}

impl ComponentRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh component type. Safe from any number of threads.
    pub fn allocate_component_type(&self) -> ComponentType {
        self.types.allocate()
    }

    /// Allocate a fresh entity and register it as live with no components.
    pub fn create_entity(&self) -> Entity {
        let entity = self.entities.allocate();
        self.index.write().insert_entity(entity);
        entity
    }

    /// Number of entities ever created through this registry.
    #[must_use]
    pub fn created_count(&self) -> u64 {
        self.entities.count()
    }

    /// Track an externally chosen id as live.
    #[cfg(test)]
    pub(crate) fn insert_entity(&self, entity: Entity) -> bool {
        self.index.write().insert_entity(entity)
    }

    /// Drop `entity` and all of its associations in one step, then deliver
    /// one [`LifecycleEvent::Destroyed`] per held type to that type's
    /// listeners. No [`LifecycleEvent::Removed`] events are sent.
    ///
    /// Returns the component types it carried, or `None` if it was not live.
    pub fn destroy_entity(&self, entity: Entity) -> Option<Vec<ComponentType>> {
        let types = self.index.write().remove_entity(entity)?;
        for &component_type in &types {
            self.listeners.notify(&LifecycleEvent::Destroyed {
                entity,
                component_type,
            });
        }
        Some(types)
    }

    /// Returns `true` if `entity` is live.
    #[must_use]
    pub fn contains_entity(&self, entity: Entity) -> bool {
        self.index.read().contains_entity(entity)
    }

    /// Number of live entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.index.read().entity_count()
    }

    /// Associate `instance` with `entity` under `component_type`.
    ///
    /// Re-attaching the same type replaces the previous instance, which is
    /// handed back in [`Attach::Replaced`]. Listeners of `component_type`
    /// receive [`LifecycleEvent::Added`] once the index is updated.
    pub fn attach<C: Component>(&self, entity: Entity, component_type: ComponentType, instance: C) -> Attach {
        let instance = ComponentInstance::new(component_type, instance);
        let outcome = self.index.write().attach(entity, instance);

        if outcome.is_attached() {
            trace!(%entity, %component_type, "component attached");
            self.listeners.notify(&LifecycleEvent::Added {
                entity,
                component_type,
            });
        } else {
            trace!(%entity, %component_type, "attach ignored");
        }
        outcome
    }

    /// Remove the `component_type` association from `entity`.
    ///
    /// A missing association is a no-op returning `None`. Listeners receive
    /// [`LifecycleEvent::Removed`] only when something was removed.
    pub fn detach(&self, entity: Entity, component_type: ComponentType) -> Option<ComponentInstance> {
        let removed = self.index.write().detach(entity, component_type)?;
        trace!(%entity, %component_type, "component detached");
        self.listeners.notify(&LifecycleEvent::Removed {
            entity,
            component_type,
        });
        Some(removed)
    }

    /// Entities carrying any of `types`.
    ///
    /// Each entity is reported once even if it carries several of the
    /// requested types. The result is a single consistent snapshot of the
    /// index; order is unspecified.
    #[must_use]
    pub fn entities_with(&self, types: &[ComponentType]) -> Vec<Entity> {
        let index = self.index.read();
        match types {
            [] => Vec::new(),
            [single] => index.entities_with(*single).collect(),
            many => {
                let mut entities: Vec<Entity> = many
                    .iter()
                    .flat_map(|ty| index.entities_with(*ty))
                    .collect();
                entities.sort_unstable();
                entities.dedup();
                entities
            }
        }
    }

    /// Number of entities carrying `component_type`.
    #[must_use]
    pub fn count_with(&self, component_type: ComponentType) -> usize {
        self.index.read().count_with(component_type)
    }

    /// All component instances on `entity`; empty if unknown or bare.
    #[must_use]
    pub fn components_of(&self, entity: Entity) -> Vec<ComponentInstance> {
        self.index.read().components_of(entity)
    }

    /// The instance of `component_type` on `entity`, if any.
    #[must_use]
    pub fn component_of(&self, entity: Entity, component_type: ComponentType) -> Option<ComponentInstance> {
        self.index
            .read()
            .component_of(entity, component_type)
            .cloned()
    }

    /// Typed shortcut for [`ComponentRegistry::component_of`].
    #[must_use]
    pub fn get<C: Component>(&self, entity: Entity, component_type: ComponentType) -> Option<Arc<C>> {
        self.component_of(entity, component_type)?.downcast::<C>()
    }

    /// Returns `true` if `entity` carries `component_type`.
    #[must_use]
    pub fn has_component(&self, entity: Entity, component_type: ComponentType) -> bool {
        self.index
            .read()
            .component_of(entity, component_type)
            .is_some()
    }

    /// Register a listener for events on `component_type`.
    pub fn register_interest(&self, component_type: ComponentType, listener: Arc<dyn Listener>) -> ListenerId {
        self.listeners.register(component_type, listener)
    }

    /// Remove a listener. Removing one that is not registered is a no-op.
    pub fn remove_interest(&self, component_type: ComponentType, id: ListenerId) -> bool {
        self.listeners.remove(component_type, id)
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;

    #[derive(Debug, PartialEq)]
    struct Tag(u32);

    impl Component for Tag {}

    fn live(registry: &ComponentRegistry, ids: &[u64]) {
        for &id in ids {
            registry.insert_entity(Entity(id));
        }
    }

    fn sorted(mut v: Vec<Entity>) -> Vec<Entity> {
        v.sort();
        v
    }

    #[test]
    fn test_attach_then_query() {
        let registry = ComponentRegistry::new();
        let ty = registry.allocate_component_type();
        live(&registry, &[1, 2]);

        registry.attach(Entity(1), ty, Tag(1));
        assert_eq!(registry.entities_with(&[ty]), vec![Entity(1)]);

        registry.attach(Entity(2), ty, Tag(2));
        assert_eq!(sorted(registry.entities_with(&[ty])), vec![Entity(1), Entity(2)]);
        assert_eq!(registry.get::<Tag>(Entity(2), ty).as_deref(), Some(&Tag(2)));
    }

    #[test]
    fn test_last_operation_wins() {
        let registry = ComponentRegistry::new();
        let ty = registry.allocate_component_type();
        live(&registry, &[1]);

        let ops = [true, true, false, true, false, false, true];
        for attach in ops {
            if attach {
                registry.attach(Entity(1), ty, Tag(0));
            } else {
                registry.detach(Entity(1), ty);
            }
            assert_eq!(registry.entities_with(&[ty]).contains(&Entity(1)), attach);
            assert_eq!(registry.has_component(Entity(1), ty), attach);
        }
    }

    #[test]
    fn test_detach_twice_is_silent() {
        let registry = ComponentRegistry::new();
        let ty = registry.allocate_component_type();
        live(&registry, &[1]);
        registry.attach(Entity(1), ty, Tag(0));

        assert!(registry.detach(Entity(1), ty).is_some());
        assert!(registry.detach(Entity(1), ty).is_none());
        assert!(registry.components_of(Entity(1)).is_empty());
    }

    #[test]
    fn test_unknown_entity_is_empty_not_error() {
        let registry = ComponentRegistry::new();
        let ty = registry.allocate_component_type();

        assert!(registry.components_of(Entity(42)).is_empty());
        assert!(registry.detach(Entity(42), ty).is_none());
        assert!(!registry.attach(Entity(42), ty, Tag(0)).is_attached());
        assert!(registry.entities_with(&[ty]).is_empty());
    }

    #[test]
    fn test_entities_with_union_reports_each_once() {
        let registry = ComponentRegistry::new();
        let a = registry.allocate_component_type();
        let b = registry.allocate_component_type();
        live(&registry, &[1, 2, 3]);

        registry.attach(Entity(1), a, Tag(0));
        registry.attach(Entity(1), b, Tag(0));
        registry.attach(Entity(2), b, Tag(0));

        assert_eq!(registry.entities_with(&[a, b]), vec![Entity(1), Entity(2)]);
        assert!(registry.entities_with(&[]).is_empty());
    }

    #[test]
    fn test_listener_sees_added_and_removed() {
        let registry = ComponentRegistry::new();
        let ty = registry.allocate_component_type();
        let other = registry.allocate_component_type();
        live(&registry, &[1]);

        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        registry.register_interest(ty, Arc::new(move |e: &LifecycleEvent| sink.lock().push(*e)));

        registry.attach(Entity(1), ty, Tag(0));
        registry.attach(Entity(1), other, Tag(0));
        registry.detach(Entity(1), ty);
        registry.detach(Entity(1), ty);

        assert_eq!(
            *log.lock(),
            vec![
                LifecycleEvent::Added {
                    entity: Entity(1),
                    component_type: ty
                },
                LifecycleEvent::Removed {
                    entity: Entity(1),
                    component_type: ty
                },
            ]
        );
    }

    #[test]
    fn test_listener_may_query_registry_during_delivery() {
        let registry = Arc::new(ComponentRegistry::new());
        let ty = registry.allocate_component_type();
        live(&registry, &[1]);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let (reg, sink) = (Arc::clone(&registry), Arc::clone(&seen));
        registry.register_interest(
            ty,
            Arc::new(move |e: &LifecycleEvent| {
                sink.lock().push(reg.has_component(e.entity(), ty));
            }),
        );

        registry.attach(Entity(1), ty, Tag(0));
        assert_eq!(*seen.lock(), vec![true]);
    }

    #[test]
    fn test_concurrent_mutation_keeps_index_consistent() {
        let registry = ComponentRegistry::new();
        let types: Vec<ComponentType> = (0..4).map(|_| registry.allocate_component_type()).collect();
        live(&registry, &(1..=64).collect::<Vec<_>>());

        std::thread::scope(|s| {
            for worker in 0..8u64 {
                let (registry, types) = (&registry, &types);
                s.spawn(move || {
                    for step in 0..500u64 {
                        let entity = Entity((worker * 8 + step) % 64 + 1);
                        let ty = types[(step % 4) as usize];
                        if (step + worker) % 3 == 0 {
                            registry.detach(entity, ty);
                        } else {
                            registry.attach(entity, ty, Tag(step as u32));
                        }
                        let _ = registry.entities_with(&[ty]);
                    }
                });
            }
        });

        registry.index.read().assert_consistent();
        for ty in &types {
            for entity in registry.entities_with(&[*ty]) {
                assert!(registry.has_component(entity, *ty));
            }
        }
    }

    #[test]
    fn test_created_entities_are_unique_across_threads() {
        let registry = ComponentRegistry::new();
        let created: Vec<Entity> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| s.spawn(|| (0..100).map(|_| registry.create_entity()).collect::<Vec<_>>()))
                .collect();
            handles.into_iter().flat_map(|h| h.join().unwrap()).collect()
        });

        let mut ids = created.clone();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 400);
        assert_eq!(registry.created_count(), 400);
        assert_eq!(registry.entity_count(), 400);
        assert!(created.iter().all(|e| e.is_valid() && registry.contains_entity(*e)));
    }

    #[test]
    fn test_destroy_entity_emits_destroyed_only() {
        let registry = ComponentRegistry::new();
        let ty = registry.allocate_component_type();
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        registry.register_interest(ty, Arc::new(move |e: &LifecycleEvent| sink.lock().push(*e)));

        let e = registry.create_entity();
        registry.attach(e, ty, Tag(3));
        log.lock().clear();

        assert_eq!(registry.destroy_entity(e), Some(vec![ty]));
        assert_eq!(registry.destroy_entity(e), None);
        assert_eq!(
            *log.lock(),
            vec![LifecycleEvent::Destroyed {
                entity: e,
                component_type: ty
            }]
        );
        assert!(!registry.contains_entity(e));
        assert_eq!(registry.count_with(ty), 0);
    }
}
