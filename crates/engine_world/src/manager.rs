//! Entity lifecycle: creation, destruction, and component attachment.

use std::sync::Arc;

use tracing::{debug, trace};

use engine_component::{
    Attach, Component, ComponentInstance, ComponentRegistry, ComponentType, Entity, Listener,
    ListenerId,
};

/// Entity lifecycle front end over a [`ComponentRegistry`].
///
/// Every method takes `&self`; a manager is shared between concurrently
/// running systems behind an `Arc`. Entity ids come from the registry, so
/// several managers over one registry never hand out the same id.
#[derive(Debug)]
pub struct EntityManager {
    /// The shared id allocators, association index and listener table.
    registry: Arc<ComponentRegistry>,
}

impl EntityManager {
    /// Create a manager with a fresh registry.
    #[must_use]
    pub fn new() -> Self {
        Self::with_registry(Arc::new(ComponentRegistry::new()))
    }

    /// Create a manager over an existing registry.
    #[must_use]
    pub fn with_registry(registry: Arc<ComponentRegistry>) -> Self {
        Self { registry }
    }

    /// The registry this manager delegates to.
    #[must_use]
    pub fn registry(&self) -> &Arc<ComponentRegistry> {
        &self.registry
    }

    /// Allocate a new component type from the shared registry.
    pub fn allocate_component_type(&self) -> ComponentType {
        self.registry.allocate_component_type()
    }

    // -- Entity lifecycle --

    /// Allocate a new entity with no components.
    pub fn create(&self) -> Entity {
        let entity = self.registry.create_entity();
        trace!(%entity, "entity created");
        entity
    }

    /// Destroy an entity and every component association it has.
    ///
    /// The entity is gone from every per-type entity list before this
    /// returns. Each listener of each type it carried then receives one
    /// [`LifecycleEvent::Destroyed`](engine_component::LifecycleEvent::Destroyed).
    /// Destroying an unknown or already destroyed entity is a no-op returning
    /// `false`.
    pub fn destroy(&self, entity: Entity) -> bool {
        let Some(types) = self.registry.destroy_entity(entity) else {
            trace!(%entity, "destroy of unknown entity ignored");
            return false;
        };
        debug!(%entity, components = types.len(), "entity destroyed");
        true
    }

    /// Returns `true` if `entity` has been created and not destroyed.
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.registry.contains_entity(entity)
    }

    /// Number of live entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.registry.entity_count()
    }

    /// Number of entities ever created through the shared registry.
    #[must_use]
    pub fn created_count(&self) -> u64 {
        self.registry.created_count()
    }

    // -- Component operations --

    /// Attach `instance` to `entity` under `component_type`.
    ///
    /// Ignored (returning [`Attach::Ignored`]) if the entity is not alive.
    pub fn add<C: Component>(&self, entity: Entity, component_type: ComponentType, instance: C) -> Attach {
        self.registry.attach(entity, component_type, instance)
    }

    /// Detach `component_type` from `entity`. No-op if absent.
    pub fn remove(&self, entity: Entity, component_type: ComponentType) -> Option<ComponentInstance> {
        self.registry.detach(entity, component_type)
    }

    /// All components on `entity`; empty if unknown.
    #[must_use]
    pub fn components_of(&self, entity: Entity) -> Vec<ComponentInstance> {
        self.registry.components_of(entity)
    }

    /// Number of entities carrying `component_type`.
    #[must_use]
    pub fn count_with(&self, component_type: ComponentType) -> usize {
        self.registry.count_with(component_type)
    }

    /// Entities carrying any of `types`.
    #[must_use]
    pub fn entities_with(&self, types: &[ComponentType]) -> Vec<Entity> {
        self.registry.entities_with(types)
    }

    /// Typed access to one component of one entity.
    #[must_use]
    pub fn get<C: Component>(&self, entity: Entity, component_type: ComponentType) -> Option<Arc<C>> {
        self.registry.get::<C>(entity, component_type)
    }

    // -- Listeners --

    /// Register `listener` for lifecycle events on `component_type`.
    pub fn register_interest(&self, component_type: ComponentType, listener: Arc<dyn Listener>) -> ListenerId {
        let id = self.registry.register_interest(component_type, listener);
        debug!(%component_type, ?id, "listener registered");
        id
    }

    /// Remove a listener. Returns `false` (and does nothing) if it was not
    /// registered for `component_type`.
    pub fn remove_interest(&self, component_type: ComponentType, id: ListenerId) -> bool {
        let removed = self.registry.remove_interest(component_type, id);
        if removed {
            debug!(%component_type, ?id, "listener removed");
        }
        removed
    }
}

impl Default for EntityManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use engine_component::LifecycleEvent;
    use parking_lot::Mutex;

    use super::*;

    #[derive(Debug)]
    struct Shape(&'static str);

    impl Component for Shape {}

    fn recording_listener() -> (Arc<Mutex<Vec<LifecycleEvent>>>, Arc<dyn Listener>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        (log, Arc::new(move |e: &LifecycleEvent| sink.lock().push(*e)))
    }

    #[test]
    fn test_create_is_monotonic() {
        let manager = EntityManager::new();
        let a = manager.create();
        let b = manager.create();
        assert!(a.is_valid());
        assert!(b > a);
        assert!(manager.is_alive(a));
        assert_eq!(manager.entity_count(), 2);
        assert!(manager.components_of(a).is_empty());
    }

    #[test]
    fn test_attach_attach_destroy_scenario() {
        let manager = EntityManager::new();
        let ty = manager.allocate_component_type();
        let e1 = manager.create();
        let e2 = manager.create();

        manager.add(e1, ty, Shape("v1"));
        assert_eq!(manager.entities_with(&[ty]), vec![e1]);

        manager.add(e2, ty, Shape("v2"));
        let mut both = manager.entities_with(&[ty]);
        both.sort();
        assert_eq!(both, vec![e1, e2]);

        assert!(manager.destroy(e1));
        assert_eq!(manager.entities_with(&[ty]), vec![e2]);
    }

    #[test]
    fn test_destroy_clears_every_component() {
        let manager = EntityManager::new();
        let types: Vec<_> = (0..3).map(|_| manager.allocate_component_type()).collect();
        let e = manager.create();
        for ty in &types {
            manager.add(e, *ty, Shape("x"));
        }

        manager.destroy(e);

        assert!(manager.components_of(e).is_empty());
        assert!(!manager.is_alive(e));
        for ty in &types {
            assert!(!manager.entities_with(&[*ty]).contains(&e));
        }
    }

    #[test]
    fn test_double_destroy_is_noop() {
        let manager = EntityManager::new();
        let e = manager.create();
        assert!(manager.destroy(e));
        assert!(!manager.destroy(e));
        assert!(!manager.destroy(Entity::from_raw(12345)));
    }

    #[test]
    fn test_add_after_destroy_is_ignored() {
        let manager = EntityManager::new();
        let ty = manager.allocate_component_type();
        let e = manager.create();
        manager.destroy(e);

        assert!(!manager.add(e, ty, Shape("late")).is_attached());
        assert!(manager.entities_with(&[ty]).is_empty());
    }

    #[test]
    fn test_destroy_notifies_each_listener_once_per_type() {
        let manager = EntityManager::new();
        let ship = manager.allocate_component_type();
        let hull = manager.allocate_component_type();
        let unrelated = manager.allocate_component_type();
        let (ship_log, ship_listener) = recording_listener();
        let (hull_log, hull_listener) = recording_listener();
        let (other_log, other_listener) = recording_listener();
        manager.register_interest(ship, ship_listener);
        manager.register_interest(hull, hull_listener);
        manager.register_interest(unrelated, other_listener);

        let e = manager.create();
        manager.add(e, ship, Shape("ship"));
        manager.add(e, hull, Shape("hull"));
        ship_log.lock().clear();
        hull_log.lock().clear();

        manager.destroy(e);
        manager.destroy(e);

        assert_eq!(
            *ship_log.lock(),
            vec![LifecycleEvent::Destroyed {
                entity: e,
                component_type: ship
            }]
        );
        assert_eq!(hull_log.lock().len(), 1);
        assert!(other_log.lock().is_empty());
    }

    #[test]
    fn test_remove_interest_twice_is_silent() {
        let manager = EntityManager::new();
        let ty = manager.allocate_component_type();
        let (log, listener) = recording_listener();
        let id = manager.register_interest(ty, listener);

        assert!(manager.remove_interest(ty, id));
        assert!(!manager.remove_interest(ty, id));

        let e = manager.create();
        manager.add(e, ty, Shape("quiet"));
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_concurrent_create_and_destroy() {
        let manager = EntityManager::new();
        let ty = manager.allocate_component_type();

        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for i in 0..200 {
                        let e = manager.create();
                        manager.add(e, ty, Shape("churn"));
                        if i % 2 == 0 {
                            manager.destroy(e);
                        }
                    }
                });
            }
        });

        assert_eq!(manager.created_count(), 800);
        assert_eq!(manager.entity_count(), 400);
        assert_eq!(manager.entities_with(&[ty]).len(), 400);
    }

    #[test]
    fn test_managers_sharing_a_registry_never_alias() {
        let registry = Arc::new(ComponentRegistry::new());
        let first = EntityManager::with_registry(Arc::clone(&registry));
        let second = EntityManager::with_registry(Arc::clone(&registry));
        let ty = first.allocate_component_type();

        let mine = first.create();
        first.add(mine, ty, Shape("mine"));
        let theirs = second.create();
        assert_ne!(mine, theirs);

        assert!(second.destroy(theirs));
        assert!(first.is_alive(mine));
        assert_eq!(first.entities_with(&[ty]), vec![mine]);
        assert_eq!(second.count_with(ty), 1);
        assert_eq!(first.created_count(), 2);
        assert_eq!(second.created_count(), 2);
    }
}
