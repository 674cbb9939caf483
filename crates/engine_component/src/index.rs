//! The bidirectional entity ↔ component-type association index.
//!
//! [`AssociationIndex`] is plain single-threaded data; the
//! [`ComponentRegistry`](crate::registry::ComponentRegistry) wraps it in a
//! lock so each operation here is atomic with respect to every other.
//!
//! Invariant: an entity appears in the set for type `T` iff its component
//! slots hold an instance of `T`.

use std::collections::HashMap;

use crate::component::{ComponentInstance, ComponentType};
use crate::entity::Entity;
use crate::slots::{IndexedSet, IndexedSlots};

/// Outcome of attaching a component.
#[derive(Debug, Clone)]
pub enum Attach {
    /// The entity did not carry this type before.
    Added,
    /// The entity already carried this type; the old instance is returned.
    Replaced(ComponentInstance),
    /// The entity is not live (never created, or already destroyed), or the
    /// type was [`ComponentType::NONE`]. Nothing changed.
    Ignored,
}

impl Attach {
    /// Returns `true` if the index now holds the new instance.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        !matches!(self, Self::Ignored)
    }
}

/// Entity → components and type → entities, kept in lock step.
#[derive(Debug, Default)]
pub struct AssociationIndex {
    by_entity: HashMap<Entity, IndexedSlots<ComponentType, ComponentInstance>>,
    by_type: HashMap<ComponentType, IndexedSet<Entity>>,
}

impl AssociationIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `entity` as live with no components.
    ///
    /// Returns `false` if it was already live.
    pub fn insert_entity(&mut self, entity: Entity) -> bool {
        if self.by_entity.contains_key(&entity) {
            return false;
        }
        self.by_entity.insert(entity, IndexedSlots::new());
        true
    }

    /// Stop tracking `entity`, dropping every association it had.
    ///
    /// Returns the component types it carried, or `None` if it was not live.
    pub fn remove_entity(&mut self, entity: Entity) -> Option<Vec<ComponentType>> {
        let mut slots = self.by_entity.remove(&entity)?;
        let types: Vec<ComponentType> = slots.drain().map(|(ty, _)| ty).collect();
        for ty in &types {
            self.unlink(*ty, entity);
        }
        Some(types)
    }

    /// Returns `true` if `entity` is live.
    #[must_use]
    pub fn contains_entity(&self, entity: Entity) -> bool {
        self.by_entity.contains_key(&entity)
    }

    /// Number of live entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.by_entity.len()
    }

    /// Associate `instance` with `entity` under the instance's type.
    pub fn attach(&mut self, entity: Entity, instance: ComponentInstance) -> Attach {
        let ty = instance.component_type();
        if !ty.is_valid() {
            return Attach::Ignored;
        }
        let Some(slots) = self.by_entity.get_mut(&entity) else {
            return Attach::Ignored;
        };
        match slots.insert(ty, instance) {
            Some(previous) => Attach::Replaced(previous),
            None => {
                self.by_type.entry(ty).or_default().add(entity);
                Attach::Added
            }
        }
    }

    /// Remove the `component_type` association from `entity`, if any.
    pub fn detach(&mut self, entity: Entity, component_type: ComponentType) -> Option<ComponentInstance> {
        let removed = self
            .by_entity
            .get_mut(&entity)
            .and_then(|slots| slots.remove(&component_type))?;
        self.unlink(component_type, entity);
        Some(removed)
    }

    /// Entities currently carrying `component_type`.
    pub fn entities_with(&self, component_type: ComponentType) -> impl Iterator<Item = Entity> + '_ {
        self.by_type
            .get(&component_type)
            .into_iter()
            .flat_map(|set| set.keys())
    }

    /// Number of entities currently carrying `component_type`.
    #[must_use]
    pub fn count_with(&self, component_type: ComponentType) -> usize {
        self.by_type.get(&component_type).map_or(0, |set| set.len())
    }

    /// All component instances on `entity`; empty if unknown.
    #[must_use]
    pub fn components_of(&self, entity: Entity) -> Vec<ComponentInstance> {
        self.by_entity
            .get(&entity)
            .map(|slots| slots.values().cloned().collect())
            .unwrap_or_default()
    }

    /// The instance of `component_type` on `entity`, if any.
    #[must_use]
    pub fn component_of(&self, entity: Entity, component_type: ComponentType) -> Option<&ComponentInstance> {
        self.by_entity.get(&entity)?.get(&component_type)
    }

    fn unlink(&mut self, component_type: ComponentType, entity: Entity) {
        if let Some(set) = self.by_type.get_mut(&component_type) {
            set.remove(&entity);
            if set.is_empty() {
                self.by_type.remove(&component_type);
            }
        }
    }

    /// Panics if the two directions disagree.
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        for (entity, slots) in &self.by_entity {
            for ty in slots.keys() {
                assert!(
                    self.by_type.get(&ty).is_some_and(|set| set.contains(entity)),
                    "{entity} holds {ty} but is missing from its entity set"
                );
            }
        }
        for (ty, set) in &self.by_type {
            assert!(!set.is_empty(), "{ty} kept an empty entity set");
            for entity in set.keys() {
                assert!(
                    self.by_entity
                        .get(&entity)
                        .is_some_and(|slots| slots.contains(ty)),
                    "{entity} is listed under {ty} but does not hold it"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::component::Component;

    use super::*;

    #[derive(Debug)]
    struct Marker(u32);

    impl Component for Marker {}

    fn instance(ty: u64, tag: u32) -> ComponentInstance {
        ComponentInstance::new(ComponentType(ty), Marker(tag))
    }

    fn sorted(iter: impl Iterator<Item = Entity>) -> Vec<Entity> {
        let mut v: Vec<_> = iter.collect();
        v.sort();
        v
    }

    #[test]
    fn test_attach_requires_live_entity() {
        let mut index = AssociationIndex::new();
        assert!(!index.attach(Entity(1), instance(1, 0)).is_attached());
        assert_eq!(index.count_with(ComponentType(1)), 0);

        index.insert_entity(Entity(1));
        assert!(matches!(index.attach(Entity(1), instance(1, 0)), Attach::Added));
        index.assert_consistent();
    }

    #[test]
    fn test_attach_none_type_is_ignored() {
        let mut index = AssociationIndex::new();
        index.insert_entity(Entity(1));
        assert!(!index.attach(Entity(1), instance(0, 0)).is_attached());
        assert!(index.components_of(Entity(1)).is_empty());
    }

    #[test]
    fn test_reattach_replaces() {
        let mut index = AssociationIndex::new();
        index.insert_entity(Entity(1));
        index.attach(Entity(1), instance(1, 10));

        let Attach::Replaced(old) = index.attach(Entity(1), instance(1, 20)) else {
            panic!("expected replacement");
        };
        assert_eq!(old.downcast_ref::<Marker>().map(|m| m.0), Some(10));
        assert_eq!(index.components_of(Entity(1)).len(), 1);
        assert_eq!(index.count_with(ComponentType(1)), 1);
        index.assert_consistent();
    }

    #[test]
    fn test_detach_both_directions() {
        let mut index = AssociationIndex::new();
        for e in 1..=3 {
            index.insert_entity(Entity(e));
            index.attach(Entity(e), instance(1, 0));
            index.attach(Entity(e), instance(2, 0));
        }

        assert!(index.detach(Entity(2), ComponentType(1)).is_some());
        assert!(index.detach(Entity(2), ComponentType(1)).is_none());

        assert_eq!(
            sorted(index.entities_with(ComponentType(1))),
            vec![Entity(1), Entity(3)]
        );
        assert_eq!(index.components_of(Entity(2)).len(), 1);
        index.assert_consistent();
    }

    #[test]
    fn test_remove_entity_clears_every_type() {
        let mut index = AssociationIndex::new();
        index.insert_entity(Entity(1));
        index.insert_entity(Entity(2));
        index.attach(Entity(1), instance(1, 0));
        index.attach(Entity(1), instance(2, 0));
        index.attach(Entity(2), instance(2, 0));

        let mut types = index.remove_entity(Entity(1)).unwrap();
        types.sort();
        assert_eq!(types, vec![ComponentType(1), ComponentType(2)]);
        assert_eq!(index.count_with(ComponentType(1)), 0);
        assert_eq!(sorted(index.entities_with(ComponentType(2))), vec![Entity(2)]);
        assert!(index.components_of(Entity(1)).is_empty());
        assert!(index.remove_entity(Entity(1)).is_none());
        index.assert_consistent();
    }

    #[test]
    fn test_interleaved_churn_stays_consistent() {
        let mut index = AssociationIndex::new();
        for e in 1..=20 {
            index.insert_entity(Entity(e));
        }
        for step in 0u64..400 {
            let entity = Entity(step % 20 + 1);
            let ty = ComponentType(step % 7 + 1);
            if step % 3 == 0 {
                index.detach(entity, ty);
            } else {
                index.attach(entity, instance(ty.id(), 0));
            }
            if step % 50 == 49 {
                index.remove_entity(entity);
                index.insert_entity(entity);
            }
        }
        index.assert_consistent();
    }
}
