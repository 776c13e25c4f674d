//! Scene storage: entities, their components, and the identity counter

use crate::{Actions, Components, Counter, CustomComponent, EntityId, Error, Result, States, Triggers};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A component kind the scene stores in a typed slot
pub trait Component: Clone + Sized {
    /// Short name used in log output
    const NAME: &'static str;

    /// Borrow this component from an entity's component set
    fn get(components: &Components) -> Option<&Self>;

    /// The slot holding this component in an entity's component set
    fn slot(components: &mut Components) -> &mut Option<Self>;
}

macro_rules! impl_component {
    ($ty:ty, $field:ident, $name:literal) => {
        impl Component for $ty {
            const NAME: &'static str = $name;

            fn get(components: &Components) -> Option<&Self> {
                components.$field.as_ref()
            }

            fn slot(components: &mut Components) -> &mut Option<Self> {
                &mut components.$field
            }
        }
    };
}

impl_component!(Actions, actions, "Actions");
impl_component!(Triggers, triggers, "Triggers");
impl_component!(States, states, "States");
impl_component!(Counter, counter, "Counter");

/// Storage for every entity in a scene
///
/// Stands in for the host engine's entity-component store. Iteration order
/// is entity creation order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    /// All entities by ID
    entities: IndexMap<EntityId, Components>,
    /// Next entity ID to assign
    next_entity: u64,
}

impl Scene {
    /// Create a scene holding only the root entity and its identity counter
    pub fn new() -> Self {
        let mut entities = IndexMap::new();
        entities.insert(
            EntityId::ROOT,
            Components {
                counter: Some(Counter { id: 0, value: 0 }),
                ..Components::default()
            },
        );
        Self {
            entities,
            next_entity: 1,
        }
    }

    /// Add a new, empty entity
    pub fn add_entity(&mut self) -> EntityId {
        self.spawn(Components::default())
    }

    /// Add a new entity carrying the given components
    pub fn spawn(&mut self, components: Components) -> EntityId {
        let id = EntityId::new(self.next_entity);
        self.next_entity += 1;
        self.entities.insert(id, components);
        id
    }

    /// Remove an entity and return its components
    pub fn remove_entity(&mut self, id: EntityId) -> Option<Components> {
        self.entities.shift_remove(&id)
    }

    /// Check if an entity exists
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Get all of an entity's components
    pub fn components(&self, id: EntityId) -> Option<&Components> {
        self.entities.get(&id)
    }

    /// Get all of an entity's components mutably
    pub fn components_mut(&mut self, id: EntityId) -> Option<&mut Components> {
        self.entities.get_mut(&id)
    }

    /// Get a component
    pub fn get<C: Component>(&self, id: EntityId) -> Option<&C> {
        self.entities.get(&id).and_then(C::get)
    }

    /// Get a component mutably
    pub fn get_mut<C: Component>(&mut self, id: EntityId) -> Option<&mut C> {
        self.entities
            .get_mut(&id)
            .and_then(|components| C::slot(components).as_mut())
    }

    /// Check if an entity carries a component
    pub fn has<C: Component>(&self, id: EntityId) -> bool {
        self.get::<C>(id).is_some()
    }

    /// Write a component, replacing any previous value
    pub fn create_or_replace<C: Component>(&mut self, id: EntityId, value: C) -> Result<()> {
        let components = self.entities.get_mut(&id).ok_or(Error::EntityNotFound(id))?;
        *C::slot(components) = Some(value);
        Ok(())
    }

    /// Remove a component from an entity
    pub fn remove<C: Component>(&mut self, id: EntityId) -> Option<C> {
        self.entities
            .get_mut(&id)
            .and_then(|components| C::slot(components).take())
    }

    /// Write an opaque component
    pub fn create_or_replace_custom(
        &mut self,
        id: EntityId,
        kind: impl Into<String>,
        value: CustomComponent,
    ) -> Result<()> {
        let components = self.entities.get_mut(&id).ok_or(Error::EntityNotFound(id))?;
        components.custom.insert(kind.into(), value);
        Ok(())
    }

    /// Get an opaque component
    pub fn custom(&self, id: EntityId, kind: &str) -> Option<&CustomComponent> {
        self.entities.get(&id).and_then(|c| c.custom.get(kind))
    }

    /// IDs of every entity carrying a component, in scene order
    pub fn entities_with<C: Component>(&self) -> Vec<EntityId> {
        self.entities
            .iter()
            .filter(|(_, components)| C::get(components).is_some())
            .map(|(id, _)| *id)
            .collect()
    }

    /// Get all entity IDs
    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.keys().copied()
    }

    /// Get the number of entities, root included
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Check if the scene holds nothing but the root
    pub fn is_empty(&self) -> bool {
        self.entities.len() <= 1
    }

    /// Find the entity whose action catalog carries `id`
    pub fn entity_by_actions_id(&self, id: u64) -> Option<EntityId> {
        self.entities
            .iter()
            .find(|(_, c)| c.actions.as_ref().is_some_and(|a| a.id == id))
            .map(|(entity, _)| *entity)
    }

    /// Find a States component by its id
    pub fn states_by_id(&self, id: u64) -> Option<&States> {
        self.entities
            .values()
            .filter_map(|c| c.states.as_ref())
            .find(|s| s.id == id)
    }

    /// Find a scripted Counter component by its id
    ///
    /// The root's identity counter is never returned.
    pub fn counter_by_id(&self, id: u64) -> Option<&Counter> {
        self.entities
            .iter()
            .filter(|(entity, _)| !entity.is_root())
            .filter_map(|(_, c)| c.counter.as_ref())
            .find(|c| c.id == id)
    }

    /// Check that the root identity counter exists
    pub fn has_root_counter(&self) -> bool {
        self.has::<Counter>(EntityId::ROOT)
    }

    /// Mint a fresh identity
    ///
    /// Increments the root counter and returns the new value. Values are
    /// strictly increasing and never reused.
    pub fn mint_id(&mut self) -> u64 {
        let root = self.entities.entry(EntityId::ROOT).or_insert_with(|| {
            log::warn!("scene root was missing; recreating identity counter");
            Components::default()
        });
        let counter = root.counter.get_or_insert_with(|| {
            log::warn!("identity counter was missing; restarting from zero");
            Counter::default()
        });
        if counter.value < 0 {
            log::warn!("identity counter was negative ({}); restarting from zero", counter.value);
        }
        counter.value = match counter.value.max(0).checked_add(1) {
            Some(next) => next,
            None => {
                log::error!("identity counter exhausted; ids are no longer unique");
                i64::MAX
            }
        };
        counter.value as u64
    }

    /// Current value of the identity counter
    pub fn last_minted(&self) -> u64 {
        self.get::<Counter>(EntityId::ROOT)
            .map(|c| c.value.max(0) as u64)
            .unwrap_or(0)
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}
