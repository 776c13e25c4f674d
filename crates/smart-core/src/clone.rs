//! Entity duplication with identity remapping
//!
//! Cloning copies every component of an entity onto a new one. Components
//! that carry a self-describing id (`Actions`, `States`, `Counter`) get a
//! freshly minted id on the copy, and the old-to-new mapping is recorded in a
//! table that lives for one clone call. Once everything is copied, a single
//! pass rewrites the copy's own trigger references through that table, so
//! the duplicate's internal wiring points at the duplicate.

use crate::{Components, ConditionType, EntityId, Error, Result, Scene, Triggers};
use std::collections::HashMap;

/// Which component an id belongs to
///
/// Ids of different components may collide (a default-constructed catalog
/// and state set both carry 0), so remapping is keyed by kind as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdKind {
    Actions,
    States,
    Counter,
}

impl IdKind {
    /// The component a condition of this type reads
    pub fn read_by(condition_type: ConditionType) -> Self {
        if condition_type.reads_counter() {
            IdKind::Counter
        } else {
            IdKind::States
        }
    }
}

/// Old id to new id per component kind, scoped to one clone operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdRemap {
    ids: HashMap<(IdKind, u64), u64>,
}

impl IdRemap {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a mapping
    pub fn insert(&mut self, kind: IdKind, old: u64, new: u64) {
        if let Some(previous) = self.ids.insert((kind, old), new) {
            log::warn!(
                "{:?} id {} minted twice during one clone ({} then {})",
                kind,
                old,
                previous,
                new
            );
        }
    }

    /// Look up the replacement for `old`
    pub fn get(&self, kind: IdKind, old: u64) -> Option<u64> {
        self.ids.get(&(kind, old)).copied()
    }

    /// Map an id, passing through ids that were not part of the clone
    pub fn map(&self, kind: IdKind, id: u64) -> u64 {
        self.get(kind, id).unwrap_or(id)
    }

    /// Number of recorded mappings
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Check if nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl Triggers {
    /// Rewrite action-target and condition ids found in `remap`
    ///
    /// Targets are looked up as `Actions` ids, conditions as the `States` or
    /// `Counter` id their type reads. Ids absent from the table refer to
    /// something outside the clone and are left as they are.
    pub fn remap(&mut self, remap: &IdRemap) {
        for trigger in &mut self.value {
            for target in &mut trigger.actions {
                target.id = target.id.map(|id| remap.map(IdKind::Actions, id));
            }
            for condition in &mut trigger.conditions {
                let kind = IdKind::read_by(condition.condition_type);
                condition.id = condition.id.map(|id| remap.map(kind, id));
            }
        }
    }
}

impl Scene {
    /// Duplicate an entity and return the new entity's id
    ///
    /// The source and every other entity are left untouched. Grow-only custom
    /// components cannot be replaced on write and are skipped. The copy is
    /// unbound until the scripting runtime's next tick.
    pub fn clone_entity(&mut self, source: EntityId) -> Result<EntityId> {
        if source.is_root() {
            return Err(Error::Setup("the scene root cannot be cloned".to_string()));
        }
        let original = self
            .components(source)
            .cloned()
            .ok_or(Error::EntityNotFound(source))?;

        let target = self.add_entity();
        let mut remap = IdRemap::new();
        let mut copy = Components::default();

        if let Some(mut actions) = original.actions {
            let id = self.mint_id();
            remap.insert(IdKind::Actions, actions.id, id);
            actions.id = id;
            copy.actions = Some(actions);
        }
        if let Some(mut states) = original.states {
            let id = self.mint_id();
            remap.insert(IdKind::States, states.id, id);
            states.id = id;
            copy.states = Some(states);
        }
        if let Some(mut counter) = original.counter {
            let id = self.mint_id();
            remap.insert(IdKind::Counter, counter.id, id);
            counter.id = id;
            copy.counter = Some(counter);
        }
        copy.triggers = original.triggers;

        for (kind, component) in original.custom {
            if component.is_replaceable() {
                copy.custom.insert(kind, component);
            } else {
                log::debug!("clone of {}: skipping grow-only component '{}'", source, kind);
            }
        }

        if let Some(triggers) = copy.triggers.as_mut() {
            triggers.remap(&remap);
        }

        match self.components_mut(target) {
            Some(slot) => *slot = copy,
            None => return Err(Error::EntityNotFound(target)),
        }

        log::debug!("cloned {} into {} ({} ids remapped)", source, target, remap.len());
        Ok(target)
    }
}
