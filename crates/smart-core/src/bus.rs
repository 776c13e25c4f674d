//! Per-entity event bus
//!
//! Every entity gets two publish/subscribe channels, created on first use:
//! the action channel keyed by action name, and the trigger channel keyed by
//! trigger type. The bus is process-local; it is rebuilt from the declarative
//! catalogs by each participant and is never replicated.
//!
//! Handlers are stored as data (the bound `Action` or `Trigger`) so that the
//! runtime can run them with mutable access to the scene. Collaborators that
//! only need to observe emissions register an [`Observer`] closure.

use crate::{Action, EntityId, Trigger, TriggerType, ValueMap};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::rc::Rc;

/// A collaborator callback, invoked with the emitting entity and the payload
pub type Observer = Rc<dyn Fn(EntityId, &ValueMap)>;

/// A handler on the action channel
#[derive(Clone)]
pub enum ActionHandler {
    /// A catalog action bound by the action dispatcher
    Bound(Action),
    /// An external listener
    Observer(Observer),
}

/// A handler on the trigger channel
#[derive(Clone)]
pub enum TriggerHandler {
    /// A catalog trigger bound by the trigger dispatcher
    Bound(Trigger),
    /// An external listener
    Observer(Observer),
}

impl fmt::Debug for ActionHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionHandler::Bound(action) => f.debug_tuple("Bound").field(action).finish(),
            ActionHandler::Observer(_) => f.write_str("Observer"),
        }
    }
}

impl fmt::Debug for TriggerHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerHandler::Bound(trigger) => f.debug_tuple("Bound").field(trigger).finish(),
            TriggerHandler::Observer(_) => f.write_str("Observer"),
        }
    }
}

/// Named-event channel: handlers per key, in registration order
#[derive(Debug, Clone)]
pub struct Emitter<K, H> {
    handlers: IndexMap<K, Vec<H>>,
}

impl<K: Hash + Eq, H: Clone> Emitter<K, H> {
    /// Create an empty channel
    pub fn new() -> Self {
        Self {
            handlers: IndexMap::new(),
        }
    }

    /// Register a handler for `key`
    pub fn on(&mut self, key: K, handler: H) {
        self.handlers.entry(key).or_default().push(handler);
    }

    /// Snapshot of the handlers for `key`, in registration order
    pub fn handlers(&self, key: &K) -> Vec<H> {
        self.handlers.get(key).cloned().unwrap_or_default()
    }

    /// Number of handlers registered for `key`
    pub fn listener_count(&self, key: &K) -> usize {
        self.handlers.get(key).map_or(0, Vec::len)
    }

    /// Check if no handler is registered
    pub fn is_empty(&self) -> bool {
        self.handlers.values().all(Vec::is_empty)
    }
}

impl<K: Hash + Eq, H: Clone> Default for Emitter<K, H> {
    fn default() -> Self {
        Self::new()
    }
}

/// The two channels owned by one entity
#[derive(Debug, Clone, Default)]
pub struct EntityEmitters {
    pub actions: Emitter<String, ActionHandler>,
    pub triggers: Emitter<TriggerType, TriggerHandler>,
}

/// Lazily created channels for every entity
#[derive(Debug, Default)]
pub struct EventBus {
    entities: HashMap<EntityId, EntityEmitters>,
}

impl EventBus {
    /// Create an empty bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Channels for an entity, created on first access
    pub fn entity(&mut self, id: EntityId) -> &mut EntityEmitters {
        self.entities.entry(id).or_default()
    }

    /// Channels for an entity, if they exist
    pub fn get(&self, id: EntityId) -> Option<&EntityEmitters> {
        self.entities.get(&id)
    }

    /// Register an action-channel handler
    pub fn on_action(&mut self, id: EntityId, name: impl Into<String>, handler: ActionHandler) {
        self.entity(id).actions.on(name.into(), handler);
    }

    /// Register a trigger-channel handler
    pub fn on_trigger(&mut self, id: EntityId, trigger_type: TriggerType, handler: TriggerHandler) {
        self.entity(id).triggers.on(trigger_type, handler);
    }

    /// Snapshot of the action-channel handlers for `name`
    pub fn action_handlers(&self, id: EntityId, name: &str) -> Vec<ActionHandler> {
        self.entities
            .get(&id)
            .map(|e| e.actions.handlers(&name.to_string()))
            .unwrap_or_default()
    }

    /// Snapshot of the trigger-channel handlers for `trigger_type`
    pub fn trigger_handlers(&self, id: EntityId, trigger_type: TriggerType) -> Vec<TriggerHandler> {
        self.entities
            .get(&id)
            .map(|e| e.triggers.handlers(&trigger_type))
            .unwrap_or_default()
    }

    /// Drop an entity's channels
    pub fn forget(&mut self, id: EntityId) -> bool {
        self.entities.remove(&id).is_some()
    }

    /// Number of entities with channels
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Check if no entity has channels
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ActionType;
    use std::cell::RefCell;

    #[test]
    fn test_channels_created_lazily() {
        let mut bus = EventBus::new();
        let e = EntityId::new(1);
        assert!(bus.get(e).is_none());
        assert!(bus.action_handlers(e, "Open").is_empty());

        bus.entity(e);
        assert!(bus.get(e).is_some());
        assert_eq!(bus.len(), 1);
    }

    #[test]
    fn test_registration_order_preserved() {
        let mut bus = EventBus::new();
        let e = EntityId::new(1);
        bus.on_action(e, "Go", ActionHandler::Bound(Action::new("Go", ActionType::PlaySound)));
        bus.on_action(e, "Go", ActionHandler::Bound(Action::new("Go", ActionType::StopSound)));

        let kinds: Vec<_> = bus
            .action_handlers(e, "Go")
            .into_iter()
            .map(|h| match h {
                ActionHandler::Bound(a) => a.action_type,
                ActionHandler::Observer(_) => unreachable!(),
            })
            .collect();
        assert_eq!(kinds, vec![ActionType::PlaySound, ActionType::StopSound]);
    }

    #[test]
    fn test_channels_are_independent() {
        let mut bus = EventBus::new();
        let e = EntityId::new(1);
        let seen = Rc::new(RefCell::new(0));
        let counter = seen.clone();
        bus.on_trigger(
            e,
            TriggerType::OnStateChange,
            TriggerHandler::Observer(Rc::new(move |_: EntityId, _: &ValueMap| *counter.borrow_mut() += 1)),
        );

        assert_eq!(bus.entity(e).triggers.listener_count(&TriggerType::OnStateChange), 1);
        assert_eq!(bus.entity(e).triggers.listener_count(&TriggerType::OnClick), 0);
        assert!(bus.entity(e).actions.is_empty());

        for handler in bus.trigger_handlers(e, TriggerType::OnStateChange) {
            if let TriggerHandler::Observer(f) = handler {
                f(e, &ValueMap::new());
            }
        }
        assert_eq!(*seen.borrow(), 1);
    }

    #[test]
    fn test_forget() {
        let mut bus = EventBus::new();
        let e = EntityId::new(3);
        bus.on_trigger(e, TriggerType::OnClick, TriggerHandler::Bound(Trigger::new(TriggerType::OnClick)));
        assert!(bus.forget(e));
        assert!(!bus.forget(e));
        assert!(bus.trigger_handlers(e, TriggerType::OnClick).is_empty());
    }
}
