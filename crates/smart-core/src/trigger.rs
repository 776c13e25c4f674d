//! Trigger catalog binding and firing
//!
//! Binding happens once per entity: click triggers register the entity with
//! the pointer input, spawn triggers fire on the spot, and every other
//! trigger waits on the entity's trigger channel. A fired trigger checks its
//! conditions and then emits each target action on the target's action
//! channel.

use crate::{
    bus::TriggerHandler, runtime::Runtime, ActionTarget, Condition, ConditionOperation,
    ConditionType, Counter, EntityId, Scene, States, Trigger, TriggerType, Triggers, ValueMap,
};

impl Condition {
    /// Evaluate against current State/Counter values
    ///
    /// A missing component or an unparseable counter operand fails the
    /// condition.
    pub fn evaluate(&self, scene: &Scene, owner: EntityId) -> bool {
        match self.condition_type {
            ConditionType::WhenStateIs | ConditionType::WhenStateIsNot => {
                let states = match self.id {
                    Some(id) => scene.states_by_id(id),
                    None => scene.get::<States>(owner),
                };
                let Some(states) = states else {
                    log::debug!("condition on {} reads missing States {:?}", owner, self.id);
                    return false;
                };
                let is = states.effective_current() == Some(self.value.as_str());
                match self.condition_type {
                    ConditionType::WhenStateIs => is,
                    _ => !is,
                }
            }
            ConditionType::WhenCounterEquals
            | ConditionType::WhenCounterIsGreaterThan
            | ConditionType::WhenCounterIsLessThan => {
                let counter = match self.id {
                    Some(id) => scene.counter_by_id(id),
                    None if owner.is_root() => None,
                    None => scene.get::<Counter>(owner),
                };
                let Some(counter) = counter else {
                    log::debug!("condition on {} reads missing Counter {:?}", owner, self.id);
                    return false;
                };
                let Ok(operand) = self.value.trim().parse::<i64>() else {
                    log::warn!("counter condition operand '{}' is not an integer", self.value);
                    return false;
                };
                match self.condition_type {
                    ConditionType::WhenCounterEquals => counter.value == operand,
                    ConditionType::WhenCounterIsGreaterThan => counter.value > operand,
                    _ => counter.value < operand,
                }
            }
        }
    }
}

impl Trigger {
    /// Evaluate the conditions left to right
    ///
    /// Each condition joins the running result with its own operation, or
    /// the trigger's when it has none. No conditions means pass.
    pub fn conditions_pass(&self, scene: &Scene, owner: EntityId) -> bool {
        let mut result: Option<bool> = None;

        for condition in &self.conditions {
            let op = condition.operation.unwrap_or(self.operation);
            result = Some(match (result, op) {
                (None, _) => condition.evaluate(scene, owner),
                (Some(false), ConditionOperation::And) => false,
                (Some(true), ConditionOperation::Or) => true,
                (Some(_), _) => condition.evaluate(scene, owner),
            });
        }

        result.unwrap_or(true)
    }
}

impl ActionTarget {
    /// Resolve the entity this target points at
    ///
    /// `None` when the referenced catalog no longer exists.
    pub fn resolve(&self, scene: &Scene, owner: EntityId) -> Option<EntityId> {
        match self.id {
            None => Some(owner),
            Some(id) => scene.entity_by_actions_id(id),
        }
    }
}

impl Runtime {
    /// Bind the trigger catalogs of entities not seen before
    ///
    /// Returns the entities bound by this call. Spawn triggers fire here,
    /// once, after the entity's other triggers are in place.
    pub fn bind_triggers(&mut self, scene: &mut Scene) -> Vec<EntityId> {
        let mut bound = Vec::new();

        for entity in scene.entities_with::<Triggers>() {
            if self.triggers_bound.contains(&entity) {
                continue;
            }
            let Some(triggers) = scene.get::<Triggers>(entity).cloned() else {
                continue;
            };
            self.triggers_bound.insert(entity);
            bound.push(entity);

            let mut spawned = Vec::new();
            for trigger in triggers.value {
                match trigger.trigger_type {
                    TriggerType::OnSpawn => spawned.push(trigger),
                    TriggerType::OnClick => {
                        if self.clickable.insert(entity) {
                            log::debug!("{} registered for pointer input", entity);
                        }
                        self.bus
                            .on_trigger(entity, TriggerType::OnClick, TriggerHandler::Bound(trigger));
                    }
                    other => self.bus.on_trigger(entity, other, TriggerHandler::Bound(trigger)),
                }
            }

            if self.config.spawn_on_bind() {
                for trigger in &spawned {
                    self.fire(scene, entity, trigger);
                }
            }
        }

        bound
    }

    /// Pointer input entry point: `entity` was clicked
    ///
    /// Returns false when the entity is not registered for pointer input.
    pub fn click(&mut self, scene: &mut Scene, entity: EntityId) -> bool {
        if !self.clickable.contains(&entity) {
            log::debug!("{} is not clickable", entity);
            return false;
        }
        self.emit_trigger(scene, entity, TriggerType::OnClick);
        true
    }

    /// Whether an entity is registered for pointer input
    pub fn is_clickable(&self, entity: EntityId) -> bool {
        self.clickable.contains(&entity)
    }

    /// Emit a trigger-channel event on an entity
    ///
    /// Collaborators use this for effect completions and area events
    /// (`on_tween_end`, `on_player_enters_area`, `on_player_leaves_area`).
    pub fn emit_trigger(&mut self, scene: &mut Scene, entity: EntityId, trigger_type: TriggerType) {
        let handlers = self.bus.trigger_handlers(entity, trigger_type);
        if handlers.is_empty() {
            return;
        }
        if !self.enter(format_args!("{:?} on {}", trigger_type, entity)) {
            return;
        }

        let empty = ValueMap::new();
        for handler in handlers {
            match handler {
                TriggerHandler::Bound(trigger) => self.fire(scene, entity, &trigger),
                TriggerHandler::Observer(observer) => observer(entity, &empty),
            }
        }

        self.leave();
    }

    /// Fire one trigger owned by `owner`
    pub fn fire(&mut self, scene: &mut Scene, owner: EntityId, trigger: &Trigger) {
        if !trigger.conditions_pass(scene, owner) {
            log::debug!("{:?} on {}: conditions not met", trigger.trigger_type, owner);
            return;
        }

        for target in &trigger.actions {
            match target.resolve(scene, owner) {
                Some(entity) if scene.contains(entity) => {
                    self.emit_action(scene, entity, &target.name, &ValueMap::new())
                }
                _ => log::debug!(
                    "{:?} on {}: target {:?} '{}' is gone",
                    trigger.trigger_type,
                    owner,
                    target.id,
                    target.name
                ),
            }
        }
    }
}
