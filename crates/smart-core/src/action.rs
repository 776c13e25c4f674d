//! Action catalog binding and execution
//!
//! Each tick, entities carrying an `Actions` catalog that the runtime has not
//! seen yet get every action bound on their action channel. Emitting an
//! action name runs the bound entries: built-in action types are handled
//! here, everything else goes to the effect handler registered for its type.

use crate::{
    bus::ActionHandler,
    runtime::{Deferred, Delay, Runtime},
    Action, ActionType, Actions, Counter, EntityId, Error, Result, Scene, States, TriggerType,
    Value, ValueMap,
};
use std::collections::{HashMap, VecDeque};

/// Performs the visible side effect of an action type
///
/// Effect handlers do not touch State or emit trigger events directly. Work
/// that must happen later (including completion events such as
/// `on_tween_end`) is queued through [`EffectContext::defer`].
pub trait EffectHandler {
    /// Apply `action` to `cx.entity`
    fn apply(&mut self, cx: &mut EffectContext<'_>, action: &Action);
}

impl<F> EffectHandler for F
where
    F: FnMut(&mut EffectContext<'_>, &Action),
{
    fn apply(&mut self, cx: &mut EffectContext<'_>, action: &Action) {
        self(cx, action)
    }
}

/// What an effect handler can see and do
pub struct EffectContext<'a> {
    /// The scene, for reading and writing opaque components
    pub scene: &'a mut Scene,
    /// Entity the action runs on
    pub entity: EntityId,
    /// Declared payload merged with the emission's payload
    pub payload: &'a ValueMap,
    tick: u64,
    deferred: &'a mut VecDeque<Deferred>,
}

impl EffectContext<'_> {
    /// The current tick
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Queue work for a later tick
    pub fn defer(&mut self, item: Deferred) {
        self.deferred.push_back(item);
    }

    /// Queue a trigger-channel event on this entity for a later tick
    pub fn defer_trigger(&mut self, trigger: TriggerType) {
        let entity = self.entity;
        self.defer(Deferred::Trigger { entity, trigger });
    }
}

/// Effect handlers by action type
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<ActionType, Box<dyn EffectHandler>>,
}

impl HandlerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if a handler is registered for `action_type`
    pub fn contains(&self, action_type: ActionType) -> bool {
        self.handlers.contains_key(&action_type)
    }

    /// Number of registered handlers
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Check if no handler is registered
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Runtime {
    /// Register the effect handler for an action type
    ///
    /// Replaces any previous handler for the same type. Built-in types are
    /// owned by the runtime and cannot be overridden.
    pub fn register_handler<H>(&mut self, action_type: ActionType, handler: H) -> Result<()>
    where
        H: EffectHandler + 'static,
    {
        if action_type.is_builtin() {
            return Err(Error::Setup(format!(
                "{:?} is handled by the runtime and cannot be overridden",
                action_type
            )));
        }
        if self
            .handlers
            .handlers
            .insert(action_type, Box::new(handler))
            .is_some()
        {
            log::debug!("replaced effect handler for {:?}", action_type);
        }
        Ok(())
    }

    /// Check if an effect handler is registered for `action_type`
    pub fn has_handler(&self, action_type: ActionType) -> bool {
        self.handlers.contains(action_type)
    }

    /// Bind the action catalogs of entities not seen before
    ///
    /// Returns the entities bound by this call. Already-bound entities are
    /// skipped, so repeated scans never register a handler twice.
    pub fn bind_actions(&mut self, scene: &Scene) -> Vec<EntityId> {
        let mut bound = Vec::new();

        for entity in scene.entities_with::<Actions>() {
            if self.actions_bound.contains(&entity) {
                continue;
            }
            let Some(actions) = scene.get::<Actions>(entity) else {
                continue;
            };

            let mut names = Vec::with_capacity(actions.value.len());
            for action in &actions.value {
                if names.contains(&action.name.as_str()) {
                    log::warn!(
                        "{} declares action '{}' twice; keeping the first",
                        entity,
                        action.name
                    );
                    continue;
                }
                names.push(action.name.as_str());
                self.bus
                    .on_action(entity, action.name.clone(), ActionHandler::Bound(action.clone()));
            }

            log::debug!("bound {} actions on {}", names.len(), entity);
            self.actions_bound.insert(entity);
            bound.push(entity);
        }

        bound
    }

    /// Emit `name` on an entity's action channel
    ///
    /// Every handler bound to the name runs synchronously, in registration
    /// order. `payload` is merged over each bound action's declared payload.
    /// A name nothing is bound to is a no-op.
    pub fn emit_action(&mut self, scene: &mut Scene, entity: EntityId, name: &str, payload: &ValueMap) {
        let handlers = self.bus.action_handlers(entity, name);
        if handlers.is_empty() {
            log::debug!("no action '{}' bound on {}; ignoring", name, entity);
            return;
        }
        if !self.enter(format_args!("action '{}' on {}", name, entity)) {
            return;
        }

        for handler in handlers {
            match handler {
                ActionHandler::Bound(action) => {
                    let mut merged = action.payload.clone();
                    merged.extend(payload.iter().map(|(k, v)| (k.clone(), v.clone())));
                    self.run_action(scene, entity, &action, &merged);
                }
                ActionHandler::Observer(observer) => observer(entity, payload),
            }
        }

        self.leave();
    }

    fn run_action(&mut self, scene: &mut Scene, entity: EntityId, action: &Action, payload: &ValueMap) {
        log::debug!("running {:?} '{}' on {}", action.action_type, action.name, entity);

        match action.action_type {
            ActionType::SetState => self.set_state(scene, entity, payload),
            ActionType::SetCounter => match payload.get("counter").and_then(Value::as_int) {
                Some(value) => self.update_counter(scene, entity, |_| value),
                None => invalid_payload(action, payload, "counter", "int"),
            },
            ActionType::IncrementCounter => {
                let amount = payload.get("amount").and_then(Value::as_int).unwrap_or(1);
                self.update_counter(scene, entity, |c| c.saturating_add(amount));
            }
            ActionType::DecreaseCounter => {
                let amount = payload.get("amount").and_then(Value::as_int).unwrap_or(1);
                self.update_counter(scene, entity, |c| c.saturating_sub(amount));
            }
            ActionType::StartDelay => self.start_delay(entity, action, payload),
            ActionType::StopDelay => match payload.get("action").and_then(Value::as_str) {
                Some(source) => {
                    let before = self.delays.len();
                    self.delays
                        .retain(|d| !(d.entity == entity && d.source == source));
                    log::debug!(
                        "stopped {} delays '{}' on {}",
                        before - self.delays.len(),
                        source,
                        entity
                    );
                }
                None => invalid_payload(action, payload, "action", "string"),
            },
            ActionType::CloneEntity => match scene.clone_entity(entity) {
                Ok(copy) => log::debug!("cloned {} into {}", entity, copy),
                Err(err) => log::warn!("clone of {} failed: {}", entity, err),
            },
            ActionType::RemoveEntity => {
                self.remove_entity(scene, entity);
            }
            other => {
                let tick = self.current_tick();
                match self.handlers.handlers.get_mut(&other) {
                    Some(handler) => {
                        let mut cx = EffectContext {
                            scene,
                            entity,
                            payload,
                            tick,
                            deferred: &mut self.deferred,
                        };
                        handler.apply(&mut cx, action);
                    }
                    None => log::debug!("no effect handler for {:?}; ignoring", other),
                }
            }
        }
    }

    /// Write the requested state, then announce the change
    ///
    /// The store write completes before `on_state_change` is emitted, so the
    /// triggers it fires see the new value.
    fn set_state(&mut self, scene: &mut Scene, entity: EntityId, payload: &ValueMap) {
        let Some(states) = scene.get_mut::<States>(entity) else {
            log::debug!("{} has no States; set_state ignored", entity);
            return;
        };

        match payload.get("state").and_then(Value::as_str) {
            Some(requested) => states.set_state(requested),
            None => {
                log::warn!("set_state on {} without a state; using the default", entity);
                states.reset();
            }
        }

        self.emit_trigger(scene, entity, TriggerType::OnStateChange);
    }

    fn update_counter(&mut self, scene: &mut Scene, entity: EntityId, f: impl FnOnce(i64) -> i64) {
        if entity.is_root() {
            log::warn!("counter actions cannot target the identity counter");
            return;
        }
        let Some(counter) = scene.get_mut::<Counter>(entity) else {
            log::debug!("{} has no Counter; counter action ignored", entity);
            return;
        };
        counter.value = f(counter.value);

        self.emit_trigger(scene, entity, TriggerType::OnCounterChange);
    }

    fn start_delay(&mut self, entity: EntityId, action: &Action, payload: &ValueMap) {
        let Some(names) = payload.get("actions").and_then(Value::as_list) else {
            invalid_payload(action, payload, "actions", "list");
            return;
        };
        let ticks = payload
            .get("ticks")
            .and_then(Value::as_int)
            .unwrap_or(1)
            .max(1) as u64;

        self.delays.push(Delay {
            due: self.current_tick() + ticks,
            entity,
            source: action.name.clone(),
            actions: names
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
        });
    }
}

/// Describe a payload field that is absent or of the wrong type
fn payload_error(action: &Action, payload: &ValueMap, key: &str, expected: &str) -> Error {
    let reason = match payload.get(key) {
        Some(found) => format!("'{}' should be {}, found {}", key, expected, found.type_name()),
        None => format!("missing {} '{}'", expected, key),
    };
    Error::InvalidPayload {
        action: action.action_type,
        reason,
    }
}

fn invalid_payload(action: &Action, payload: &ValueMap, key: &str, expected: &str) {
    let err = payload_error(action, payload, key, expected);
    log::warn!("action '{}' ignored: {}", action.name, err);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{payload, TriggerType};
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    fn scene_with(actions: Actions) -> (Scene, EntityId) {
        let mut scene = Scene::new();
        let e = scene.add_entity();
        scene.create_or_replace(e, actions).unwrap();
        (scene, e)
    }

    fn runtime(scene: &mut Scene) -> Runtime {
        let mut runtime = Runtime::new();
        runtime.install(scene).unwrap();
        runtime.tick(scene);
        runtime
    }

    #[test]
    fn test_bind_is_idempotent() {
        let (mut scene, e) = scene_with(Actions::new(1).with(Action::new("Beep", ActionType::PlaySound)));
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();

        let mut runtime = Runtime::new();
        runtime.install(&scene).unwrap();
        runtime
            .register_handler(ActionType::PlaySound, move |_: &mut EffectContext<'_>, _: &Action| {
                h.set(h.get() + 1)
            })
            .unwrap();

        for _ in 0..5 {
            runtime.tick(&mut scene);
        }
        assert_eq!(runtime.bus().get(e).unwrap().actions.listener_count(&"Beep".to_string()), 1);

        runtime.emit_action(&mut scene, e, "Beep", &ValueMap::new());
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_unknown_action_is_noop() {
        let (mut scene, e) = scene_with(Actions::new(1));
        let mut runtime = runtime(&mut scene);
        runtime.emit_action(&mut scene, e, "Missing", &ValueMap::new());
        runtime.emit_action(&mut scene, EntityId::new(404), "Missing", &ValueMap::new());
    }

    #[test]
    fn test_set_state_emits_after_write() {
        let (mut scene, e) = scene_with(
            Actions::new(1).with(Action::new("On", ActionType::SetState).with("state", "on")),
        );
        scene.create_or_replace(e, States::new(["off", "on"])).unwrap();
        let mut runtime = runtime(&mut scene);

        let observed = Rc::new(RefCell::new(Vec::new()));
        let o = observed.clone();
        runtime.observe_trigger(
            e,
            TriggerType::OnStateChange,
            Rc::new(move |entity: EntityId, _: &ValueMap| o.borrow_mut().push(entity)),
        );

        runtime.emit_action(&mut scene, e, "On", &ValueMap::new());
        assert_eq!(scene.get::<States>(e).unwrap().effective_current(), Some("on"));
        assert_eq!(*observed.borrow(), vec![e]);
    }

    #[test]
    fn test_set_state_without_store_is_noop() {
        let (mut scene, e) = scene_with(
            Actions::new(1).with(Action::new("On", ActionType::SetState).with("state", "on")),
        );
        let mut runtime = runtime(&mut scene);
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        runtime.observe_trigger(e, TriggerType::OnStateChange, Rc::new(move |_: EntityId, _: &ValueMap| h.set(h.get() + 1)));

        runtime.emit_action(&mut scene, e, "On", &ValueMap::new());
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn test_payload_override() {
        let (mut scene, e) = scene_with(
            Actions::new(1).with(Action::new("Set", ActionType::SetState).with("state", "a")),
        );
        scene.create_or_replace(e, States::new(["a", "b"])).unwrap();
        let mut runtime = runtime(&mut scene);

        runtime.emit_action(&mut scene, e, "Set", &payload([("state", "b")]));
        assert_eq!(scene.get::<States>(e).unwrap().effective_current(), Some("b"));
    }

    #[test]
    fn test_counter_actions() {
        let (mut scene, e) = scene_with(
            Actions::new(1)
                .with(Action::new("Inc", ActionType::IncrementCounter))
                .with(Action::new("Dec", ActionType::DecreaseCounter).with("amount", 5i64))
                .with(Action::new("Reset", ActionType::SetCounter).with("counter", 10i64)),
        );
        scene.create_or_replace(e, Counter { id: 2, value: 0 }).unwrap();
        let mut runtime = runtime(&mut scene);

        let changes = Rc::new(Cell::new(0));
        let c = changes.clone();
        runtime.observe_trigger(e, TriggerType::OnCounterChange, Rc::new(move |_: EntityId, _: &ValueMap| c.set(c.get() + 1)));

        runtime.emit_action(&mut scene, e, "Inc", &ValueMap::new());
        runtime.emit_action(&mut scene, e, "Inc", &ValueMap::new());
        assert_eq!(scene.get::<Counter>(e).unwrap().value, 2);

        runtime.emit_action(&mut scene, e, "Dec", &ValueMap::new());
        assert_eq!(scene.get::<Counter>(e).unwrap().value, -3);

        runtime.emit_action(&mut scene, e, "Reset", &ValueMap::new());
        assert_eq!(scene.get::<Counter>(e).unwrap().value, 10);
        assert_eq!(changes.get(), 4);
    }

    #[test]
    fn test_set_counter_requires_value() {
        let (mut scene, e) = scene_with(Actions::new(1).with(Action::new("Set", ActionType::SetCounter)));
        scene.create_or_replace(e, Counter { id: 2, value: 4 }).unwrap();
        let mut runtime = runtime(&mut scene);

        runtime.emit_action(&mut scene, e, "Set", &ValueMap::new());
        assert_eq!(scene.get::<Counter>(e).unwrap().value, 4);
    }

    #[test]
    fn test_builtin_handler_cannot_be_overridden() {
        let mut runtime = Runtime::new();
        let err = runtime.register_handler(ActionType::SetState, |_: &mut EffectContext<'_>, _: &Action| {});
        assert!(matches!(err, Err(Error::Setup(_))));
        assert!(!runtime.has_handler(ActionType::SetState));
    }

    #[test]
    fn test_effect_handler_receives_merged_payload_and_defers() {
        let (mut scene, e) = scene_with(
            Actions::new(1).with(Action::new("Slide", ActionType::StartTween).with("duration", 2i64)),
        );
        let mut runtime = runtime(&mut scene);

        let seen = Rc::new(RefCell::new(None));
        let s = seen.clone();
        runtime
            .register_handler(ActionType::StartTween, move |cx: &mut EffectContext<'_>, _: &Action| {
                *s.borrow_mut() = cx.payload.get("duration").and_then(Value::as_int);
                cx.defer_trigger(TriggerType::OnTweenEnd);
            })
            .unwrap();

        let ended = Rc::new(Cell::new(0));
        let en = ended.clone();
        runtime.observe_trigger(e, TriggerType::OnTweenEnd, Rc::new(move |_: EntityId, _: &ValueMap| en.set(en.get() + 1)));

        runtime.emit_action(&mut scene, e, "Slide", &ValueMap::new());
        assert_eq!(*seen.borrow(), Some(2));
        assert_eq!(ended.get(), 0, "completion is not observed in the same tick");

        runtime.tick(&mut scene);
        assert_eq!(ended.get(), 1);
    }

    #[test]
    fn test_delay_fires_after_ticks_and_can_stop() {
        let (mut scene, e) = scene_with(
            Actions::new(1)
                .with(Action::new("Inc", ActionType::IncrementCounter))
                .with(
                    Action::new("Later", ActionType::StartDelay)
                        .with("actions", vec!["Inc"])
                        .with("ticks", 2i64),
                )
                .with(Action::new("Cancel", ActionType::StopDelay).with("action", "Later")),
        );
        scene.create_or_replace(e, Counter { id: 2, value: 0 }).unwrap();
        let mut runtime = runtime(&mut scene);

        runtime.emit_action(&mut scene, e, "Later", &ValueMap::new());
        assert_eq!(runtime.pending_delays(), 1);
        runtime.tick(&mut scene);
        assert_eq!(scene.get::<Counter>(e).unwrap().value, 0);
        let report = runtime.tick(&mut scene);
        assert_eq!(report.delays_fired, 1);
        assert_eq!(scene.get::<Counter>(e).unwrap().value, 1);

        runtime.emit_action(&mut scene, e, "Later", &ValueMap::new());
        runtime.emit_action(&mut scene, e, "Cancel", &ValueMap::new());
        assert_eq!(runtime.pending_delays(), 0);
        runtime.tick(&mut scene);
        runtime.tick(&mut scene);
        assert_eq!(scene.get::<Counter>(e).unwrap().value, 1);
    }

    #[test]
    fn test_expired_delay_emits_on_delay_after_its_actions() {
        let (mut scene, e) = scene_with(
            Actions::new(1)
                .with(Action::new("Inc", ActionType::IncrementCounter))
                .with(
                    Action::new("Soon", ActionType::StartDelay)
                        .with("actions", vec!["Inc"])
                        .with("ticks", 1i64),
                )
                .with(Action::new("Cancel", ActionType::StopDelay).with("action", "Soon")),
        );
        scene.create_or_replace(e, Counter { id: 2, value: 0 }).unwrap();
        let mut runtime = runtime(&mut scene);

        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        runtime.observe_action(e, "Inc", Rc::new(move |_: EntityId, _: &ValueMap| s.borrow_mut().push("inc")));
        let s = seen.clone();
        runtime.observe_trigger(
            e,
            TriggerType::OnDelay,
            Rc::new(move |_: EntityId, _: &ValueMap| s.borrow_mut().push("delay")),
        );

        runtime.emit_action(&mut scene, e, "Soon", &ValueMap::new());
        assert!(seen.borrow().is_empty());
        runtime.tick(&mut scene);
        assert_eq!(*seen.borrow(), vec!["inc", "delay"]);

        // a cancelled delay announces nothing
        runtime.emit_action(&mut scene, e, "Soon", &ValueMap::new());
        runtime.emit_action(&mut scene, e, "Cancel", &ValueMap::new());
        runtime.tick(&mut scene);
        assert_eq!(seen.borrow().len(), 2);
    }

    #[test]
    fn test_payload_error_names_found_type() {
        let action = Action::new("Set", ActionType::SetCounter);
        let wrong = payload([("counter", "three")]);
        let err = payload_error(&action, &wrong, "counter", "int");
        assert_eq!(
            err.to_string(),
            "Invalid payload for SetCounter: 'counter' should be int, found string"
        );

        let err = payload_error(&action, &ValueMap::new(), "counter", "int");
        assert!(err.to_string().ends_with("missing int 'counter'"));
    }

    #[test]
    fn test_clone_and_remove_actions() {
        let (mut scene, e) = scene_with(
            Actions::new(1)
                .with(Action::new("Dup", ActionType::CloneEntity))
                .with(Action::new("Bye", ActionType::RemoveEntity)),
        );
        let mut runtime = runtime(&mut scene);

        runtime.emit_action(&mut scene, e, "Dup", &ValueMap::new());
        assert_eq!(scene.entities_with::<Actions>().len(), 2);

        runtime.emit_action(&mut scene, e, "Bye", &ValueMap::new());
        assert!(!scene.contains(e));
        assert!(!runtime.actions_bound(e));
        assert_eq!(scene.entities_with::<Actions>().len(), 1);
    }
}
