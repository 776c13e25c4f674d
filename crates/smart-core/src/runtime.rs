//! Scripting runtime context
//!
//! `Runtime` owns every registry the scripting systems need: which entities
//! have already been bound, the per-entity event bus, the pointer registry,
//! effect handlers, deferred work and pending delays. Nothing is global, so
//! independent scenes (and parallel tests) never share state.
//!
//! The dispatchers live in `action.rs` and `trigger.rs` as further
//! `impl Runtime` blocks.

use crate::{
    action::HandlerRegistry,
    bus::{ActionHandler, EventBus, Observer, TriggerHandler},
    Actions, Components, EntityId, Error, Result, RuntimeConfig, Scene, TriggerType, ValueMap,
};
use indexmap::IndexSet;
use std::collections::{HashSet, VecDeque};
use std::fmt;

/// Work postponed to a later tick
#[derive(Debug, Clone, PartialEq)]
pub enum Deferred {
    /// Emit an action on an entity's action channel
    Invoke {
        entity: EntityId,
        action: String,
        payload: ValueMap,
    },
    /// Emit a trigger-channel event on an entity
    Trigger {
        entity: EntityId,
        trigger: TriggerType,
    },
}

/// A pending `start_delay`
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Delay {
    /// Tick at which the delay expires
    pub due: u64,
    pub entity: EntityId,
    /// Name of the `start_delay` action that created it
    pub source: String,
    /// Actions to invoke on expiry
    pub actions: Vec<String>,
}

/// Summary of one scheduler tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// The tick that just ran
    pub tick: u64,
    /// Entities whose action catalogs were bound this tick
    pub bound_actions: Vec<EntityId>,
    /// Entities whose trigger catalogs were bound this tick
    pub bound_triggers: Vec<EntityId>,
    /// Deferred items executed
    pub deferred_run: usize,
    /// Delays that expired
    pub delays_fired: usize,
    /// Bound entities found missing from the scene and forgotten
    pub pruned: usize,
}

/// The scripting runtime for one scene
pub struct Runtime {
    pub(crate) config: RuntimeConfig,
    pub(crate) bus: EventBus,
    /// Entities whose action catalog is bound
    pub(crate) actions_bound: HashSet<EntityId>,
    /// Entities whose trigger catalog is bound
    pub(crate) triggers_bound: HashSet<EntityId>,
    /// Entities registered with the pointer input
    pub(crate) clickable: IndexSet<EntityId>,
    pub(crate) handlers: HandlerRegistry,
    pub(crate) deferred: VecDeque<Deferred>,
    pub(crate) delays: Vec<Delay>,
    tick: u64,
    depth: usize,
    dropped: u64,
    installed: bool,
}

impl Runtime {
    /// Create a runtime with the default configuration
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Create a runtime with the given configuration
    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            config,
            bus: EventBus::new(),
            actions_bound: HashSet::new(),
            triggers_bound: HashSet::new(),
            clickable: IndexSet::new(),
            handlers: HandlerRegistry::new(),
            deferred: VecDeque::new(),
            delays: Vec::new(),
            tick: 0,
            depth: 0,
            dropped: 0,
            installed: false,
        }
    }

    /// Validate the scene and enable the scripting systems
    ///
    /// On failure the error is logged and the runtime stays disabled: `tick`
    /// does nothing, but the rest of the host keeps running.
    pub fn install(&mut self, scene: &Scene) -> Result<()> {
        match Self::validate(scene) {
            Ok(()) => {
                self.installed = true;
                log::info!("scripting runtime installed ({} entities)", scene.len());
                Ok(())
            }
            Err(err) => {
                self.installed = false;
                log::error!("scripting runtime setup failed: {}", err);
                Err(err)
            }
        }
    }

    fn validate(scene: &Scene) -> Result<()> {
        if !scene.has_root_counter() {
            return Err(Error::MissingRoot);
        }
        for entity in scene.entities_with::<Actions>() {
            if let Some(name) = scene.get::<Actions>(entity).and_then(Actions::duplicate_name) {
                return Err(Error::DuplicateAction {
                    entity,
                    name: name.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Whether `install` succeeded
    pub fn is_installed(&self) -> bool {
        self.installed
    }

    /// Get the configuration
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Get the event bus
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// The last tick that ran
    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Emissions dropped by the recursion guard so far
    pub fn dropped_emissions(&self) -> u64 {
        self.dropped
    }

    /// Run the scripting systems once
    ///
    /// Forgets bound entities the host removed from the scene, drains
    /// deferred work queued by earlier ticks, binds newly seen action
    /// and trigger catalogs (actions first, so spawn triggers can reach
    /// them), then releases expired delays.
    pub fn tick(&mut self, scene: &mut Scene) -> TickReport {
        if !self.installed {
            log::warn!("tick ignored: scripting runtime is not installed");
            return TickReport {
                tick: self.tick,
                ..TickReport::default()
            };
        }

        self.tick += 1;
        let mut report = TickReport {
            tick: self.tick,
            ..TickReport::default()
        };

        report.pruned = self.prune_removed(scene);
        report.deferred_run = self.drain_deferred(scene);
        report.bound_actions = self.bind_actions(scene);
        report.bound_triggers = self.bind_triggers(scene);
        report.delays_fired = self.release_delays(scene);
        report
    }

    /// Queue work for a later tick
    pub fn defer(&mut self, item: Deferred) {
        self.deferred.push_back(item);
    }

    /// Number of deferred items waiting
    pub fn pending_deferred(&self) -> usize {
        self.deferred.len()
    }

    /// Number of delays waiting
    pub fn pending_delays(&self) -> usize {
        self.delays.len()
    }

    fn prune_removed(&mut self, scene: &Scene) -> usize {
        let gone: IndexSet<EntityId> = self
            .actions_bound
            .iter()
            .chain(&self.triggers_bound)
            .chain(&self.clickable)
            .copied()
            .filter(|entity| !scene.contains(*entity))
            .collect();

        for &entity in &gone {
            log::debug!("{} left the scene; forgetting its bindings", entity);
            self.forget(entity);
        }
        gone.len()
    }

    fn drain_deferred(&mut self, scene: &mut Scene) -> usize {
        // Only items queued before this tick; anything queued while draining waits.
        let budget = self.config.deferred_per_tick().min(self.deferred.len());
        for _ in 0..budget {
            match self.deferred.pop_front() {
                Some(Deferred::Invoke {
                    entity,
                    action,
                    payload,
                }) => self.emit_action(scene, entity, &action, &payload),
                Some(Deferred::Trigger { entity, trigger }) => {
                    self.emit_trigger(scene, entity, trigger)
                }
                None => break,
            }
        }
        budget
    }

    fn release_delays(&mut self, scene: &mut Scene) -> usize {
        let now = self.tick;
        let (due, pending): (Vec<Delay>, Vec<Delay>) =
            std::mem::take(&mut self.delays).into_iter().partition(|d| d.due <= now);
        self.delays = pending;

        for delay in &due {
            log::debug!("delay '{}' on {} expired", delay.source, delay.entity);
            for action in &delay.actions {
                self.emit_action(scene, delay.entity, action, &ValueMap::new());
            }
            self.emit_trigger(scene, delay.entity, TriggerType::OnDelay);
        }
        due.len()
    }

    /// Listen on an entity's action channel
    pub fn observe_action(&mut self, entity: EntityId, name: impl Into<String>, observer: Observer) {
        self.bus.on_action(entity, name, ActionHandler::Observer(observer));
    }

    /// Listen on an entity's trigger channel
    pub fn observe_trigger(&mut self, entity: EntityId, trigger: TriggerType, observer: Observer) {
        self.bus.on_trigger(entity, trigger, TriggerHandler::Observer(observer));
    }

    /// Whether an entity's action catalog has been bound
    pub fn actions_bound(&self, entity: EntityId) -> bool {
        self.actions_bound.contains(&entity)
    }

    /// Whether an entity's trigger catalog has been bound
    pub fn triggers_bound(&self, entity: EntityId) -> bool {
        self.triggers_bound.contains(&entity)
    }

    /// Drop everything the runtime knows about an entity
    ///
    /// A later tick will bind it again if it still carries catalogs.
    pub fn forget(&mut self, entity: EntityId) {
        self.actions_bound.remove(&entity);
        self.triggers_bound.remove(&entity);
        self.clickable.shift_remove(&entity);
        self.bus.forget(entity);
        self.delays.retain(|d| d.entity != entity);
    }

    /// Remove an entity from the scene and forget its bindings
    pub fn remove_entity(&mut self, scene: &mut Scene, entity: EntityId) -> Option<Components> {
        if entity.is_root() {
            log::warn!("refusing to remove the scene root");
            return None;
        }
        self.forget(entity);
        scene.remove_entity(entity)
    }

    /// Enter one level of nested emission
    ///
    /// Returns false (and counts a dropped emission) when the chain is
    /// already at the configured depth.
    pub(crate) fn enter(&mut self, what: fmt::Arguments<'_>) -> bool {
        if self.depth >= self.config.max_dispatch_depth() {
            self.dropped += 1;
            log::warn!(
                "dispatch depth {} reached; dropping {}",
                self.config.max_dispatch_depth(),
                what
            );
            return false;
        }
        self.depth += 1;
        true
    }

    /// Leave one level of nested emission
    pub(crate) fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.config)
            .field("tick", &self.tick)
            .field("actions_bound", &self.actions_bound.len())
            .field("triggers_bound", &self.triggers_bound.len())
            .field("clickable", &self.clickable.len())
            .field("deferred", &self.deferred.len())
            .field("delays", &self.delays.len())
            .field("installed", &self.installed)
            .finish()
    }
}
