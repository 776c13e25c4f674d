//! RON scene loader

use crate::error::{Error, Result};
use crate::schema::trigger::{ConditionDef, TargetDef, TriggerDef};
use crate::schema::{EntityDef, SceneDef};
use indexmap::IndexMap;
use smart_core::{
    ActionTarget, Actions, Condition, Counter, EntityId, Scene, Trigger, Triggers,
};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Loaded entity definitions, keyed by name in load order
#[derive(Debug, Default)]
pub struct SceneDefs {
    pub entities: IndexMap<String, EntityDef>,
}

/// Component ids minted for one entity before it is written
#[derive(Debug, Clone, Copy, Default)]
struct Minted {
    actions: Option<u64>,
    states: Option<u64>,
    counter: Option<u64>,
}

impl SceneDefs {
    /// Create empty scene definitions
    pub fn new() -> Self {
        Self::default()
    }

    /// Get an entity definition
    pub fn get(&self, name: &str) -> Option<&EntityDef> {
        self.entities.get(name)
    }

    /// Number of entity definitions
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Check if nothing was loaded
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Check every cross-entity reference
    ///
    /// Targets must name a known entity and an action it declares.
    /// Conditions must name a known entity carrying the states or counter
    /// they read.
    pub fn validate(&self) -> Result<()> {
        for def in self.entities.values() {
            for trigger in &def.triggers {
                for target in &trigger.actions {
                    let target_def = self.referenced(def, target.entity.as_deref())?;
                    if !target_def.has_action(&target.name) {
                        return Err(Error::InvalidSchema(format!(
                            "trigger on '{}' targets unknown action '{}' of '{}'",
                            def.name, target.name, target_def.name
                        )));
                    }
                }
                for condition in &trigger.conditions {
                    let read = self.referenced(def, condition.entity.as_deref())?;
                    let present = if condition.reads_counter() {
                        read.counter.is_some()
                    } else {
                        read.states.is_some()
                    };
                    if !present {
                        return Err(Error::InvalidSchema(format!(
                            "condition {:?} on '{}' reads '{}', which has no {}",
                            condition.condition_type,
                            def.name,
                            read.name,
                            if condition.reads_counter() { "counter" } else { "states" }
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Write every definition into `scene`
    ///
    /// Component ids come from the scene's identity counter. Returns the
    /// entity created for each name. Nothing is written when validation
    /// fails.
    pub fn instantiate(&self, scene: &mut Scene) -> Result<IndexMap<String, EntityId>> {
        self.validate()?;

        let mut minted = IndexMap::with_capacity(self.entities.len());
        for (name, def) in &self.entities {
            let ids = Minted {
                actions: (!def.actions.is_empty()).then(|| scene.mint_id()),
                states: def.states.as_ref().map(|_| scene.mint_id()),
                counter: def.counter.map(|_| scene.mint_id()),
            };
            minted.insert(name.clone(), ids);
        }

        let mut triggers = Vec::with_capacity(self.entities.len());
        for def in self.entities.values() {
            let resolved = def
                .triggers
                .iter()
                .map(|t| resolve_trigger(t, &minted))
                .collect::<Result<Vec<_>>>()?;
            triggers.push(resolved);
        }

        let mut created = IndexMap::with_capacity(self.entities.len());
        for ((name, def), resolved) in self.entities.iter().zip(triggers) {
            let entity = scene.add_entity();
            let ids = minted.get(name).copied().unwrap_or_default();

            if let Some(id) = ids.actions {
                let actions = Actions {
                    id,
                    value: def.actions.clone(),
                };
                scene.create_or_replace(entity, actions)?;
            }
            if let (Some(id), Some(states)) = (ids.states, &def.states) {
                scene.create_or_replace(entity, states.to_states(id))?;
            }
            if let (Some(id), Some(value)) = (ids.counter, def.counter) {
                scene.create_or_replace(entity, Counter { id, value })?;
            }
            if !resolved.is_empty() {
                scene.create_or_replace(entity, Triggers { value: resolved })?;
            }
            for (kind, component) in &def.components {
                scene.create_or_replace_custom(entity, kind.clone(), component.clone())?;
            }

            log::debug!("instantiated '{}' as {}", name, entity);
            created.insert(name.clone(), entity);
        }

        log::info!("instantiated {} entities", created.len());
        Ok(created)
    }

    /// The definition a reference points at; `None` means the owner
    fn referenced<'a>(&'a self, owner: &'a EntityDef, name: Option<&str>) -> Result<&'a EntityDef> {
        match name {
            None => Ok(owner),
            Some(name) => self
                .entities
                .get(name)
                .ok_or_else(|| Error::UnknownEntity(name.to_string())),
        }
    }
}

fn minted_for<'a>(minted: &'a IndexMap<String, Minted>, name: &str) -> Result<&'a Minted> {
    minted
        .get(name)
        .ok_or_else(|| Error::UnknownEntity(name.to_string()))
}

fn resolve_target(target: &TargetDef, minted: &IndexMap<String, Minted>) -> Result<ActionTarget> {
    let Some(entity) = target.entity.as_deref() else {
        return Ok(ActionTarget::local(target.name.clone()));
    };
    let id = minted_for(minted, entity)?.actions.ok_or_else(|| {
        Error::InvalidSchema(format!("'{}' has no actions to target", entity))
    })?;
    Ok(ActionTarget::remote(id, target.name.clone()))
}

fn resolve_condition(condition: &ConditionDef, minted: &IndexMap<String, Minted>) -> Result<Condition> {
    let mut resolved = Condition::new(condition.condition_type, condition.value.clone());
    resolved.operation = condition.operation;

    if let Some(entity) = condition.entity.as_deref() {
        let ids = minted_for(minted, entity)?;
        let id = if condition.reads_counter() {
            ids.counter
        } else {
            ids.states
        };
        let id = id.ok_or_else(|| {
            Error::InvalidSchema(format!("condition reads '{}', which has nothing to read", entity))
        })?;
        resolved = resolved.on(id);
    }
    Ok(resolved)
}

fn resolve_trigger(trigger: &TriggerDef, minted: &IndexMap<String, Minted>) -> Result<Trigger> {
    let mut resolved = Trigger::new(trigger.trigger_type);
    resolved.operation = trigger.operation;
    for condition in &trigger.conditions {
        resolved = resolved.when(resolve_condition(condition, minted)?);
    }
    for target in &trigger.actions {
        resolved = resolved.then(resolve_target(target, minted)?);
    }
    Ok(resolved)
}

/// Loader for RON scene files
pub struct Loader {
    defs: SceneDefs,
}

impl Loader {
    /// Create a new loader
    pub fn new() -> Self {
        Self {
            defs: SceneDefs::new(),
        }
    }

    /// Load a scene from a RON string
    ///
    /// All entities of the string are checked before any is added, so a
    /// rejected string leaves the loader unchanged.
    pub fn load_str(&mut self, content: &str) -> Result<()> {
        let scene: SceneDef = ron::from_str(content)?;

        let mut names = HashSet::new();
        for entity in &scene.entities {
            if let Some(action) = entity.duplicate_action() {
                return Err(Error::DuplicateDefinition(format!(
                    "action '{}' on entity '{}'",
                    action, entity.name
                )));
            }
            if self.defs.entities.contains_key(&entity.name) || !names.insert(entity.name.as_str()) {
                return Err(Error::DuplicateDefinition(format!("entity '{}'", entity.name)));
            }
        }

        for entity in scene.entities {
            log::debug!("loaded entity '{}'", entity.name);
            self.defs.entities.insert(entity.name.clone(), entity);
        }
        Ok(())
    }

    /// Load a single RON file
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let before = self.defs.len();
        self.load_str(&content)?;
        log::info!("loaded {} entities from {:?}", self.defs.len() - before, path);
        Ok(())
    }

    /// Load all RON files from a directory, in file name order
    pub fn load_directory(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if !path.is_dir() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Not a directory: {:?}", path),
            )));
        }

        let mut paths = fs::read_dir(path)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()?;
        paths.sort();

        for file_path in paths {
            if file_path.extension().map(|e| e == "ron").unwrap_or(false) {
                self.load_file(&file_path)?;
            } else if file_path.is_dir() {
                self.load_directory(&file_path)?;
            }
        }

        Ok(())
    }

    /// Finish loading and return the scene definitions
    pub fn finish(self) -> SceneDefs {
        self.defs
    }

    /// Get the current definitions (for inspection during loading)
    pub fn defs(&self) -> &SceneDefs {
        &self.defs
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}
