//! Entity definition schema

use super::trigger::TriggerDef;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smart_core::{Action, CustomComponent, States};
use std::collections::HashSet;

/// Definition of one scene entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDef {
    /// Scene-unique name other definitions refer to
    pub name: String,
    /// Action catalog
    #[serde(default)]
    pub actions: Vec<Action>,
    /// Trigger catalog
    #[serde(default)]
    pub triggers: Vec<TriggerDef>,
    /// Named states, if the entity has any
    #[serde(default)]
    pub states: Option<StatesDef>,
    /// Initial counter value, if the entity counts anything
    #[serde(default)]
    pub counter: Option<i64>,
    /// Components the runtime carries but does not interpret
    #[serde(default)]
    pub components: IndexMap<String, CustomComponent>,
}

/// The value set and starting point of a `States` component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatesDef {
    pub values: Vec<String>,
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub current: Option<String>,
}

impl EntityDef {
    /// Create an empty entity definition
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            actions: Vec::new(),
            triggers: Vec::new(),
            states: None,
            counter: None,
            components: IndexMap::new(),
        }
    }

    /// Add an action
    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    /// Add a trigger
    pub fn with_trigger(mut self, trigger: TriggerDef) -> Self {
        self.triggers.push(trigger);
        self
    }

    /// Give the entity named states
    pub fn with_states(mut self, states: StatesDef) -> Self {
        self.states = Some(states);
        self
    }

    /// Give the entity a counter
    pub fn with_counter(mut self, value: i64) -> Self {
        self.counter = Some(value);
        self
    }

    /// Whether an action with this name is declared
    pub fn has_action(&self, name: &str) -> bool {
        self.actions.iter().any(|a| a.name == name)
    }

    /// First action name declared twice
    pub fn duplicate_action(&self) -> Option<&str> {
        let mut seen = HashSet::new();
        self.actions
            .iter()
            .map(|a| a.name.as_str())
            .find(|name| !seen.insert(*name))
    }
}

impl StatesDef {
    /// Create a state set with no explicit default or current value
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: values.into_iter().map(Into::into).collect(),
            default: None,
            current: None,
        }
    }

    /// Build the component under a minted id
    pub fn to_states(&self, id: u64) -> States {
        let mut states = States::new(self.values.iter().cloned()).with_id(id);
        if let Some(default) = &self.default {
            states = states.with_default(default.clone());
        }
        if let Some(current) = &self.current {
            states = states.with_current(current.clone());
        }
        states
    }
}
