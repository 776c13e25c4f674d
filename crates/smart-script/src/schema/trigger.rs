//! Trigger definition schema
//!
//! Same shape as the runtime `Trigger`, except that targets and conditions
//! name other entities instead of carrying component ids.

use serde::{Deserialize, Serialize};
use smart_core::{ConditionOperation, ConditionType, TriggerType};

/// An action to invoke, on the owner or on a named entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetDef {
    #[serde(default)]
    pub entity: Option<String>,
    pub name: String,
}

/// A condition on the owner's or a named entity's state or counter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionDef {
    #[serde(default)]
    pub entity: Option<String>,
    #[serde(rename = "type")]
    pub condition_type: ConditionType,
    pub value: String,
    #[serde(default)]
    pub operation: Option<ConditionOperation>,
}

/// Definition of one trigger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerDef {
    #[serde(rename = "type")]
    pub trigger_type: TriggerType,
    #[serde(default)]
    pub conditions: Vec<ConditionDef>,
    #[serde(default)]
    pub operation: ConditionOperation,
    #[serde(default)]
    pub actions: Vec<TargetDef>,
}

impl TargetDef {
    /// Target an action on the owner
    pub fn local(name: impl Into<String>) -> Self {
        Self {
            entity: None,
            name: name.into(),
        }
    }

    /// Target an action on another entity
    pub fn on(entity: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            entity: Some(entity.into()),
            name: name.into(),
        }
    }
}

impl ConditionDef {
    /// Condition on the owner
    pub fn new(condition_type: ConditionType, value: impl Into<String>) -> Self {
        Self {
            entity: None,
            condition_type,
            value: value.into(),
            operation: None,
        }
    }

    /// Read another entity instead of the owner
    pub fn of(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    /// Whether this condition reads a counter rather than states
    pub fn reads_counter(&self) -> bool {
        self.condition_type.reads_counter()
    }
}

impl TriggerDef {
    /// Create a trigger with no conditions or targets
    pub fn new(trigger_type: TriggerType) -> Self {
        Self {
            trigger_type,
            conditions: Vec::new(),
            operation: ConditionOperation::default(),
            actions: Vec::new(),
        }
    }

    /// Add a condition
    pub fn when(mut self, condition: ConditionDef) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Add a target
    pub fn then(mut self, target: TargetDef) -> Self {
        self.actions.push(target);
        self
    }
}
