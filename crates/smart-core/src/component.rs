//! Replicated component schemas
//!
//! These values are synchronized between session participants by the host's
//! last-write-wins layer, so their serialized shape is the compatibility
//! surface of the crate: field names are camelCase and enum tags are
//! snake_case strings that every authoring tool must agree on.

use crate::{Value, ValueMap};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Kinds of actions an entity can declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    // === Handled by the core ===
    SetState,
    SetCounter,
    IncrementCounter,
    DecreaseCounter,
    StartDelay,
    StopDelay,
    CloneEntity,
    RemoveEntity,

    // === Routed to registered effect handlers ===
    PlayAnimation,
    StopAnimation,
    PlaySound,
    StopSound,
    SetVisibility,
    StartTween,
    TeleportPlayer,
    PlayVideoStream,
    StopVideoStream,
    PlayAudioStream,
    StopAudioStream,
    ShowText,
    HideText,
    OpenLink,
}

impl ActionType {
    /// Whether the core runtime implements this action itself
    pub fn is_builtin(&self) -> bool {
        matches!(
            self,
            ActionType::SetState
                | ActionType::SetCounter
                | ActionType::IncrementCounter
                | ActionType::DecreaseCounter
                | ActionType::StartDelay
                | ActionType::StopDelay
                | ActionType::CloneEntity
                | ActionType::RemoveEntity
        )
    }
}

/// Event sources a trigger can bind to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    OnClick,
    OnStateChange,
    OnSpawn,
    OnCounterChange,
    OnPlayerEntersArea,
    OnPlayerLeavesArea,
    OnTweenEnd,
    OnDelay,
}

/// Predicates a trigger condition can test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionType {
    WhenStateIs,
    WhenStateIsNot,
    WhenCounterEquals,
    WhenCounterIsGreaterThan,
    WhenCounterIsLessThan,
}

impl ConditionType {
    /// Whether the condition reads a `Counter` rather than `States`
    pub fn reads_counter(&self) -> bool {
        !matches!(self, ConditionType::WhenStateIs | ConditionType::WhenStateIsNot)
    }
}

/// How a condition combines with the result of the ones before it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperation {
    #[default]
    And,
    Or,
}

/// One declared, invokable behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Unique within the owning entity
    pub name: String,
    #[serde(rename = "type")]
    pub action_type: ActionType,
    #[serde(default, skip_serializing_if = "ValueMap::is_empty")]
    pub payload: ValueMap,
}

impl Action {
    /// Create an action with an empty payload
    pub fn new(name: impl Into<String>, action_type: ActionType) -> Self {
        Self {
            name: name.into(),
            action_type,
            payload: ValueMap::new(),
        }
    }

    /// Add a payload entry
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }
}

/// The Actions component: an entity's action catalog
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Actions {
    /// Self-describing identity, referenced by trigger targets
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub value: Vec<Action>,
}

impl Actions {
    /// Create a catalog with the given identity
    pub fn new(id: u64) -> Self {
        Self {
            id,
            value: Vec::new(),
        }
    }

    /// Add an action
    pub fn with(mut self, action: Action) -> Self {
        self.value.push(action);
        self
    }

    /// Find an action by name
    pub fn get(&self, name: &str) -> Option<&Action> {
        self.value.iter().find(|a| a.name == name)
    }

    /// Name of the first action declared twice, if any
    pub fn duplicate_name(&self) -> Option<&str> {
        self.value.iter().enumerate().find_map(|(i, a)| {
            self.value[..i]
                .iter()
                .any(|b| b.name == a.name)
                .then_some(a.name.as_str())
        })
    }
}

/// Weak reference from a trigger to an action
///
/// `id` is the target entity's [`Actions::id`]; `None` targets the owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub name: String,
}

impl ActionTarget {
    /// Target an action on the trigger's own entity
    pub fn local(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
        }
    }

    /// Target an action on the entity whose catalog has `id`
    pub fn remote(id: u64, name: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            name: name.into(),
        }
    }
}

/// A predicate over State or Counter values, evaluated when a trigger fires
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    /// Id of the States/Counter component to read; `None` reads the owner's
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(rename = "type")]
    pub condition_type: ConditionType,
    /// Operand: a state name or an integer literal
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<ConditionOperation>,
}

impl Condition {
    /// Create a condition on the owner's components
    pub fn new(condition_type: ConditionType, value: impl Into<String>) -> Self {
        Self {
            id: None,
            condition_type,
            value: value.into(),
            operation: None,
        }
    }

    /// Read the component with the given id instead of the owner's
    pub fn on(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    /// Combine with the previous conditions using `op`
    pub fn joined_by(mut self, op: ConditionOperation) -> Self {
        self.operation = Some(op);
        self
    }
}

/// A binding from an event source to action invocations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    #[serde(rename = "type")]
    pub trigger_type: TriggerType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    /// Default combinator for conditions that carry no tag of their own
    #[serde(default)]
    pub operation: ConditionOperation,
    #[serde(default)]
    pub actions: Vec<ActionTarget>,
}

impl Trigger {
    /// Create a trigger with no conditions or targets
    pub fn new(trigger_type: TriggerType) -> Self {
        Self {
            trigger_type,
            conditions: Vec::new(),
            operation: ConditionOperation::And,
            actions: Vec::new(),
        }
    }

    /// Add a condition
    pub fn when(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Add an action target
    pub fn then(mut self, target: ActionTarget) -> Self {
        self.actions.push(target);
        self
    }
}

/// The Triggers component: an entity's trigger catalog
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Triggers {
    #[serde(default)]
    pub value: Vec<Trigger>,
}

impl Triggers {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a trigger
    pub fn with(mut self, trigger: Trigger) -> Self {
        self.value.push(trigger);
        self
    }
}

/// The States component: a finite state value with fallback semantics
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct States {
    /// Self-describing identity, referenced by conditions
    #[serde(default)]
    pub id: u64,
    /// Possible values, in order
    pub value: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

/// The Counter component
///
/// On the scene root this is the identity counter; elsewhere it is a plain
/// scripted counter driven by the counter actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Counter {
    #[serde(default)]
    pub id: u64,
    pub value: i64,
}

/// Replication capability of an opaque component kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Replication {
    /// Supports replace-on-write
    #[default]
    LastWriteWins,
    /// Append-only; cannot be replaced and is not cloned
    GrowOnly,
}

/// Any component the scripting runtime does not interpret
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CustomComponent {
    pub value: Value,
    #[serde(default)]
    pub replication: Replication,
}

impl CustomComponent {
    /// A last-write-wins component
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            replication: Replication::LastWriteWins,
        }
    }

    /// A grow-only component
    pub fn grow_only(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            replication: Replication::GrowOnly,
        }
    }

    /// Whether the component supports replace-on-write
    pub fn is_replaceable(&self) -> bool {
        self.replication == Replication::LastWriteWins
    }
}

/// Every component attached to one entity
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Components {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Actions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggers: Option<Triggers>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub states: Option<States>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counter: Option<Counter>,
    /// Opaque components by kind name
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub custom: IndexMap<String, CustomComponent>,
}

impl Components {
    /// Check if no component is present
    pub fn is_empty(&self) -> bool {
        self.actions.is_none()
            && self.triggers.is_none()
            && self.states.is_none()
            && self.counter.is_none()
            && self.custom.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_actions_wire_shape() {
        let actions = Actions::new(5).with(Action::new("Toggle", ActionType::SetState).with("state", "on"));
        let v = serde_json::to_value(&actions).unwrap();
        assert_eq!(
            v,
            json!({"id": 5, "value": [{"name": "Toggle", "type": "set_state", "payload": {"state": "on"}}]})
        );
    }

    #[test]
    fn test_triggers_wire_shape() {
        let json = r#"{"value": [{
            "type": "on_click",
            "conditions": [{"type": "when_state_is", "value": "off"}],
            "actions": [{"name": "Toggle"}, {"id": 9, "name": "Open"}]
        }]}"#;
        let triggers: Triggers = serde_json::from_str(json).unwrap();
        let trigger = &triggers.value[0];
        assert_eq!(trigger.trigger_type, TriggerType::OnClick);
        assert_eq!(trigger.operation, ConditionOperation::And);
        assert_eq!(trigger.conditions[0].condition_type, ConditionType::WhenStateIs);
        assert_eq!(trigger.actions[0], ActionTarget::local("Toggle"));
        assert_eq!(trigger.actions[1], ActionTarget::remote(9, "Open"));
    }

    #[test]
    fn test_states_wire_shape() {
        let states = States {
            id: 1,
            value: vec!["off".into(), "on".into()],
            current_value: Some("off".into()),
            default_value: None,
        };
        let v = serde_json::to_value(&states).unwrap();
        assert_eq!(v, json!({"id": 1, "value": ["off", "on"], "currentValue": "off"}));
    }

    #[test]
    fn test_counter_wire_shape() {
        let counter: Counter = serde_json::from_str(r#"{"value": 7}"#).unwrap();
        assert_eq!(counter, Counter { id: 0, value: 7 });
    }

    #[test]
    fn test_duplicate_action_name() {
        let actions = Actions::new(1)
            .with(Action::new("Open", ActionType::PlayAnimation))
            .with(Action::new("Close", ActionType::PlayAnimation))
            .with(Action::new("Open", ActionType::PlaySound));
        assert_eq!(actions.duplicate_name(), Some("Open"));
        assert_eq!(Actions::new(2).duplicate_name(), None);
    }

    #[test]
    fn test_builtin_action_types() {
        assert!(ActionType::SetState.is_builtin());
        assert!(ActionType::CloneEntity.is_builtin());
        assert!(!ActionType::PlaySound.is_builtin());
    }
}
