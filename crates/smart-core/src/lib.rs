//! Smart Core - Action/Trigger/State runtime for interactive scene items
//!
//! Any entity in a scene can carry:
//! - an `Actions` catalog of named, typed behaviors
//! - a `Triggers` catalog binding event sources (clicks, state changes,
//!   spawn, counter changes, areas, tween completions) to action invocations
//! - a `States` value with fallback semantics
//! - a `Counter`
//!
//! The [`Runtime`] binds catalogs to a per-entity [`EventBus`] once per
//! entity, executes built-in actions, and routes every other action type to
//! a registered [`EffectHandler`]. [`Scene::clone_entity`] duplicates an
//! entity while remapping the ids its triggers use to reference itself.
//!
//! ## Example
//!
//! ```
//! use smart_core::{
//!     Action, ActionTarget, ActionType, Actions, Runtime, Scene, States, Trigger, TriggerType,
//!     Triggers,
//! };
//!
//! let mut scene = Scene::new();
//! let lamp = scene.add_entity();
//! let id = scene.mint_id();
//! scene.create_or_replace(lamp, States::new(["off", "on"])).unwrap();
//! scene
//!     .create_or_replace(lamp, Actions::new(id).with(Action::new("On", ActionType::SetState).with("state", "on")))
//!     .unwrap();
//! scene
//!     .create_or_replace(lamp, Triggers::new().with(Trigger::new(TriggerType::OnClick).then(ActionTarget::local("On"))))
//!     .unwrap();
//!
//! let mut runtime = Runtime::new();
//! runtime.install(&scene).unwrap();
//! runtime.tick(&mut scene);
//! runtime.click(&mut scene, lamp);
//!
//! assert_eq!(scene.get::<States>(lamp).unwrap().effective_current(), Some("on"));
//! ```

pub mod action;
pub mod bus;
mod clone;
mod component;
mod config;
mod error;
mod identity;
pub mod runtime;
mod scene;
mod state;
mod trigger;
mod value;

pub use action::{EffectContext, EffectHandler, HandlerRegistry};
pub use bus::{ActionHandler, EventBus, Observer, TriggerHandler};
pub use clone::{IdKind, IdRemap};
pub use component::{
    Action, ActionTarget, ActionType, Actions, Components, Condition, ConditionOperation,
    ConditionType, Counter, CustomComponent, Replication, States, Trigger, TriggerType, Triggers,
};
pub use config::{RuntimeConfig, MAX_DISPATCH_DEPTH};
pub use error::{Error, Result};
pub use identity::EntityId;
pub use runtime::{Deferred, Runtime, TickReport};
pub use scene::{Component, Scene};
pub use value::{payload, Value, ValueMap};
