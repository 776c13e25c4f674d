//! Schema definitions for RON scenes

pub mod entity;
pub mod trigger;

use serde::{Deserialize, Serialize};

pub use entity::EntityDef;

/// Top-level shape of a scene file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneDef {
    #[serde(default)]
    pub entities: Vec<EntityDef>,
}
