//! Smart Script - RON scene loader
//!
//! Describes whole scenes of smart items in RON:
//! - entities addressed by name
//! - action catalogs, trigger catalogs, states and counters
//! - trigger targets and conditions that point at other entities by name
//!
//! Names are resolved to component ids when the definitions are
//! instantiated into a [`smart_core::Scene`].

mod error;
mod loader;
mod schema;

pub use error::{Error, Result};
pub use loader::{Loader, SceneDefs};
pub use schema::entity::{EntityDef, StatesDef};
pub use schema::trigger::{ConditionDef, TargetDef, TriggerDef};
pub use schema::SceneDef;
