//! Error types for smart-core
//!
//! Authoring mistakes (bad state values, dangling trigger targets) are not
//! errors; they degrade to no-ops and are logged. Only setup and explicit
//! lookups surface through this type.

use crate::{ActionType, EntityId};
use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    #[error("Scene has no root identity counter")]
    MissingRoot,

    #[error("Setup failed: {0}")]
    Setup(String),

    #[error("Invalid payload for {action:?}: {reason}")]
    InvalidPayload { action: ActionType, reason: String },

    #[error("Duplicate action '{name}' on {entity}")]
    DuplicateAction { entity: EntityId, name: String },

    #[error("Config parse error: {0}")]
    Config(#[from] ron::error::SpannedError),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
