use engine_component::{ComponentId, Entity};
use engine_schema::SchemaError;
use thiserror::Error;

use crate::hierarchy::LevelId;

/// Return type of every component and system callback.
///
/// A callback error never unwinds through the world; it is reported and
/// handled according to [`CallbackErrorPolicy`](crate::CallbackErrorPolicy).
pub type CallbackResult = anyhow::Result<()>;

#[derive(Debug, Error)]
pub enum WorldError {
    #[error("{0} not found")]
    EntityNotFound(Entity),
    #[error("{0} not found")]
    ComponentNotFound(ComponentId),
    #[error("level {0} not found")]
    LevelNotFound(LevelId),
    #[error("unknown component type '{0}'")]
    UnknownComponentType(String),
    #[error("{0} is destroyed")]
    EntityDestroyed(Entity),
    #[error("cannot attach under destroyed {0}")]
    DestroyedParent(Entity),
    #[error("moving {child} under {parent} would create a cycle")]
    HierarchyCycle { child: Entity, parent: Entity },
    #[error("{pool} pool is full (capacity {capacity})")]
    PoolFull { pool: &'static str, capacity: usize },
    #[error("a system with id '{0}' is already registered")]
    DuplicateSystem(String),
    #[error("systems cannot be registered while the world is ticking")]
    RegistryLocked,
    #[error("tick called re-entrantly from inside a frame")]
    TickInProgress,
    #[error("flush aborted in frame {frame}: {reason}")]
    FlushAborted { frame: u64, reason: String },
    #[error("invalid level document: {0}")]
    InvalidLevel(String),
    #[error("invalid object: {0}")]
    InvalidObject(#[from] SchemaError),
    #[error("malformed level json: {0}")]
    LevelJson(#[from] serde_json::Error),
}
