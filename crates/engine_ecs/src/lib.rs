//! # engine_ecs
//!
//! The entity/component scheduling core.
//!
//! A [`World`] owns every entity and component, the scene hierarchy, the
//! levels and the registered systems. Code running inside callbacks may
//! create, destroy, enable and reparent freely; structural changes to the
//! live registry are deferred to the flush at the end of [`World::tick`],
//! so no system ever iterates a collection that changes under it.
//!
//! Components can also be wired to each other from data: a field holding
//! [`ComponentEvent`] objects names handlers on other entities' components,
//! and [`ComponentEvent::emit`] calls them.
//!
//! ```rust,ignore
//! let mut world = World::with_systems(
//!     WorldConfig::default(),
//!     &[&MOVER],
//!     vec![SystemDescriptor::new("movement", "Mover", MovementSystem::default())],
//! );
//! let player = world.create_entity("player", None)?;
//! world.create_component(player, "Mover", &json!({ "speed": 2.0 }))?;
//! let stats = world.tick()?; // player becomes live here
//! ```

pub mod clone;
pub mod component;
pub mod component_event;
pub mod config;
pub mod error;
pub mod event;
pub mod flush;
pub mod hierarchy;
pub mod level;
pub mod registry;
pub mod system;
pub mod world;

#[cfg(test)]
mod test_support;

pub use component::{AsAny, Component, ComponentType, Context, EventBinding};
pub use component_event::{COMPONENT_EVENT, ComponentEvent};
pub use config::{CallbackErrorPolicy, WorldConfig};
pub use error::{CallbackResult, WorldError};
pub use event::{EntityEvent, EventCallback, ListenerId};
pub use flush::FrameStats;
pub use hierarchy::{LevelId, Parent, SceneTree};
pub use level::{ComponentDocument, EntityDocument, LevelDocument};
pub use registry::SystemRegistry;
pub use system::{System, SystemContext, SystemDescriptor};
pub use world::World;

pub use engine_component::{ComponentId, ComponentTypeId, Entity, OverflowPolicy};
pub use engine_schema::{FieldType, FieldValue, ObjectValue, Schema};
