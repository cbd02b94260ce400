//! Per-frame drivers bound to a component type.

use std::fmt;
use std::ops::{Deref, DerefMut};

use engine_component::ComponentId;

use crate::component::AsAny;
use crate::error::CallbackResult;
use crate::world::World;

/// A per-frame driver for one component type.
///
/// `tick` runs for every system in priority order, then `post_tick` runs
/// for every system in the same order, before the frame's flush.
pub trait System: AsAny {
    /// Called once, when the system is registered.
    fn init(&mut self, _ctx: &mut SystemContext<'_>) -> CallbackResult {
        Ok(())
    }

    fn tick(&mut self, _ctx: &mut SystemContext<'_>) -> CallbackResult {
        Ok(())
    }

    fn post_tick(&mut self, _ctx: &mut SystemContext<'_>) -> CallbackResult {
        Ok(())
    }
}

/// Access to the world from inside a system hook. Dereferences to
/// [`World`].
///
/// The running system is lent out of the world for the duration of the
/// hook, so [`World::system_as`] does not find it.
pub struct SystemContext<'w> {
    world: &'w mut World,
    system_id: &'w str,
}

impl<'w> SystemContext<'w> {
    pub(crate) fn new(world: &'w mut World, system_id: &'w str) -> Self {
        Self { world, system_id }
    }

    /// Id of the system being run.
    #[must_use]
    pub fn system_id(&self) -> &str {
        self.system_id
    }

    /// Active components bound to this system, in live-registry order.
    #[must_use]
    pub fn components(&self) -> Vec<ComponentId> {
        self.world.active_components(self.system_id)
    }
}

impl Deref for SystemContext<'_> {
    type Target = World;

    fn deref(&self) -> &World {
        self.world
    }
}

impl DerefMut for SystemContext<'_> {
    fn deref_mut(&mut self) -> &mut World {
        self.world
    }
}

/// Everything needed to register a system.
pub struct SystemDescriptor {
    pub id: String,
    /// Lower runs first. Equal priorities keep registration order.
    pub priority: i32,
    /// Name of the component type this system drives. Components of
    /// derived types bind to it too.
    pub component: String,
    pub system: Box<dyn System>,
}

impl SystemDescriptor {
    #[must_use]
    pub fn new(id: impl Into<String>, component: impl Into<String>, system: impl System) -> Self {
        Self {
            id: id.into(),
            priority: 0,
            component: component.into(),
            system: Box::new(system),
        }
    }

    /// Sets the priority; lower runs first.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl fmt::Debug for SystemDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemDescriptor")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("component", &self.component)
            .finish_non_exhaustive()
    }
}
