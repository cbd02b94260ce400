//! The per-frame driver and the deferred flush.
//!
//! Frame order is fixed:
//!
//! 1. every system's `tick`, in priority order;
//! 2. every system's `post_tick`, in the same order;
//! 3. flush new entities (activation);
//! 4. flush dead components (finalization);
//! 5. flush dead entities (finalization);
//! 6. reset the queues.
//!
//! Within a phase, entries are processed in enqueue order, including
//! entries enqueued by callbacks of that same phase. Entries enqueued into a
//! queue whose phase has already run this frame stay queued for the next
//! frame.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::error::WorldError;
use crate::event;
use crate::hierarchy::Parent;
use crate::system::SystemContext;
use crate::world::World;

/// Counters for one frame, returned by [`World::tick`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FrameStats {
    pub frame: u64,
    pub systems: usize,
    pub entities_activated: usize,
    pub components_destroyed: usize,
    pub entities_destroyed: usize,
    /// Queue entries left for the next frame.
    pub carried_over: usize,
    pub callback_errors: usize,
    pub live_entities: usize,
}

#[derive(Debug, Clone, Copy)]
enum SystemPass {
    Tick,
    PostTick,
}

impl World {
    /// Runs one frame.
    ///
    /// Callback errors never abort the system passes. During the flush they
    /// are handled per [`CallbackErrorPolicy`](crate::CallbackErrorPolicy).
    ///
    /// # Errors
    ///
    /// [`WorldError::TickInProgress`] when called from inside a frame, and
    /// [`WorldError::FlushAborted`] when a callback failed under
    /// `AbortFlush`.
    pub fn tick(&mut self) -> Result<FrameStats, WorldError> {
        if self.ticking {
            return Err(WorldError::TickInProgress);
        }
        self.ticking = true;
        self.frame += 1;
        self.stats = FrameStats {
            frame: self.frame,
            systems: self.registry.len(),
            ..FrameStats::default()
        };

        for index in 0..self.registry.len() {
            self.run_system(index, SystemPass::Tick);
        }
        for index in 0..self.registry.len() {
            self.run_system(index, SystemPass::PostTick);
        }

        self.flushing = true;
        self.flush_new_entities();
        if self.abort.is_none() {
            self.flush_dead_components();
        }
        if self.abort.is_none() {
            self.flush_dead_entities();
        }
        // Bookkeeping only; nothing consumes it yet.
        self.new_components.reset();
        self.flushing = false;
        self.ticking = false;

        self.stats.carried_over =
            self.new_entities.len() + self.dead_components.len() + self.dead_entities.len();
        self.stats.live_entities = self.live.len();
        let stats = self.stats;

        if let Some(reason) = self.abort.take() {
            warn!(
                frame = self.frame,
                carried_over = stats.carried_over,
                "flush aborted"
            );
            return Err(WorldError::FlushAborted {
                frame: self.frame,
                reason,
            });
        }
        debug!(
            frame = stats.frame,
            activated = stats.entities_activated,
            components_destroyed = stats.components_destroyed,
            entities_destroyed = stats.entities_destroyed,
            carried_over = stats.carried_over,
            live = stats.live_entities,
            "frame complete"
        );
        Ok(stats)
    }

    fn run_system(&mut self, index: usize, pass: SystemPass) {
        let Some((id, mut system)) = self.registry.take(index) else {
            return;
        };
        let result = {
            let mut ctx = SystemContext::new(self, &id);
            match pass {
                SystemPass::Tick => system.tick(&mut ctx),
                SystemPass::PostTick => system.post_tick(&mut ctx),
            }
        };
        self.registry.restore(index, system);
        if let Err(err) = result {
            let callback = match pass {
                SystemPass::Tick => "tick",
                SystemPass::PostTick => "post_tick",
            };
            self.report(err, callback, &id);
        }
    }

    // -- Flush phases --

    fn flush_new_entities(&mut self) {
        let mut processed = 0;
        while let Some(&entity) = self.new_entities.get(processed) {
            processed += 1;
            self.activate(entity);
            if self.abort.is_some() {
                break;
            }
        }
        self.new_entities.discard_front(processed);
    }

    fn flush_dead_components(&mut self) {
        let mut processed = 0;
        while let Some(&component) = self.dead_components.get(processed) {
            processed += 1;
            self.finalize_component(component);
            if self.abort.is_some() {
                break;
            }
        }
        self.dead_components.discard_front(processed);
    }

    fn flush_dead_entities(&mut self) {
        let mut processed = 0;
        while let Some(&entity) = self.dead_entities.get(processed) {
            processed += 1;
            self.finalize_entity(entity);
            if self.abort.is_some() {
                break;
            }
        }
        self.dead_entities.discard_front(processed);
    }

    /// Registers a pending entity live, then init, enable and `ready`.
    fn activate(&mut self, entity: engine_component::Entity) {
        let Some(record) = self.entities.get_mut(&entity) else {
            return;
        };
        record.queued = false;
        if record.destroyed || record.ready {
            return;
        }
        // Moved off the active level while queued; requeued on reattach.
        if self.tree.root(entity) != Some(self.active_level) {
            trace!(entity = %entity, "skipping activation outside the active level");
            return;
        }
        let Some(record) = self.entities.get_mut(&entity) else {
            return;
        };
        record.ready = true;
        let components = record.components.clone();
        let slot = self.live.len();
        crate::world::enqueue(&mut self.live, "live", entity);
        if let Some(record) = self.entities.get_mut(&entity) {
            record.pool_index = Some(slot);
        }

        for component in components {
            if !self.is_destroyed_component(component) {
                self.with_component(component, "on_init", |c, ctx| c.on_init(ctx));
            }
        }
        if self.is_alive(entity) && self.enabled_in_hierarchy(entity) {
            self.fire_enable_changed(entity, true);
        }
        self.emit_event(entity, event::READY, Value::Null);
        self.stats.entities_activated += 1;
    }

    /// Detaches, calls `on_destroy`, unbinds listeners and drops the record.
    fn finalize_component(&mut self, component: engine_component::ComponentId) {
        let Some(record) = self.components.get(&component) else {
            return;
        };
        let entity = record.entity;
        let listeners = record.listeners.clone();

        if let Some(owner) = self.entities.get_mut(&entity)
            && !owner.destroyed
        {
            owner.components.retain(|c| *c != component);
        }

        self.with_component(component, "on_destroy", |c, ctx| c.on_destroy(ctx));

        if let Some(owner) = self.entities.get_mut(&entity) {
            owner.listeners.retain(|l| !listeners.contains(&l.id));
        }
        self.components.remove(&component);
        self.stats.components_destroyed += 1;
    }

    /// Emits `destroy`, unlinks the entity from its parent and the live
    /// registry, and drops the record.
    fn finalize_entity(&mut self, entity: engine_component::Entity) {
        if !self.entities.contains_key(&entity) {
            return;
        }
        self.emit_event(entity, event::DESTROY, Value::Null);

        // Components destroyed after the dead-component phase ran.
        let leftovers: Vec<_> = self
            .components_of(entity)
            .iter()
            .copied()
            .filter(|c| self.components.contains_key(c))
            .collect();
        for component in leftovers {
            self.finalize_component(component);
        }

        let parent_alive = match self.tree.parent(entity) {
            Some(Parent::Level(_)) => true,
            Some(Parent::Entity(p)) => self.is_alive(p),
            None => false,
        };
        if parent_alive {
            self.tree.detach(entity);
        }

        let Some(record) = self.entities.get_mut(&entity) else {
            return;
        };
        if let Some(index) = record.pool_index.take() {
            self.live.fast_remove(index);
            if let Some(&moved) = self.live.get(index)
                && let Some(moved) = self.entities.get_mut(&moved)
            {
                moved.pool_index = Some(index);
            }
        }
        self.tree.forget(entity);
        self.entities.remove(&entity);
        self.stats.entities_destroyed += 1;
    }
}
