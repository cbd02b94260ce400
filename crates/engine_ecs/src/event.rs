//! Entity events and listeners.
//!
//! Listeners live on the entity they observe. Component types install one
//! listener per [`EventBinding`](crate::EventBinding) along their type chain
//! when created, and lose them when finalized. Code outside components can
//! subscribe closures with [`World::on`] and [`World::once`].

use engine_component::{ComponentId, Entity};
use serde_json::Value;
use tracing::trace;

use crate::error::{CallbackResult, WorldError};
use crate::world::World;

/// Emitted when an entity becomes enabled in hierarchy.
pub const ENABLE: &str = "enable";
/// Emitted when an entity stops being enabled in hierarchy, including just
/// before it is destroyed.
pub const DISABLE: &str = "disable";
/// Emitted once, when an entity is activated by the flush.
pub const READY: &str = "ready";
/// Emitted once, when the flush finalizes a destroyed entity.
pub const DESTROY: &str = "destroy";

#[derive(Debug, Clone, PartialEq)]
pub struct EntityEvent {
    pub name: String,
    pub entity: Entity,
    pub detail: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

pub type EventCallback = Box<dyn FnMut(&mut World, &EntityEvent) -> CallbackResult>;

pub(crate) enum ListenerTarget {
    Component {
        component: ComponentId,
        handler: &'static str,
    },
    /// `None` while the callback is running.
    Callback(Option<EventCallback>),
}

pub(crate) struct Listener {
    pub(crate) id: ListenerId,
    pub(crate) event: String,
    pub(crate) once: bool,
    pub(crate) target: ListenerTarget,
}

enum Dispatch {
    Component(ComponentId, &'static str),
    Callback(EventCallback),
    Busy,
}

impl World {
    pub(crate) fn add_listener(
        &mut self,
        entity: Entity,
        event: &str,
        once: bool,
        target: ListenerTarget,
    ) -> Option<ListenerId> {
        let record = self.entities.get_mut(&entity)?;
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        record.listeners.push(Listener {
            id,
            event: event.to_owned(),
            once,
            target,
        });
        Some(id)
    }

    /// Subscribes `callback` to `event` on `entity`.
    ///
    /// # Errors
    ///
    /// Unknown entity.
    pub fn on<F>(
        &mut self,
        entity: Entity,
        event: &str,
        callback: F,
    ) -> Result<ListenerId, WorldError>
    where
        F: FnMut(&mut World, &EntityEvent) -> CallbackResult + 'static,
    {
        let target = ListenerTarget::Callback(Some(Box::new(callback)));
        self.add_listener(entity, event, false, target)
            .ok_or(WorldError::EntityNotFound(entity))
    }

    /// Like [`World::on`], removed after its first call.
    ///
    /// # Errors
    ///
    /// Unknown entity.
    pub fn once<F>(
        &mut self,
        entity: Entity,
        event: &str,
        callback: F,
    ) -> Result<ListenerId, WorldError>
    where
        F: FnMut(&mut World, &EntityEvent) -> CallbackResult + 'static,
    {
        self.add_listener(entity, event, true, ListenerTarget::Callback(Some(Box::new(callback))))
            .ok_or(WorldError::EntityNotFound(entity))
    }

    /// Removes a listener. Returns `false` if it was not installed.
    pub fn off(&mut self, entity: Entity, listener: ListenerId) -> bool {
        let Some(record) = self.entities.get_mut(&entity) else {
            return false;
        };
        let before = record.listeners.len();
        record.listeners.retain(|l| l.id != listener);
        record.listeners.len() != before
    }

    #[must_use]
    pub fn listener_count(&self, entity: Entity, event: &str) -> usize {
        self.entities
            .get(&entity)
            .map_or(0, |r| r.listeners.iter().filter(|l| l.event == event).count())
    }

    /// Emits a custom event with no detail.
    ///
    /// # Errors
    ///
    /// Unknown entity.
    pub fn emit(&mut self, entity: Entity, event: &str) -> Result<(), WorldError> {
        self.emit_with(entity, event, Value::Null)
    }

    /// # Errors
    ///
    /// Unknown entity.
    pub fn emit_with(
        &mut self,
        entity: Entity,
        event: &str,
        detail: Value,
    ) -> Result<(), WorldError> {
        self.entity_record(entity)?;
        self.emit_event(entity, event, detail);
        Ok(())
    }

    /// Calls every listener installed for `name` when the emit starts, in
    /// installation order. Listeners removed mid-emit are skipped; listeners
    /// added mid-emit wait for the next one.
    pub(crate) fn emit_event(&mut self, entity: Entity, name: &str, detail: Value) {
        let Some(record) = self.entities.get(&entity) else {
            return;
        };
        let ids: Vec<ListenerId> = record
            .listeners
            .iter()
            .filter(|l| l.event == name)
            .map(|l| l.id)
            .collect();
        if ids.is_empty() {
            return;
        }
        trace!(entity = %entity, event = name, listeners = ids.len(), "emit");
        let event = EntityEvent {
            name: name.to_owned(),
            entity,
            detail,
        };
        for id in ids {
            self.dispatch(entity, id, &event);
        }
    }

    fn dispatch(&mut self, entity: Entity, id: ListenerId, event: &EntityEvent) {
        let Some(record) = self.entities.get_mut(&entity) else {
            return;
        };
        let Some(pos) = record.listeners.iter().position(|l| l.id == id) else {
            return;
        };
        let once = record.listeners[pos].once;
        let action = match &mut record.listeners[pos].target {
            ListenerTarget::Component { component, handler } => {
                Dispatch::Component(*component, *handler)
            }
            ListenerTarget::Callback(slot) => {
                slot.take().map_or(Dispatch::Busy, Dispatch::Callback)
            }
        };
        if once {
            record.listeners.remove(pos);
        }

        match action {
            Dispatch::Component(component, handler) => {
                self.with_component(component, "on_event", |c, ctx| {
                    c.on_event(handler, event, ctx)
                });
            }
            Dispatch::Callback(mut callback) => {
                let result = callback(self, event);
                if !once
                    && let Some(listener) = self
                        .entities
                        .get_mut(&entity)
                        .and_then(|r| r.listeners.iter_mut().find(|l| l.id == id))
                {
                    listener.target = ListenerTarget::Callback(Some(callback));
                }
                if let Err(err) = result {
                    self.report(err, "event listener", entity);
                }
            }
            Dispatch::Busy => {
                trace!(entity = %entity, event = %event.name, "skipping re-entrant listener");
            }
        }
    }
}
