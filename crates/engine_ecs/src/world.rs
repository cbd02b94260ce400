//! The world: single authority over entity and component identity,
//! structural mutation timing and system execution order.
//!
//! Structural changes requested through the world never touch the live
//! registry directly. They are recorded in four queues (new entities, dead
//! entities, new components, dead components) and applied by the flush at
//! the end of [`World::tick`]. Enable/disable, init and destroy callbacks
//! still fire synchronously where the lifecycle requires it.

use std::collections::HashMap;
use std::fmt;

use engine_component::{
    ComponentAllocator, ComponentId, Entity, EntityAllocator, OverflowPolicy, Pool,
};
use engine_schema::{FieldValue, ObjectTypes, ObjectValue, Schema};
use serde_json::Value;
use tracing::{debug, error, info, trace, warn};

use crate::component::{Component, ComponentType, Context};
use crate::component_event::{COMPONENT_EVENT, component_event_schema};
use crate::config::{CallbackErrorPolicy, WorldConfig};
use crate::error::{CallbackResult, WorldError};
use crate::event::{self, Listener, ListenerTarget};
use crate::flush::FrameStats;
use crate::hierarchy::{LevelId, Parent, SceneTree};
use crate::registry::SystemRegistry;
use crate::system::{System, SystemContext, SystemDescriptor};

pub(crate) struct EntityRecord {
    pub(crate) name: String,
    pub(crate) enabled: bool,
    pub(crate) ready: bool,
    /// Present in the new-entity queue.
    pub(crate) queued: bool,
    pub(crate) destroyed: bool,
    /// Slot in the live registry once ready.
    pub(crate) pool_index: Option<usize>,
    pub(crate) components: Vec<ComponentId>,
    pub(crate) listeners: Vec<Listener>,
}

pub(crate) struct ComponentRecord {
    pub(crate) entity: Entity,
    pub(crate) ty: &'static ComponentType,
    pub(crate) enabled: bool,
    pub(crate) destroyed: bool,
    /// `on_enable` was the last of the enable hooks to run.
    pub(crate) enable_delivered: bool,
    /// Id of the system resolved at creation.
    pub(crate) system: Option<String>,
    pub(crate) listeners: Vec<event::ListenerId>,
    /// `None` while one of its callbacks is running.
    pub(crate) behavior: Option<Box<dyn Component>>,
}

/// The scheduler.
pub struct World {
    pub(crate) config: WorldConfig,
    entity_ids: EntityAllocator,
    component_ids: ComponentAllocator,
    pub(crate) entities: HashMap<Entity, EntityRecord>,
    pub(crate) components: HashMap<ComponentId, ComponentRecord>,
    types: HashMap<&'static str, &'static ComponentType>,
    object_types: ObjectTypes,
    pub(crate) registry: SystemRegistry,
    pub(crate) tree: SceneTree,
    pub(crate) levels: HashMap<LevelId, String>,
    pub(crate) next_level: u32,
    pub(crate) active_level: LevelId,

    // -- Pools --
    pub(crate) live: Pool<Entity>,
    pub(crate) new_entities: Pool<Entity>,
    pub(crate) dead_entities: Pool<Entity>,
    pub(crate) new_components: Pool<ComponentId>,
    pub(crate) dead_components: Pool<ComponentId>,

    pub(crate) next_listener: u64,
    pub(crate) frame: u64,
    pub(crate) ticking: bool,
    pub(crate) flushing: bool,
    /// First error reported during a flush under [`CallbackErrorPolicy::AbortFlush`].
    pub(crate) abort: Option<String>,
    pub(crate) stats: FrameStats,
}

pub(crate) const NEW_ENTITIES: &str = "new entities";
pub(crate) const DEAD_ENTITIES: &str = "dead entities";
pub(crate) const NEW_COMPONENTS: &str = "new components";
pub(crate) const DEAD_COMPONENTS: &str = "dead components";

pub(crate) fn ensure_room<T>(
    pool: &Pool<T>,
    name: &'static str,
    n: usize,
) -> Result<(), WorldError> {
    if pool.has_room_for(n) {
        Ok(())
    } else {
        Err(WorldError::PoolFull {
            pool: name,
            capacity: pool.capacity(),
        })
    }
}

pub(crate) fn enqueue<T: fmt::Display + Copy>(pool: &mut Pool<T>, name: &'static str, item: T) {
    if let Err(err) = pool.push(item) {
        error!(pool = name, item = %item, error = %err, "queue overflow");
    }
}

impl World {
    /// Creates an empty world with a single, active default level.
    #[must_use]
    pub fn new(config: WorldConfig) -> Self {
        let size = config.pool_size;
        let overflow = config.overflow;
        let active_level = LevelId(0);
        let mut levels = HashMap::new();
        levels.insert(active_level, "default".to_owned());
        let mut object_types = ObjectTypes::new();
        object_types.register(COMPONENT_EVENT, component_event_schema());
        Self {
            config,
            entity_ids: EntityAllocator::new(),
            component_ids: ComponentAllocator::new(),
            entities: HashMap::new(),
            components: HashMap::new(),
            types: HashMap::new(),
            object_types,
            registry: SystemRegistry::new(),
            tree: SceneTree::new(),
            levels,
            next_level: 1,
            active_level,
            live: Pool::new(size, OverflowPolicy::Grow),
            new_entities: Pool::new(size, overflow),
            dead_entities: Pool::new(size, overflow),
            new_components: Pool::new(size, overflow),
            dead_components: Pool::new(size, overflow),
            next_listener: 1,
            frame: 0,
            ticking: false,
            flushing: false,
            abort: None,
            stats: FrameStats::default(),
        }
    }

    /// Creates a world, registers `types` and then `systems` in order.
    #[must_use]
    pub fn with_systems(
        config: WorldConfig,
        types: &[&'static ComponentType],
        systems: Vec<SystemDescriptor>,
    ) -> Self {
        let mut world = Self::new(config);
        for ty in types {
            world.register_type(ty);
        }
        for descriptor in systems {
            let id = descriptor.id.clone();
            if let Err(err) = world.register_system(descriptor) {
                warn!(system = %id, error = %err, "failed to register system");
            }
        }
        world
    }

    /// The configuration the world was created with.
    #[must_use]
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Number of completed or running frames.
    #[must_use]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    // -- Types and systems --

    /// Makes `ty` and every base on its chain creatable by name.
    pub fn register_type(&mut self, ty: &'static ComponentType) {
        for t in ty.chain() {
            if let Some(existing) = self.types.insert(t.name, t)
                && !std::ptr::eq(existing, t)
            {
                warn!(component = t.name, "replacing component type with same name");
            }
        }
        debug!(component = ty.name, "registered component type");
    }

    /// The registered type named `name`, bases included.
    #[must_use]
    pub fn component_type(&self, name: &str) -> Option<&'static ComponentType> {
        self.types.get(name).copied()
    }

    /// Registers a plain object type that component fields can hold.
    /// `ComponentEvent` is registered from the start.
    pub fn register_object_type(&mut self, name: &str, schema: Schema) {
        if self.object_types.register(name, schema).is_some() {
            warn!(object = name, "replacing object type with same name");
        }
        debug!(object = name, "registered object type");
    }

    /// Every registered object type.
    #[must_use]
    pub fn object_types(&self) -> &ObjectTypes {
        &self.object_types
    }

    /// Builds an instance of a registered object type from loosely-typed
    /// data. Entity references in `data` are raw ids.
    ///
    /// # Errors
    ///
    /// [`WorldError::InvalidObject`] for an unknown type name or data that
    /// is not an object.
    pub fn create_object(
        &self,
        type_name: &str,
        data: &Value,
    ) -> Result<ObjectValue, WorldError> {
        Ok(self.object_types.create(type_name, data, None)?)
    }

    /// Runs the system's `init` hook, then inserts it in priority order.
    ///
    /// # Errors
    ///
    /// [`WorldError::RegistryLocked`] while the world is ticking, or
    /// [`WorldError::DuplicateSystem`] when the id is taken.
    pub fn register_system(&mut self, mut descriptor: SystemDescriptor) -> Result<(), WorldError> {
        if self.ticking {
            return Err(WorldError::RegistryLocked);
        }
        if self.registry.position(&descriptor.id).is_some() {
            return Err(WorldError::DuplicateSystem(descriptor.id));
        }
        if !self.types.contains_key(descriptor.component.as_str()) {
            warn!(
                system = %descriptor.id,
                component = %descriptor.component,
                "system bound to an unregistered component type"
            );
        }

        let id = descriptor.id.clone();
        let result = {
            let mut ctx = SystemContext::new(self, &id);
            descriptor.system.init(&mut ctx)
        };
        if let Err(err) = result {
            self.report(err, "init", &id);
        }
        if self.ticking {
            return Err(WorldError::RegistryLocked);
        }

        info!(
            system = %id,
            priority = descriptor.priority,
            component = %descriptor.component,
            "registered system"
        );
        self.registry.register(descriptor);
        Ok(())
    }

    /// The system registered as `id`. `None` while it is running.
    #[must_use]
    pub fn system(&self, id: &str) -> Option<&dyn System> {
        self.registry.get(self.registry.position(id)?)
    }

    /// The system registered as `id`, downcast to `T`.
    #[must_use]
    pub fn system_as<T: System>(&self, id: &str) -> Option<&T> {
        self.system(id)?.as_any().downcast_ref()
    }

    /// `None` while the system itself is running.
    pub fn system_as_mut<T: System>(&mut self, id: &str) -> Option<&mut T> {
        let index = self.registry.position(id)?;
        self.registry.get_mut(index)?.as_any_mut().downcast_mut()
    }

    /// System ids in execution order.
    #[must_use]
    pub fn system_ids(&self) -> Vec<&str> {
        self.registry.ids().collect()
    }

    // -- Entity lifecycle --

    pub(crate) fn entity_record(&self, entity: Entity) -> Result<&EntityRecord, WorldError> {
        self.entities
            .get(&entity)
            .ok_or(WorldError::EntityNotFound(entity))
    }

    fn validate_parent(&self, parent: Parent) -> Result<Option<LevelId>, WorldError> {
        match parent {
            Parent::Level(level) => {
                if !self.levels.contains_key(&level) {
                    return Err(WorldError::LevelNotFound(level));
                }
                Ok(Some(level))
            }
            Parent::Entity(p) => {
                if self.entity_record(p)?.destroyed {
                    return Err(WorldError::DestroyedParent(p));
                }
                Ok(self.tree.root(p))
            }
        }
    }

    pub(crate) fn spawn(&mut self, name: String, enabled: bool, parent: Option<Parent>) -> Entity {
        let entity = self.entity_ids.allocate();
        self.entities.insert(
            entity,
            EntityRecord {
                name,
                enabled,
                ready: false,
                queued: false,
                destroyed: false,
                pool_index: None,
                components: Vec::new(),
                listeners: Vec::new(),
            },
        );
        self.tree.set_parent(entity, parent);
        entity
    }

    /// Marks an entity as pending activation at the next flush.
    pub(crate) fn enqueue_new(&mut self, entity: Entity) {
        if let Some(record) = self.entities.get_mut(&entity) {
            record.queued = true;
            enqueue(&mut self.new_entities, NEW_ENTITIES, entity);
        }
    }

    /// Creates an entity under `parent` (default: the active level).
    ///
    /// The entity is queued for activation only when its chain ends at the
    /// active level. Entities built under another level become reachable
    /// when that level is loaded.
    ///
    /// # Errors
    ///
    /// Unknown or destroyed parent, or a full new-entity queue under
    /// [`OverflowPolicy::Reject`].
    pub fn create_entity(
        &mut self,
        name: impl Into<String>,
        parent: Option<Parent>,
    ) -> Result<Entity, WorldError> {
        let parent = parent.unwrap_or(Parent::Level(self.active_level));
        let root = self.validate_parent(parent)?;
        let activate = root == Some(self.active_level);
        if activate {
            ensure_room(&self.new_entities, NEW_ENTITIES, 1)?;
        }

        let entity = self.spawn(name.into(), true, Some(parent));
        if activate {
            self.enqueue_new(entity);
        }
        debug!(entity = %entity, queued = activate, "created entity");
        Ok(entity)
    }

    /// Every not-yet-destroyed entity in `root`'s subtree, and their
    /// not-yet-destroyed components.
    pub(crate) fn doomed(&self, root: Entity) -> (Vec<Entity>, Vec<ComponentId>) {
        let entities: Vec<Entity> = self
            .tree
            .subtree(root)
            .into_iter()
            .filter(|e| self.entities.get(e).is_some_and(|r| !r.destroyed))
            .collect();
        let components = entities
            .iter()
            .filter_map(|e| self.entities.get(e))
            .flat_map(|r| r.components.iter().copied())
            .filter(|c| self.components.get(c).is_some_and(|r| !r.destroyed))
            .collect();
        (entities, components)
    }

    /// Destroys an entity, its descendants and all their components.
    ///
    /// Listeners on each entity that is ready and enabled in hierarchy see
    /// `disable` immediately; finalization happens at the next flush.
    /// Destroying an entity twice is a no-op.
    ///
    /// # Errors
    ///
    /// Unknown entity, or full dead queues under [`OverflowPolicy::Reject`].
    pub fn destroy_entity(&mut self, entity: Entity) -> Result<(), WorldError> {
        if self.entity_record(entity)?.destroyed {
            trace!(entity = %entity, "already destroyed");
            return Ok(());
        }
        let (entities, components) = self.doomed(entity);
        ensure_room(&self.dead_entities, DEAD_ENTITIES, entities.len())?;
        ensure_room(&self.dead_components, DEAD_COMPONENTS, components.len())?;
        self.destroy_doomed(entities, components);
        Ok(())
    }

    /// Marks and enqueues first, then fires the disable notifications.
    pub(crate) fn destroy_doomed(&mut self, entities: Vec<Entity>, components: Vec<ComponentId>) {
        for &e in &entities {
            if let Some(record) = self.entities.get_mut(&e) {
                record.destroyed = true;
                enqueue(&mut self.dead_entities, DEAD_ENTITIES, e);
            }
        }
        for &c in &components {
            if let Some(record) = self.components.get_mut(&c) {
                record.destroyed = true;
                enqueue(&mut self.dead_components, DEAD_COMPONENTS, c);
            }
        }
        debug!(
            entities = entities.len(),
            components = components.len(),
            "destroyed subtree"
        );

        for &e in &entities {
            if self.is_ready(e) && self.enabled_in_hierarchy(e) {
                self.emit_event(e, event::DISABLE, Value::Null);
            }
            let owned = self
                .entities
                .get(&e)
                .map(|r| r.components.clone())
                .unwrap_or_default();
            for c in owned.into_iter().filter(|c| components.contains(c)) {
                self.deliver_enable(c, false);
            }
        }
    }

    /// Toggles an entity's local flag, cascading enable/disable through the
    /// subtree when its hierarchy state flips.
    ///
    /// # Errors
    ///
    /// Unknown entity.
    pub fn set_enabled(&mut self, entity: Entity, enabled: bool) -> Result<(), WorldError> {
        let record = self.entity_record(entity)?;
        if record.destroyed {
            debug!(entity = %entity, "ignoring enable toggle on destroyed entity");
            return Ok(());
        }
        if record.enabled == enabled {
            return Ok(());
        }
        let ready = record.ready;
        let before = self.enabled_in_hierarchy(entity);
        if let Some(record) = self.entities.get_mut(&entity) {
            record.enabled = enabled;
        }
        let after = self.enabled_in_hierarchy(entity);
        if ready && before != after {
            self.notify_enable_changed(entity, after);
        }
        Ok(())
    }

    /// Moves `entity` under `parent`, or detaches it with `None`.
    ///
    /// Fires the enable cascade if the move flips the entity's hierarchy
    /// state. A subtree that is not yet live and lands under the active
    /// level is queued for activation.
    ///
    /// # Errors
    ///
    /// Unknown or destroyed entity or parent, a parent inside `entity`'s own
    /// subtree, or a full new-entity queue under [`OverflowPolicy::Reject`].
    pub fn set_parent(&mut self, entity: Entity, parent: Option<Parent>) -> Result<(), WorldError> {
        let record = self.entity_record(entity)?;
        if record.destroyed {
            return Err(WorldError::EntityDestroyed(entity));
        }
        let ready = record.ready;
        let root = match parent {
            Some(Parent::Entity(p)) if p == entity || self.tree.is_ancestor(entity, p) => {
                return Err(WorldError::HierarchyCycle {
                    child: entity,
                    parent: p,
                });
            }
            Some(p) => self.validate_parent(p)?,
            None => None,
        };

        let pending: Vec<Entity> = if root == Some(self.active_level) {
            self.tree
                .subtree(entity)
                .into_iter()
                .filter(|e| {
                    self.entities
                        .get(e)
                        .is_some_and(|r| !r.ready && !r.queued && !r.destroyed)
                })
                .collect()
        } else {
            Vec::new()
        };
        ensure_room(&self.new_entities, NEW_ENTITIES, pending.len())?;

        let before = self.enabled_in_hierarchy(entity);
        self.tree.set_parent(entity, parent);
        for e in pending {
            self.enqueue_new(e);
        }
        let after = self.enabled_in_hierarchy(entity);
        if ready && before != after {
            self.notify_enable_changed(entity, after);
        }
        Ok(())
    }

    // -- Enable state --

    /// Local flag of the entity and of every entity ancestor. Levels count
    /// as enabled.
    #[must_use]
    pub fn enabled_in_hierarchy(&self, entity: Entity) -> bool {
        let enabled = |e: &Entity| self.entities.get(e).is_some_and(|r| r.enabled);
        enabled(&entity) && self.tree.ancestors(entity).iter().all(enabled)
    }

    /// Enable state as a component callback sees it: the component, its
    /// entity and the entity's ancestors are all enabled, and the entity is
    /// ready.
    pub(crate) fn component_active(&self, component: ComponentId) -> bool {
        self.components.get(&component).is_some_and(|c| {
            c.enabled && self.is_ready(c.entity) && self.enabled_in_hierarchy(c.entity)
        })
    }

    /// Fires on `root` and on each descendant reached through locally
    /// enabled nodes.
    pub(crate) fn notify_enable_changed(&mut self, root: Entity, enabled: bool) {
        let mut targets = vec![root];
        self.tree.walk_pruned(Parent::Entity(root), |node| {
            let on = self.entities.get(&node).is_some_and(|r| r.enabled);
            if on {
                targets.push(node);
            }
            on
        });
        for target in targets {
            self.fire_enable_changed(target, enabled);
        }
    }

    /// Emits `enable`/`disable` on one entity and calls the matching hook
    /// on its enabled components.
    pub(crate) fn fire_enable_changed(&mut self, entity: Entity, enabled: bool) {
        let Some(record) = self.entities.get(&entity) else {
            return;
        };
        if record.destroyed || !record.ready || self.enabled_in_hierarchy(entity) != enabled {
            return;
        }
        let components = record.components.clone();
        let name = if enabled { event::ENABLE } else { event::DISABLE };
        self.emit_event(entity, name, Value::Null);
        for c in components {
            let runnable = self
                .components
                .get(&c)
                .is_some_and(|r| r.enabled && !r.destroyed);
            if runnable {
                self.deliver_enable(c, enabled);
            }
        }
    }

    /// Runs `on_enable` or `on_disable` unless that hook was already the
    /// last one delivered, so a component created or re-enabled from inside
    /// another callback is never enabled twice.
    pub(crate) fn deliver_enable(&mut self, component: ComponentId, enabled: bool) {
        let Some(record) = self.components.get_mut(&component) else {
            return;
        };
        if record.enable_delivered == enabled {
            return;
        }
        record.enable_delivered = enabled;
        let ran = if enabled {
            self.with_component(component, "on_enable", |c, ctx| c.on_enable(ctx))
        } else {
            self.with_component(component, "on_disable", |c, ctx| c.on_disable(ctx))
        };
        if !ran && let Some(record) = self.components.get_mut(&component) {
            record.enable_delivered = !enabled;
        }
    }

    // -- Component lifecycle --

    /// Creates a component of the registered type `type_name` on `entity`.
    ///
    /// `data` is parsed against the type's schema; rejected values keep the
    /// constructed default. If the entity is already ready, `on_init` and
    /// (when enabled in hierarchy) `on_enable` run before this returns.
    ///
    /// # Errors
    ///
    /// Unknown type, unknown or destroyed entity, or a full new-component
    /// queue under [`OverflowPolicy::Reject`].
    pub fn create_component(
        &mut self,
        entity: Entity,
        type_name: &str,
        data: &Value,
    ) -> Result<ComponentId, WorldError> {
        self.create_component_inner(entity, type_name, data, None)
    }

    /// Like [`World::create_component`], resolving entity references in
    /// `data` against `entities`.
    ///
    /// # Errors
    ///
    /// As [`World::create_component`].
    pub fn create_component_with_refs(
        &mut self,
        entity: Entity,
        type_name: &str,
        data: &Value,
        entities: &[Entity],
    ) -> Result<ComponentId, WorldError> {
        self.create_component_inner(entity, type_name, data, Some(entities))
    }

    fn create_component_inner(
        &mut self,
        entity: Entity,
        type_name: &str,
        data: &Value,
        refs: Option<&[Entity]>,
    ) -> Result<ComponentId, WorldError> {
        let Some(ty) = self.component_type(type_name) else {
            error!(entity = %entity, component = type_name, "unknown component type");
            return Err(WorldError::UnknownComponentType(type_name.to_owned()));
        };
        if self.entity_record(entity)?.destroyed {
            return Err(WorldError::EntityDestroyed(entity));
        }
        ensure_room(&self.new_components, NEW_COMPONENTS, 1)?;

        let mut behavior = (ty.construct)();
        match ty.full_schema().parse_in(data, refs, Some(&self.object_types)) {
            Ok(outcome) => {
                if !outcome.errors.is_empty() {
                    debug!(
                        component = ty.name,
                        rejected = outcome.errors.len(),
                        "ignored part of component data"
                    );
                }
                for (name, value) in outcome.values {
                    behavior.set_field(&name, value);
                }
            }
            Err(err) => warn!(component = ty.name, error = %err, "ignoring component data"),
        }

        let component = self.attach_component(entity, ty, behavior, true);
        if self.is_ready(entity) {
            self.with_component(component, "on_init", |c, ctx| c.on_init(ctx));
            if self.component_active(component) && !self.is_destroyed_component(component) {
                self.deliver_enable(component, true);
            }
        }
        Ok(component)
    }

    /// Allocates the record, binds the system and the type chain's event
    /// listeners, and records the component on its entity.
    pub(crate) fn attach_component(
        &mut self,
        entity: Entity,
        ty: &'static ComponentType,
        behavior: Box<dyn Component>,
        enabled: bool,
    ) -> ComponentId {
        let component = self.component_ids.allocate();
        let system = self.registry.resolve(ty).map(str::to_owned);
        if system.is_none() {
            warn!(
                entity = %entity,
                component = ty.name,
                "no system registered for component type"
            );
        }

        let mut listeners = Vec::new();
        for t in ty.chain() {
            for binding in t.events {
                let target = ListenerTarget::Component {
                    component,
                    handler: binding.handler,
                };
                if let Some(id) = self.add_listener(entity, binding.event, false, target) {
                    listeners.push(id);
                }
            }
        }

        self.components.insert(
            component,
            ComponentRecord {
                entity,
                ty,
                enabled,
                destroyed: false,
                enable_delivered: false,
                system,
                listeners,
                behavior: Some(behavior),
            },
        );
        if let Some(record) = self.entities.get_mut(&entity) {
            record.components.push(component);
        }
        enqueue(&mut self.new_components, NEW_COMPONENTS, component);
        debug!(entity = %entity, component = %component, kind = ty.name, "created component");
        component
    }

    /// Destroys one component. `on_disable` runs now if the component was
    /// active; finalization happens at the next flush. Idempotent.
    ///
    /// # Errors
    ///
    /// Unknown component, or a full dead-component queue under
    /// [`OverflowPolicy::Reject`].
    pub fn destroy_component(&mut self, component: ComponentId) -> Result<(), WorldError> {
        let record = self
            .components
            .get(&component)
            .ok_or(WorldError::ComponentNotFound(component))?;
        if record.destroyed {
            trace!(component = %component, "already destroyed");
            return Ok(());
        }
        ensure_room(&self.dead_components, DEAD_COMPONENTS, 1)?;

        if let Some(record) = self.components.get_mut(&component) {
            record.destroyed = true;
        }
        enqueue(&mut self.dead_components, DEAD_COMPONENTS, component);
        self.deliver_enable(component, false);
        Ok(())
    }

    /// Toggles a component's local flag, calling `on_enable`/`on_disable`
    /// when its entity is ready and enabled in hierarchy.
    ///
    /// # Errors
    ///
    /// Unknown component.
    pub fn set_component_enabled(
        &mut self,
        component: ComponentId,
        enabled: bool,
    ) -> Result<(), WorldError> {
        let record = self
            .components
            .get_mut(&component)
            .ok_or(WorldError::ComponentNotFound(component))?;
        if record.destroyed || record.enabled == enabled {
            return Ok(());
        }
        record.enabled = enabled;
        let entity = record.entity;
        if self.is_ready(entity) && self.enabled_in_hierarchy(entity) {
            self.deliver_enable(component, enabled);
        }
        Ok(())
    }

    /// Assigns a schema field. Returns `Ok(false)` when the value was
    /// rejected (unknown field or wrong type) or the component is busy in
    /// one of its own callbacks.
    ///
    /// # Errors
    ///
    /// Unknown component.
    pub fn set_field(
        &mut self,
        component: ComponentId,
        name: &str,
        value: impl Into<FieldValue>,
    ) -> Result<bool, WorldError> {
        let record = self
            .components
            .get_mut(&component)
            .ok_or(WorldError::ComponentNotFound(component))?;
        let value = match record.ty.full_schema().check(name, value.into()) {
            Ok(value) => value,
            Err(err) => {
                debug!(component = %component, error = %err, "ignoring field assignment");
                return Ok(false);
            }
        };
        match record.behavior.as_mut() {
            Some(behavior) => {
                behavior.set_field(name, value);
                Ok(true)
            }
            None => {
                trace!(component = %component, field = name, "component busy, field not set");
                Ok(false)
            }
        }
    }

    /// Current value of a component field, read through the component.
    #[must_use]
    pub fn field(&self, component: ComponentId, name: &str) -> Option<FieldValue> {
        self.components.get(&component)?.behavior.as_ref()?.field(name)
    }

    // -- Callback plumbing --

    /// Lends a component's behaviour to `f`. A component already lent out
    /// (re-entrant call from one of its own callbacks) is skipped. Returns
    /// whether `f` ran.
    pub(crate) fn with_component<F>(
        &mut self,
        component: ComponentId,
        callback: &'static str,
        f: F,
    ) -> bool
    where
        F: FnOnce(&mut dyn Component, &mut Context<'_>) -> CallbackResult,
    {
        let Some(record) = self.components.get_mut(&component) else {
            return false;
        };
        let entity = record.entity;
        let Some(mut behavior) = record.behavior.take() else {
            trace!(component = %component, callback, "skipping re-entrant callback");
            return false;
        };
        let result = {
            let mut ctx = Context::new(self, component, entity);
            f(behavior.as_mut(), &mut ctx)
        };
        if let Some(record) = self.components.get_mut(&component) {
            record.behavior = Some(behavior);
        }
        if let Err(err) = result {
            self.report(err, callback, component);
        }
        true
    }

    /// Logs and counts a callback failure. During a flush under
    /// [`CallbackErrorPolicy::AbortFlush`] the first failure also requests
    /// the flush to stop.
    pub(crate) fn report(
        &mut self,
        err: anyhow::Error,
        callback: &'static str,
        target: impl fmt::Display,
    ) {
        self.stats.callback_errors += 1;
        error!(
            frame = self.frame,
            callback,
            target = %target,
            error = %err,
            "callback failed"
        );
        if self.flushing
            && self.config.callback_errors == CallbackErrorPolicy::AbortFlush
            && self.abort.is_none()
        {
            self.abort = Some(format!("{callback} on {target}: {err:#}"));
        }
    }

    // -- Lookup --

    /// Exists and has not been destroyed.
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.get(&entity).is_some_and(|r| !r.destroyed)
    }

    /// Activated by a flush and registered live.
    #[must_use]
    pub fn is_ready(&self, entity: Entity) -> bool {
        self.entities.get(&entity).is_some_and(|r| r.ready)
    }

    /// Local enabled flag.
    #[must_use]
    pub fn is_enabled(&self, entity: Entity) -> bool {
        self.entities.get(&entity).is_some_and(|r| r.enabled)
    }

    /// Name given at creation.
    #[must_use]
    pub fn entity_name(&self, entity: Entity) -> Option<&str> {
        self.entities.get(&entity).map(|r| r.name.as_str())
    }

    /// Slot in the live registry, once ready.
    #[must_use]
    pub fn pool_index(&self, entity: Entity) -> Option<usize> {
        self.entities.get(&entity)?.pool_index
    }

    /// Live entities in registry order.
    #[must_use]
    pub fn live_entities(&self) -> &[Entity] {
        self.live.as_slice()
    }

    /// Parent entity or level; `None` when detached.
    #[must_use]
    pub fn parent(&self, entity: Entity) -> Option<Parent> {
        self.tree.parent(entity)
    }

    /// Direct children in attach order.
    #[must_use]
    pub fn children(&self, entity: Entity) -> &[Entity] {
        self.tree.children(entity)
    }

    /// The scene tree, for walks the world does not wrap.
    #[must_use]
    pub fn hierarchy(&self) -> &SceneTree {
        &self.tree
    }

    /// Components owned by `entity`, in attach order.
    #[must_use]
    pub fn components_of(&self, entity: Entity) -> &[ComponentId] {
        self.entities
            .get(&entity)
            .map(|r| r.components.as_slice())
            .unwrap_or(&[])
    }

    /// First non-destroyed component on `entity` whose type chain includes
    /// `type_name`.
    #[must_use]
    pub fn find_component(&self, entity: Entity, type_name: &str) -> Option<ComponentId> {
        self.components_of(entity).iter().copied().find(|c| {
            self.components
                .get(c)
                .is_some_and(|r| !r.destroyed && r.ty.is_a(type_name))
        })
    }

    /// `None` if the component is unknown, of another type, or busy in one
    /// of its own callbacks.
    #[must_use]
    pub fn component<T: Component>(&self, component: ComponentId) -> Option<&T> {
        self.components
            .get(&component)?
            .behavior
            .as_deref()?
            .as_any()
            .downcast_ref()
    }

    /// Mutable counterpart of [`World::component`].
    pub fn component_mut<T: Component>(&mut self, component: ComponentId) -> Option<&mut T> {
        self.components
            .get_mut(&component)?
            .behavior
            .as_deref_mut()?
            .as_any_mut()
            .downcast_mut()
    }

    /// Entity that owns `component`.
    #[must_use]
    pub fn component_entity(&self, component: ComponentId) -> Option<Entity> {
        self.components.get(&component).map(|r| r.entity)
    }

    /// Type descriptor `component` was created from.
    #[must_use]
    pub fn component_type_of(&self, component: ComponentId) -> Option<&'static ComponentType> {
        self.components.get(&component).map(|r| r.ty)
    }

    /// Id of the system `component` was bound to at creation.
    #[must_use]
    pub fn component_system(&self, component: ComponentId) -> Option<&str> {
        self.components.get(&component)?.system.as_deref()
    }

    /// Local enabled flag of `component`.
    #[must_use]
    pub fn is_component_enabled(&self, component: ComponentId) -> bool {
        self.components.get(&component).is_some_and(|r| r.enabled)
    }

    /// Exists and has not been destroyed.
    #[must_use]
    pub fn is_component_alive(&self, component: ComponentId) -> bool {
        self.components.get(&component).is_some_and(|r| !r.destroyed)
    }

    pub(crate) fn is_destroyed_component(&self, component: ComponentId) -> bool {
        self.components.get(&component).is_none_or(|r| r.destroyed)
    }

    /// Components bound to `system_id` that are currently active, walking
    /// the live registry in order.
    #[must_use]
    pub fn active_components(&self, system_id: &str) -> Vec<ComponentId> {
        self.live
            .iter()
            .filter(|e| self.is_alive(**e) && self.enabled_in_hierarchy(**e))
            .flat_map(|e| self.components_of(*e).iter().copied())
            .filter(|c| {
                self.components.get(c).is_some_and(|r| {
                    r.enabled && !r.destroyed && r.system.as_deref() == Some(system_id)
                })
            })
            .collect()
    }

    /// Entities awaiting activation at the next flush.
    #[must_use]
    pub fn pending_entities(&self) -> &[Entity] {
        self.new_entities.as_slice()
    }

    /// Number of entity records, live or pending.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("frame", &self.frame)
            .field("active_level", &self.active_level)
            .field("entities", &self.entities.len())
            .field("live", &self.live.len())
            .field("components", &self.components.len())
            .field("systems", &self.system_ids())
            .finish_non_exhaustive()
    }
}
