//! Demo content for the frame driver: a handful of component types and
//! the systems that drive them.

use engine_ecs::{
    CallbackResult, Component, ComponentType, Context, Entity, EntityEvent, EventBinding, System,
    SystemContext, SystemDescriptor, World, WorldConfig,
};
use engine_schema::{FieldType, FieldValue, Schema};
use glam::Vec3;
use tracing::{debug, info, warn};

/// The level the binary runs when no `--level` is given.
pub const DEMO_LEVEL: &str = include_str!("demo_level.json");

fn float(value: &FieldValue) -> f32 {
    value.as_f64().unwrap_or_default() as f32
}

// -- Transform --

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Transform {
    pub position: Vec3,
}

impl Component for Transform {
    fn component_type(&self) -> &'static ComponentType {
        &TRANSFORM
    }

    fn set_field(&mut self, name: &str, value: FieldValue) {
        match name {
            "x" => self.position.x = float(&value),
            "y" => self.position.y = float(&value),
            "z" => self.position.z = float(&value),
            _ => {}
        }
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        let v = match name {
            "x" => self.position.x,
            "y" => self.position.y,
            "z" => self.position.z,
            _ => return None,
        };
        Some(v.into())
    }

    fn clone_component(&self) -> Option<Box<dyn Component>> {
        Some(Box::new(*self))
    }
}

fn xyz_schema(prefix: &str) -> Schema {
    ["x", "y", "z"].iter().fold(Schema::new(), |schema, axis| {
        schema.field(&format!("{prefix}{axis}"), FieldType::Float, 0.0)
    })
}

fn new_transform() -> Box<dyn Component> {
    Box::new(Transform::default())
}

fn transform_schema() -> Schema {
    xyz_schema("")
}

pub static TRANSFORM: ComponentType =
    ComponentType::new("Transform", new_transform).with_schema(transform_schema);

// -- Mover --

/// Constant velocity, in units per second.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Mover {
    pub velocity: Vec3,
}

impl Component for Mover {
    fn component_type(&self) -> &'static ComponentType {
        &MOVER
    }

    fn set_field(&mut self, name: &str, value: FieldValue) {
        match name {
            "vx" => self.velocity.x = float(&value),
            "vy" => self.velocity.y = float(&value),
            "vz" => self.velocity.z = float(&value),
            _ => {}
        }
    }

    fn clone_component(&self) -> Option<Box<dyn Component>> {
        Some(Box::new(*self))
    }
}

fn new_mover() -> Box<dyn Component> {
    Box::new(Mover::default())
}

fn mover_schema() -> Schema {
    xyz_schema("v")
}

pub static MOVER: ComponentType = ComponentType::new("Mover", new_mover).with_schema(mover_schema);

// -- Lifetime --

/// Destroys its entity after `frames` ticks of being active.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lifetime {
    pub frames: i64,
}

impl Component for Lifetime {
    fn component_type(&self) -> &'static ComponentType {
        &LIFETIME
    }

    fn on_event(
        &mut self,
        handler: &str,
        event: &EntityEvent,
        _ctx: &mut Context<'_>,
    ) -> CallbackResult {
        if handler == "announce" {
            debug!(entity = %event.entity, frames = self.frames, "lifetime started");
        }
        Ok(())
    }

    fn set_field(&mut self, name: &str, value: FieldValue) {
        if name == "frames" {
            self.frames = value.as_i64().unwrap_or(self.frames);
        }
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        (name == "frames").then(|| self.frames.into())
    }
}

fn new_lifetime() -> Box<dyn Component> {
    Box::new(Lifetime { frames: 60 })
}

fn lifetime_schema() -> Schema {
    Schema::new().field("frames", FieldType::Int, 60)
}

pub static LIFETIME: ComponentType = ComponentType::new("Lifetime", new_lifetime)
    .with_events(&[EventBinding::new("ready", "announce")])
    .with_schema(lifetime_schema);

// -- Spawner --

/// Deep-clones `template` every `interval` ticks and enables the copy.
#[derive(Debug, Clone, Default)]
pub struct Spawner {
    pub template: Option<Entity>,
    pub interval: i64,
    countdown: i64,
}

impl Component for Spawner {
    fn component_type(&self) -> &'static ComponentType {
        &SPAWNER
    }

    fn on_init(&mut self, _ctx: &mut Context<'_>) -> CallbackResult {
        self.countdown = self.interval.max(1);
        Ok(())
    }

    fn set_field(&mut self, name: &str, value: FieldValue) {
        match name {
            "template" => self.template = value.as_entity(),
            "interval" => self.interval = value.as_i64().unwrap_or(self.interval),
            _ => {}
        }
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "template" => Some(self.template.into()),
            "interval" => Some(self.interval.into()),
            _ => None,
        }
    }
}

fn new_spawner() -> Box<dyn Component> {
    Box::new(Spawner::default())
}

fn spawner_schema() -> Schema {
    Schema::new()
        .field("template", FieldType::Entity, None::<Entity>)
        .field("interval", FieldType::Int, 30)
}

pub static SPAWNER: ComponentType =
    ComponentType::new("Spawner", new_spawner).with_schema(spawner_schema);

// -- Systems --

pub struct MovementSystem {
    /// Seconds per tick.
    step: f32,
    pub moved: usize,
}

impl MovementSystem {
    /// Creates a movement system advancing `step` seconds per tick.
    #[must_use]
    pub fn new(step: f32) -> Self {
        Self { step, moved: 0 }
    }
}

impl System for MovementSystem {
    fn tick(&mut self, ctx: &mut SystemContext<'_>) -> CallbackResult {
        self.moved = 0;
        for mover in ctx.components() {
            let Some(velocity) = ctx.component::<Mover>(mover).map(|m| m.velocity) else {
                continue;
            };
            let Some(transform) = ctx
                .component_entity(mover)
                .and_then(|e| ctx.find_component(e, "Transform"))
            else {
                continue;
            };
            if let Some(transform) = ctx.component_mut::<Transform>(transform) {
                transform.position += velocity * self.step;
                self.moved += 1;
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct LifetimeSystem {
    pub expired: u64,
}

impl System for LifetimeSystem {
    fn tick(&mut self, ctx: &mut SystemContext<'_>) -> CallbackResult {
        for component in ctx.components() {
            let Some(lifetime) = ctx.component_mut::<Lifetime>(component) else {
                continue;
            };
            lifetime.frames -= 1;
            if lifetime.frames > 0 {
                continue;
            }
            if let Some(entity) = ctx.component_entity(component) {
                ctx.destroy_entity(entity)?;
                self.expired += 1;
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct SpawnerSystem {
    pub spawned: u64,
}

impl System for SpawnerSystem {
    fn tick(&mut self, ctx: &mut SystemContext<'_>) -> CallbackResult {
        for component in ctx.components() {
            let Some(spawner) = ctx.component_mut::<Spawner>(component) else {
                continue;
            };
            spawner.countdown -= 1;
            if spawner.countdown > 0 {
                continue;
            }
            spawner.countdown = spawner.interval.max(1);
            let Some(template) = spawner.template else {
                continue;
            };
            if !ctx.is_alive(template) {
                warn!(template = %template, "spawner template is gone");
                continue;
            }
            let copy = ctx.deep_clone_entity(template)?;
            ctx.set_enabled(copy, true)?;
            self.spawned += 1;
            info!(template = %template, copy = %copy, "spawned");
        }
        Ok(())
    }
}

/// Every demo component type.
#[must_use]
pub fn types() -> Vec<&'static ComponentType> {
    vec![&TRANSFORM, &MOVER, &LIFETIME, &SPAWNER]
}

/// Systems in registration order. Spawning runs before movement, and
/// expiry runs last.
#[must_use]
pub fn systems(step: f32) -> Vec<SystemDescriptor> {
    vec![
        SystemDescriptor::new("spawners", "Spawner", SpawnerSystem::default()).with_priority(-10),
        SystemDescriptor::new("movement", "Mover", MovementSystem::new(step)),
        SystemDescriptor::new("lifetimes", "Lifetime", LifetimeSystem::default()).with_priority(10),
    ]
}

/// A world with the demo types and systems registered.
#[must_use]
pub fn build_world(config: WorldConfig, step: f32) -> World {
    World::with_systems(config, &types(), systems(step))
}

#[cfg(test)]
mod tests {
    use engine_ecs::LevelDocument;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_demo_level_is_valid() {
        let doc = LevelDocument::from_json(DEMO_LEVEL).unwrap();
        assert_eq!(doc.name, "demo");
        assert_eq!(doc.entities.len(), 4);
    }

    #[test]
    fn test_systems_run_in_priority_order() {
        let world = build_world(WorldConfig::default(), 1.0);
        assert_eq!(world.system_ids(), ["spawners", "movement", "lifetimes"]);
    }

    #[test]
    fn test_mover_moves_transform() {
        let mut world = build_world(WorldConfig::default(), 0.5);
        let e = world.create_entity("e", None).unwrap();
        let t = world.create_component(e, "Transform", &json!({ "x": 1.0 })).unwrap();
        world.create_component(e, "Mover", &json!({ "vx": 2.0, "vy": 4 })).unwrap();

        let position = |world: &World| world.component::<Transform>(t).map(|t| t.position);
        world.tick().unwrap();
        assert_eq!(position(&world), Some(Vec3::new(1.0, 0.0, 0.0)));
        world.tick().unwrap();
        assert_eq!(position(&world), Some(Vec3::new(2.0, 2.0, 0.0)));
        assert_eq!(world.system_as::<MovementSystem>("movement").map(|s| s.moved), Some(1));
    }

    #[test]
    fn test_lifetime_destroys_entity() {
        let mut world = build_world(WorldConfig::default(), 1.0);
        let e = world.create_entity("e", None).unwrap();
        world.create_component(e, "Lifetime", &json!({ "frames": 2 })).unwrap();

        world.tick().unwrap();
        world.tick().unwrap();
        assert!(world.is_alive(e));
        let stats = world.tick().unwrap();
        assert!(!world.is_alive(e));
        assert_eq!(stats.entities_destroyed, 1);
        assert_eq!(world.system_as::<LifetimeSystem>("lifetimes").map(|s| s.expired), Some(1));
    }

    #[test]
    fn test_spawner_clones_disabled_template() {
        let mut world = build_world(WorldConfig::default(), 1.0 / 60.0);
        let doc = LevelDocument::from_json(DEMO_LEVEL).unwrap();
        let level = world.build_level(&doc).unwrap();
        world.load_level(level).unwrap();

        for _ in 0..22 {
            world.tick().unwrap();
        }
        assert_eq!(world.system_as::<SpawnerSystem>("spawners").map(|s| s.spawned), Some(1));
        let bullets: Vec<_> = world
            .live_entities()
            .iter()
            .copied()
            .filter(|e| world.entity_name(*e) == Some("bullet"))
            .collect();
        assert_eq!(bullets.len(), 2);
        assert_eq!(bullets.iter().filter(|e| world.enabled_in_hierarchy(**e)).count(), 1);
    }
}
