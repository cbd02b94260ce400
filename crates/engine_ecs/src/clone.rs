//! Entity cloning.
//!
//! A clone hangs under the source's parent and starts out pending, exactly
//! like a freshly created entity: no `init`, `enable` or lifecycle events
//! fire until its flush. Only `on_clone` runs immediately, on each copied
//! component.

use std::collections::HashMap;

use engine_component::{ComponentId, Entity};
use tracing::debug;

use crate::component::Component;
use crate::error::WorldError;
use crate::hierarchy::Parent;
use crate::world::{NEW_COMPONENTS, NEW_ENTITIES, World, ensure_room};

impl World {
    /// Copies `source` and its live components. Children are not copied.
    ///
    /// # Errors
    ///
    /// Unknown or destroyed source, or full queues under
    /// [`OverflowPolicy::Reject`](engine_component::OverflowPolicy::Reject).
    pub fn clone_entity(&mut self, source: Entity) -> Result<Entity, WorldError> {
        self.clone_tree(source, false)
    }

    /// Copies `source`, its live descendants and all their live components,
    /// keeping the shape of the subtree.
    ///
    /// # Errors
    ///
    /// As [`World::clone_entity`].
    pub fn deep_clone_entity(&mut self, source: Entity) -> Result<Entity, WorldError> {
        self.clone_tree(source, true)
    }

    fn clone_tree(&mut self, source: Entity, deep: bool) -> Result<Entity, WorldError> {
        if self.entity_record(source)?.destroyed {
            return Err(WorldError::EntityDestroyed(source));
        }
        let nodes: Vec<Entity> = if deep {
            self.tree
                .subtree(source)
                .into_iter()
                .filter(|e| self.is_alive(*e))
                .collect()
        } else {
            vec![source]
        };
        let copies: Vec<(Entity, Vec<ComponentId>)> = nodes
            .iter()
            .map(|e| {
                let live = self
                    .components_of(*e)
                    .iter()
                    .copied()
                    .filter(|c| !self.is_destroyed_component(*c))
                    .collect();
                (*e, live)
            })
            .collect();

        let parent = self.tree.parent(source);
        let activate = match parent {
            Some(Parent::Level(level)) => level == self.active_level,
            Some(Parent::Entity(p)) => self.tree.root(p) == Some(self.active_level),
            None => false,
        };
        if activate {
            ensure_room(&self.new_entities, NEW_ENTITIES, nodes.len())?;
        }
        let total = copies.iter().map(|(_, c)| c.len()).sum();
        ensure_room(&self.new_components, NEW_COMPONENTS, total)?;

        let mut mapped: HashMap<Entity, Entity> = HashMap::new();
        for &node in &nodes {
            let clone_parent = if node == source {
                parent
            } else {
                match self.tree.parent(node) {
                    Some(Parent::Entity(p)) => mapped.get(&p).copied().map(Parent::Entity),
                    other => other,
                }
            };
            let (name, enabled) = self
                .entities
                .get(&node)
                .map(|r| (r.name.clone(), r.enabled))
                .unwrap_or_default();
            let clone = self.spawn(name, enabled, clone_parent);
            mapped.insert(node, clone);
        }

        for (node, components) in copies {
            let Some(&clone) = mapped.get(&node) else {
                continue;
            };
            for component in components {
                self.clone_component_into(component, clone);
            }
        }

        if activate {
            for node in &nodes {
                if let Some(&clone) = mapped.get(node) {
                    self.enqueue_new(clone);
                }
            }
        }

        let root = mapped
            .get(&source)
            .copied()
            .ok_or(WorldError::EntityNotFound(source))?;
        debug!(source = %source, clone = %root, entities = nodes.len(), deep, "cloned entity");
        Ok(root)
    }

    /// Attaches a copy of `source` to `target` and runs its `on_clone`.
    fn clone_component_into(&mut self, source: ComponentId, target: Entity) -> Option<ComponentId> {
        let record = self.components.get(&source)?;
        let ty = record.ty;
        let enabled = record.enabled;
        let behavior: Box<dyn Component> = match record.behavior.as_deref() {
            Some(behavior) => behavior.clone_component().unwrap_or_else(|| {
                let mut fresh = (ty.construct)();
                for def in ty.full_schema().fields() {
                    if let Some(value) = behavior.field(&def.name) {
                        fresh.set_field(&def.name, value);
                    }
                }
                fresh
            }),
            // Cloned from inside one of its own callbacks; defaults only.
            None => (ty.construct)(),
        };

        let component = self.attach_component(target, ty, behavior, enabled);
        self.with_component(component, "on_clone", |c, ctx| c.on_clone(source, ctx));
        Some(component)
    }
}

#[cfg(test)]
mod tests {
    use engine_component::OverflowPolicy;
    use serde_json::json;

    use crate::config::WorldConfig;
    use crate::test_support::{Recorder, take_log, world, world_with};

    use super::*;

    #[test]
    fn test_clone_copies_live_components_only() {
        let mut world = world();
        let source = world.create_entity("source", None).unwrap();
        let kept = world
            .create_component(source, "Recorder", &json!({ "tag": "kept", "hits": 4 }))
            .unwrap();
        let off = world.create_component(source, "Recorder", &json!({ "tag": "off" })).unwrap();
        world.set_component_enabled(off, false).unwrap();
        let dropped = world
            .create_component(source, "Recorder", &json!({ "tag": "dropped" }))
            .unwrap();
        world.tick().unwrap();
        world.destroy_component(dropped).unwrap();
        take_log();

        let clone = world.clone_entity(source).unwrap();
        assert_eq!(take_log(), ["clone:kept", "clone:off"]);
        assert_eq!(world.entity_name(clone), Some("source"));
        assert_eq!(world.parent(clone), world.parent(source));
        assert!(!world.is_ready(clone));

        let copies = world.components_of(clone).to_vec();
        assert_eq!(copies.len(), 2);
        assert_ne!(copies[0], kept);
        assert_eq!(world.component::<Recorder>(copies[0]).map(|r| r.hits), Some(4));
        assert!(!world.is_component_enabled(copies[1]));

        world.tick().unwrap();
        let log = take_log();
        assert!(world.is_ready(clone));
        assert!(log.contains(&"init:kept".to_owned()));
        assert!(log.contains(&"init:off".to_owned()));
        assert!(!log.contains(&"enable:off".to_owned()));
    }

    #[test]
    fn test_shallow_clone_skips_children() {
        let mut world = world();
        let source = world.create_entity("source", None).unwrap();
        world.create_entity("child", Some(source.into())).unwrap();
        let clone = world.clone_entity(source).unwrap();
        assert!(world.children(clone).is_empty());
    }

    #[test]
    fn test_deep_clone_keeps_shape_and_flags() {
        let mut world = world();
        let root = world.create_entity("root", None).unwrap();
        let arm = world.create_entity("arm", Some(root.into())).unwrap();
        let hand = world.create_entity("hand", Some(arm.into())).unwrap();
        let gone = world.create_entity("gone", Some(root.into())).unwrap();
        world.set_enabled(arm, false).unwrap();
        world.create_component(hand, "Recorder", &json!({ "tag": "hand" })).unwrap();
        world.tick().unwrap();
        world.destroy_entity(gone).unwrap();

        let copy = world.deep_clone_entity(root).unwrap();
        let arms = world.children(copy).to_vec();
        assert_eq!(arms.len(), 1);
        assert_eq!(world.entity_name(arms[0]), Some("arm"));
        assert!(!world.is_enabled(arms[0]));
        let hands = world.children(arms[0]).to_vec();
        assert_eq!(world.entity_name(hands[0]), Some("hand"));
        assert!(world.find_component(hands[0], "Recorder").is_some());
        assert_eq!(world.pending_entities(), &[copy, arms[0], hands[0]]);

        world.tick().unwrap();
        assert!(world.is_ready(hands[0]));
        assert!(!world.enabled_in_hierarchy(hands[0]));
        assert!(world.is_alive(hand));
    }

    #[test]
    fn test_clone_of_detached_entity_stays_pending() {
        let mut world = world();
        let loose = world.create_entity("loose", None).unwrap();
        world.set_parent(loose, None).unwrap();
        let clone = world.clone_entity(loose).unwrap();
        assert!(world.parent(clone).is_none());
        assert!(!world.pending_entities().contains(&clone));
    }

    #[test]
    fn test_clone_of_destroyed_entity_fails() {
        let mut world = world();
        let e = world.create_entity("e", None).unwrap();
        world.destroy_entity(e).unwrap();
        let err = world.clone_entity(e).unwrap_err();
        assert!(matches!(err, WorldError::EntityDestroyed(x) if x == e));
    }

    #[test]
    fn test_deep_clone_checks_room_first() {
        let config = WorldConfig::default()
            .with_pool_size(2)
            .with_overflow(OverflowPolicy::Reject);
        let mut world = world_with(config);
        let root = world.create_entity("root", None).unwrap();
        world.create_entity("a", Some(root.into())).unwrap();
        world.tick().unwrap();
        let before = world.entity_count();
        world.create_entity("b", Some(root.into())).unwrap();

        let err = world.deep_clone_entity(root).unwrap_err();
        assert!(matches!(err, WorldError::PoolFull { pool: "new entities", .. }));
        assert_eq!(world.entity_count(), before + 1);
    }
}
