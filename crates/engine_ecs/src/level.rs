//! Levels: named roots of entity trees, and the JSON documents they are
//! built from.
//!
//! Exactly one level is active. Only entities whose chain ends at the
//! active level are ever activated; loading another level destroys the old
//! level's entities and queues the new level's.
//!
//! A level document lists entities flat and links them by index:
//!
//! ```json
//! {
//!   "name": "arena",
//!   "children": [0],
//!   "entities": [
//!     { "name": "player", "children": [1],
//!       "components": [{ "type": "Mover", "properties": { "speed": 2.0 } }] },
//!     { "name": "camera", "enabled": false,
//!       "components": [{ "type": "Follow", "properties": { "target": "e0" } }] }
//!   ]
//! }
//! ```
//!
//! Entity references inside component properties (`"e0"`, or a bare index)
//! resolve against the entities built from the same document.

use engine_component::Entity;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::WorldError;
use crate::hierarchy::{LevelId, Parent};
use crate::world::{
    DEAD_COMPONENTS, DEAD_ENTITIES, NEW_COMPONENTS, NEW_ENTITIES, World, ensure_room,
};

fn enabled_by_default() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LevelDocument {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub entities: Vec<EntityDocument>,
    /// Indices of the entities hanging directly under the level.
    #[serde(default)]
    pub children: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EntityDocument {
    pub name: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub children: Vec<usize>,
    #[serde(default)]
    pub components: Vec<ComponentDocument>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ComponentDocument {
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub properties: Value,
}

impl LevelDocument {
    /// # Errors
    ///
    /// Malformed JSON, or a document that fails [`LevelDocument::validate`].
    pub fn from_json(text: &str) -> Result<Self, WorldError> {
        let doc: Self = serde_json::from_str(text)?;
        doc.validate()?;
        Ok(doc)
    }

    /// # Errors
    ///
    /// As [`LevelDocument::from_json`].
    pub fn from_value(value: Value) -> Result<Self, WorldError> {
        let doc: Self = serde_json::from_value(value)?;
        doc.validate()?;
        Ok(doc)
    }

    /// Checks that the index links form a forest under the level: every
    /// index in range, every entity listed exactly once as a child.
    ///
    /// # Errors
    ///
    /// [`WorldError::InvalidLevel`] describing the first problem found.
    pub fn validate(&self) -> Result<(), WorldError> {
        let len = self.entities.len();
        let mut has_parent = vec![false; len];
        let links = self.children.iter().map(|c| (None, *c)).chain(
            self.entities
                .iter()
                .enumerate()
                .flat_map(|(i, e)| e.children.iter().map(move |c| (Some(i), *c))),
        );
        for (parent, child) in links {
            if child >= len {
                return Err(WorldError::InvalidLevel(format!(
                    "child index {child} out of range ({len} entities)"
                )));
            }
            if parent == Some(child) {
                return Err(WorldError::InvalidLevel(format!("entity {child} is its own child")));
            }
            if std::mem::replace(&mut has_parent[child], true) {
                return Err(WorldError::InvalidLevel(format!("entity {child} has two parents")));
            }
        }

        // With single parents, anything unreachable from the level sits on
        // a cycle or has no parent at all.
        let mut reached = 0;
        let mut stack = self.children.clone();
        while let Some(i) = stack.pop() {
            reached += 1;
            stack.extend(&self.entities[i].children);
        }
        if reached != len {
            return Err(WorldError::InvalidLevel(format!(
                "{} entities are not reachable from the level",
                len - reached
            )));
        }
        Ok(())
    }
}

impl World {
    /// Registers an empty, inactive level.
    pub fn create_level(&mut self, name: impl Into<String>) -> LevelId {
        let level = LevelId(self.next_level);
        self.next_level += 1;
        self.levels.insert(level, name.into());
        level
    }

    /// The level whose entities are live.
    #[must_use]
    pub fn active_level(&self) -> LevelId {
        self.active_level
    }

    /// Name given to `level` at creation.
    #[must_use]
    pub fn level_name(&self, level: LevelId) -> Option<&str> {
        self.levels.get(&level).map(String::as_str)
    }

    /// Replaces the active level.
    ///
    /// Every entity of the old level is destroyed as by
    /// [`World::destroy_entity`], then every not-yet-live entity of the new
    /// level is queued for activation. Loading the active level again does
    /// nothing.
    ///
    /// # Errors
    ///
    /// Unknown level, or queues too short for the swap under
    /// [`OverflowPolicy::Reject`](engine_component::OverflowPolicy::Reject).
    /// Nothing changes on error.
    pub fn load_level(&mut self, level: LevelId) -> Result<(), WorldError> {
        if !self.levels.contains_key(&level) {
            return Err(WorldError::LevelNotFound(level));
        }
        if level == self.active_level {
            warn!(level = %level, "level is already active");
            return Ok(());
        }

        let mut entities = Vec::new();
        let mut components = Vec::new();
        for &root in self.tree.level_children(self.active_level) {
            let (e, c) = self.doomed(root);
            entities.extend(e);
            components.extend(c);
        }
        let mut pending = Vec::new();
        self.tree.walk(Parent::Level(level), |e| {
            if self
                .entities
                .get(&e)
                .is_some_and(|r| !r.ready && !r.queued && !r.destroyed)
            {
                pending.push(e);
            }
        });
        ensure_room(&self.dead_entities, DEAD_ENTITIES, entities.len())?;
        ensure_room(&self.dead_components, DEAD_COMPONENTS, components.len())?;
        ensure_room(&self.new_entities, NEW_ENTITIES, pending.len())?;

        let previous = self.active_level;
        let destroyed = entities.len();
        self.destroy_doomed(entities, components);
        self.active_level = level;
        let queued = pending.len();
        for e in pending {
            self.enqueue_new(e);
        }
        info!(
            from = %previous,
            to = %level,
            destroyed,
            queued,
            "loaded level"
        );
        Ok(())
    }

    /// Builds a document into a new, inactive level. Load it with
    /// [`World::load_level`].
    ///
    /// Entities are created first, then components, so component
    /// properties can reference any entity of the document. Components of
    /// unknown types are skipped with a warning.
    ///
    /// # Errors
    ///
    /// An invalid document, or too little room for its components under
    /// [`OverflowPolicy::Reject`](engine_component::OverflowPolicy::Reject).
    pub fn build_level(&mut self, doc: &LevelDocument) -> Result<LevelId, WorldError> {
        doc.validate()?;
        let total: usize = doc.entities.iter().map(|e| e.components.len()).sum();
        ensure_room(&self.new_components, NEW_COMPONENTS, total)?;

        let level = self.create_level(doc.name.clone());
        let built: Vec<Entity> = doc
            .entities
            .iter()
            .map(|e| self.spawn(e.name.clone(), e.enabled, None))
            .collect();
        for &child in &doc.children {
            self.tree.set_parent(built[child], Some(Parent::Level(level)));
        }
        for (i, entity_doc) in doc.entities.iter().enumerate() {
            for &child in &entity_doc.children {
                self.tree.set_parent(built[child], Some(Parent::Entity(built[i])));
            }
        }

        for (entity, entity_doc) in built.iter().zip(&doc.entities) {
            for component_doc in &entity_doc.components {
                let created = self.create_component_with_refs(
                    *entity,
                    &component_doc.ty,
                    &component_doc.properties,
                    &built,
                );
                match created {
                    Ok(component) if !component_doc.enabled => {
                        self.set_component_enabled(component, false)?;
                    }
                    Ok(_) => {}
                    Err(err) => warn!(
                        level = %level,
                        entity = %entity,
                        error = %err,
                        "skipping component in level document"
                    ),
                }
            }
        }
        info!(
            level = %level,
            name = %doc.name,
            entities = built.len(),
            "built level"
        );
        Ok(level)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::config::WorldConfig;
    use crate::test_support::{Recorder, take_log, world, world_with};

    use super::*;

    fn arena() -> LevelDocument {
        LevelDocument::from_value(json!({
            "name": "arena",
            "children": [0, 2],
            "entities": [
                { "name": "player", "children": [1],
                  "components": [{ "type": "Recorder", "properties": { "tag": "player" } }] },
                { "name": "hat", "enabled": false,
                  "components": [{ "type": "Recorder", "properties": { "tag": "hat" } }] },
                { "name": "crate",
                  "components": [
                      { "type": "Missing" },
                      { "type": "LoudRecorder", "enabled": false, "properties": { "tag": "crate" } }
                  ] }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_validate_rejects_bad_links() {
        let out_of_range = json!({ "children": [1], "entities": [{ "name": "a" }] });
        let two_parents = json!({
            "children": [0, 1],
            "entities": [{ "name": "a", "children": [1] }, { "name": "b" }]
        });
        let cycle = json!({
            "children": [],
            "entities": [{ "name": "a", "children": [1] }, { "name": "b", "children": [0] }]
        });
        let orphan = json!({ "children": [0], "entities": [{ "name": "a" }, { "name": "b" }] });
        for doc in [out_of_range, two_parents, cycle, orphan] {
            let err = LevelDocument::from_value(doc).unwrap_err();
            assert!(matches!(err, WorldError::InvalidLevel(_)), "{err}");
        }
    }

    #[test]
    fn test_from_json_reports_malformed_input() {
        let err = LevelDocument::from_json("{ \"entities\": 3 }").unwrap_err();
        assert!(matches!(err, WorldError::LevelJson(_)));
    }

    #[test]
    fn test_build_creates_inactive_level() {
        let mut world = world();
        let level = world.build_level(&arena()).unwrap();
        assert_ne!(level, world.active_level());
        assert_eq!(world.level_name(level), Some("arena"));

        let roots = world.hierarchy().level_children(level).to_vec();
        assert_eq!(roots.len(), 2);
        assert_eq!(world.entity_name(roots[0]), Some("player"));
        let hat = world.children(roots[0])[0];
        assert!(!world.is_enabled(hat));

        world.tick().unwrap();
        assert!(world.live_entities().is_empty());
        assert!(world.pending_entities().is_empty());
        assert!(!take_log().iter().any(|l| l.starts_with("init")));
    }

    #[test]
    fn test_load_level_swaps_entities() {
        let mut world = world();
        let old = world.create_entity("old", None).unwrap();
        world.create_component(old, "Recorder", &json!({ "tag": "old" })).unwrap();
        world.tick().unwrap();
        let level = world.build_level(&arena()).unwrap();
        take_log();

        world.load_level(level).unwrap();
        assert_eq!(world.active_level(), level);
        assert_eq!(take_log(), ["disable:old"]);
        assert_eq!(world.pending_entities().len(), 3);

        world.tick().unwrap();
        let log = take_log();
        assert!(log.contains(&"destroy:old".to_owned()));
        assert!(log.contains(&"enable:player".to_owned()));
        assert!(log.contains(&"init:hat".to_owned()));
        assert!(!log.contains(&"enable:hat".to_owned()));
        assert!(log.contains(&"init:crate".to_owned()));
        assert!(!log.contains(&"enable:crate".to_owned()));
        assert!(!world.is_alive(old));
        assert_eq!(world.live_entities().len(), 3);
    }

    #[test]
    fn test_load_active_level_is_a_no_op() {
        let mut world = world();
        let e = world.create_entity("e", None).unwrap();
        world.load_level(world.active_level()).unwrap();
        assert!(world.is_alive(e));
        let err = world.load_level(LevelId(99)).unwrap_err();
        assert!(matches!(err, WorldError::LevelNotFound(LevelId(99))));
    }

    #[test]
    fn test_entity_references_resolve_within_document() {
        let mut world = world();
        let doc = LevelDocument::from_value(json!({
            "children": [0, 1],
            "entities": [
                { "name": "target" },
                { "name": "pointer",
                  "components": [{
                      "type": "Recorder",
                      "properties": { "target": "e0", "tag": 1 }
                  }] }
            ]
        }))
        .unwrap();
        let level = world.build_level(&doc).unwrap();
        let roots = world.hierarchy().level_children(level).to_vec();
        let c = world.find_component(roots[1], "Recorder").unwrap();
        let recorder = world.component::<Recorder>(c).unwrap();
        assert_eq!(recorder.target, Some(roots[0]));
        // Mistyped values keep the default.
        assert_eq!(recorder.tag, "");
    }

    #[test]
    fn test_load_level_checks_room_first() {
        let config = WorldConfig::default()
            .with_pool_size(1)
            .with_overflow(engine_component::OverflowPolicy::Reject);
        let mut world = world_with(config);
        let doc = LevelDocument::from_value(json!({
            "children": [0, 1],
            "entities": [{ "name": "a" }, { "name": "b" }]
        }))
        .unwrap();
        let level = world.build_level(&doc).unwrap();
        let err = world.load_level(level).unwrap_err();
        assert!(matches!(err, WorldError::PoolFull { pool: "new entities", .. }));
        assert_ne!(world.active_level(), level);
    }
}
