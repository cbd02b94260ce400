//! Parent/child links between entities and levels.
//!
//! [`SceneTree`] only stores links. It knows nothing about enabled flags,
//! readiness or destruction; the world layers those on top. Destroyed
//! entities stay in the tree until their flush calls [`SceneTree::forget`],
//! so walks still reach them for teardown.

use std::collections::HashMap;
use std::fmt;

use engine_component::Entity;
use serde::{Deserialize, Serialize};

/// Handle to a level, the named root of an entity tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LevelId(pub u32);

impl fmt::Display for LevelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Level({})", self.0)
    }
}

/// Where an entity hangs in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Parent {
    Level(LevelId),
    Entity(Entity),
}

impl From<Entity> for Parent {
    fn from(e: Entity) -> Self {
        Self::Entity(e)
    }
}

impl From<LevelId> for Parent {
    fn from(l: LevelId) -> Self {
        Self::Level(l)
    }
}

#[derive(Debug, Default)]
pub struct SceneTree {
    parents: HashMap<Entity, Parent>,
    children: HashMap<Entity, Vec<Entity>>,
    level_children: HashMap<LevelId, Vec<Entity>>,
}

impl SceneTree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves `entity` under `parent`, appending it to the new parent's
    /// children. `None` detaches it.
    pub fn set_parent(&mut self, entity: Entity, parent: Option<Parent>) {
        if let Some(old) = self.parents.remove(&entity)
            && let Some(list) = self.list_mut(old)
        {
            list.retain(|c| *c != entity);
        }
        if let Some(new) = parent {
            self.parents.insert(entity, new);
            match new {
                Parent::Level(l) => self.level_children.entry(l).or_default().push(entity),
                Parent::Entity(p) => self.children.entry(p).or_default().push(entity),
            }
        }
    }

    pub fn detach(&mut self, entity: Entity) {
        self.set_parent(entity, None);
    }

    /// Parent of `entity`; `None` when detached.
    #[must_use]
    pub fn parent(&self, entity: Entity) -> Option<Parent> {
        self.parents.get(&entity).copied()
    }

    /// Direct children of `entity` in attach order.
    #[must_use]
    pub fn children(&self, entity: Entity) -> &[Entity] {
        self.children.get(&entity).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Top-level entities of `level` in attach order.
    #[must_use]
    pub fn level_children(&self, level: LevelId) -> &[Entity] {
        self.level_children.get(&level).map(Vec::as_slice).unwrap_or(&[])
    }

    fn children_of(&self, node: Parent) -> &[Entity] {
        match node {
            Parent::Level(l) => self.level_children(l),
            Parent::Entity(e) => self.children(e),
        }
    }

    fn list_mut(&mut self, node: Parent) -> Option<&mut Vec<Entity>> {
        match node {
            Parent::Level(l) => self.level_children.get_mut(&l),
            Parent::Entity(e) => self.children.get_mut(&e),
        }
    }

    /// Pre-order walk over every descendant of `root` (excluding `root`).
    pub fn walk(&self, root: Parent, mut visit: impl FnMut(Entity)) {
        self.walk_pruned(root, |e| {
            visit(e);
            true
        });
    }

    /// Pre-order walk where `visit` decides whether to descend into each
    /// node's children.
    pub fn walk_pruned(&self, root: Parent, mut visit: impl FnMut(Entity) -> bool) {
        let mut stack: Vec<Entity> = self.children_of(root).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            if visit(node) {
                stack.extend(self.children(node).iter().rev());
            }
        }
    }

    /// `root` itself followed by all its descendants, pre-order.
    #[must_use]
    pub fn subtree(&self, root: Entity) -> Vec<Entity> {
        let mut out = vec![root];
        self.walk(Parent::Entity(root), |e| out.push(e));
        out
    }

    /// The level at the top of `entity`'s chain, or `None` if the chain ends
    /// at a detached entity.
    #[must_use]
    pub fn root(&self, entity: Entity) -> Option<LevelId> {
        let mut current = entity;
        loop {
            match self.parents.get(&current)? {
                Parent::Level(l) => return Some(*l),
                Parent::Entity(p) => current = *p,
            }
        }
    }

    /// Entity ancestors of `entity`, nearest first.
    #[must_use]
    pub fn ancestors(&self, entity: Entity) -> Vec<Entity> {
        let mut out = Vec::new();
        let mut current = entity;
        while let Some(Parent::Entity(p)) = self.parents.get(&current) {
            out.push(*p);
            current = *p;
        }
        out
    }

    /// Returns `true` if `ancestor` appears on `entity`'s parent chain.
    #[must_use]
    pub fn is_ancestor(&self, ancestor: Entity, entity: Entity) -> bool {
        self.ancestors(entity).contains(&ancestor)
    }

    /// Drops every link that mentions `entity`. Children still pointing at
    /// it become detached.
    pub fn forget(&mut self, entity: Entity) {
        self.detach(entity);
        if let Some(orphans) = self.children.remove(&entity) {
            for child in orphans {
                self.parents.remove(&child);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const L: LevelId = LevelId(1);

    fn e(n: u64) -> Entity {
        Entity::from_raw(n)
    }

    /// L -> 1 -> (2 -> 4), 3
    fn sample() -> SceneTree {
        let mut tree = SceneTree::new();
        tree.set_parent(e(1), Some(Parent::Level(L)));
        tree.set_parent(e(2), Some(Parent::Entity(e(1))));
        tree.set_parent(e(3), Some(Parent::Entity(e(1))));
        tree.set_parent(e(4), Some(Parent::Entity(e(2))));
        tree
    }

    #[test]
    fn test_walk_is_pre_order() {
        let tree = sample();
        let mut seen = Vec::new();
        tree.walk(Parent::Level(L), |n| seen.push(n.id()));
        assert_eq!(seen, [1, 2, 4, 3]);
    }

    #[test]
    fn test_walk_pruned_skips_subtree() {
        let tree = sample();
        let mut seen = Vec::new();
        tree.walk_pruned(Parent::Level(L), |n| {
            seen.push(n.id());
            n != e(2)
        });
        assert_eq!(seen, [1, 2, 3]);
    }

    #[test]
    fn test_reparent_moves_between_lists() {
        let mut tree = sample();
        tree.set_parent(e(4), Some(Parent::Entity(e(3))));
        assert!(tree.children(e(2)).is_empty());
        assert_eq!(tree.children(e(3)), &[e(4)]);
        assert_eq!(tree.parent(e(4)), Some(Parent::Entity(e(3))));
    }

    #[test]
    fn test_root_and_ancestors() {
        let mut tree = sample();
        assert_eq!(tree.root(e(4)), Some(L));
        assert_eq!(tree.ancestors(e(4)), [e(2), e(1)]);
        assert!(tree.is_ancestor(e(1), e(4)));
        assert!(!tree.is_ancestor(e(3), e(4)));
        tree.detach(e(1));
        assert_eq!(tree.root(e(4)), None);
    }

    #[test]
    fn test_forget_detaches_from_both_sides() {
        let mut tree = sample();
        tree.forget(e(2));
        assert_eq!(tree.children(e(1)), &[e(3)]);
        assert_eq!(tree.parent(e(4)), None);
        assert_eq!(tree.subtree(e(1)), [e(1), e(3)]);
    }
}
