//! Entity handles.
//!
//! The data behind an [`Entity`] (name, flags, owned components, links)
//! lives in the world that allocated it; the handle itself is just an id.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::handle::{Handle, IdAllocator};

/// Serializes as the bare id, which is also how level documents and
/// component data refer to entities when no index table is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Entity(pub u64);

impl Entity {
    pub const INVALID: Entity = Entity(0);

    /// Wraps a raw id without checking it.
    #[must_use]
    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw `u64` id.
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }

    /// `false` only for [`Entity::INVALID`].
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl Handle for Entity {
    fn from_raw_id(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({})", self.0)
    }
}

pub type EntityAllocator = IdAllocator<Entity>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_is_invalid() {
        assert!(!Entity::INVALID.is_valid());
        assert!(Entity::from_raw(7).is_valid());
    }

    #[test]
    fn test_allocator_never_reuses_ids() {
        let mut alloc = EntityAllocator::new();
        let ids: Vec<u64> = (0..3).map(|_| alloc.allocate().id()).collect();
        assert_eq!(ids, [1, 2, 3]);
        assert_eq!(alloc.count(), 3);
    }

    #[test]
    fn test_display_and_json() {
        let e = Entity::from_raw(12);
        assert_eq!(e.to_string(), "Entity(12)");
        assert_eq!(serde_json::to_string(&e).unwrap(), "12");
        assert_eq!(serde_json::from_str::<Entity>("12").unwrap(), e);
    }
}
