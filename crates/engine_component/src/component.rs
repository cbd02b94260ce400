//! Component identity: per-instance handles and per-type tags.
//!
//! [`ComponentTypeId`] is derived from the component type's **string name**
//! using FNV-1a 64-bit, so the same name always yields the same tag. The
//! scheduler resolves a component's system by looking this tag up in a map
//! built once at system registration, instead of scanning systems and
//! testing the component's runtime type.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::handle::{Handle, IdAllocator};

/// A deterministic tag for a component type, derived from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct ComponentTypeId(pub u64);

impl ComponentTypeId {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0100_0000_01b3;

    /// FNV-1a over the UTF-8 bytes of `name`. Usable in `const` context, so
    /// `ComponentType` statics carry their tag without a lazy init.
    #[must_use]
    pub const fn from_name(name: &str) -> Self {
        let bytes = name.as_bytes();
        let mut acc = Self::OFFSET;
        let mut at = 0;
        while at < bytes.len() {
            acc = (acc ^ bytes[at] as u64).wrapping_mul(Self::PRIME);
            at += 1;
        }
        Self(acc)
    }
}

/// A handle to one component instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentId(pub u64);

impl ComponentId {
    /// Returns the raw `u64` id.
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }
}

impl Handle for ComponentId {
    fn from_raw_id(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Component({})", self.0)
    }
}

pub type ComponentAllocator = IdAllocator<ComponentId>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_id_from_name_is_deterministic() {
        let id = ComponentTypeId::from_name("Button");
        assert_eq!(id, ComponentTypeId::from_name("Button"));
        assert_ne!(id, ComponentTypeId::from_name("Toggle"));
    }

    #[test]
    fn test_fnv1a_known_vector() {
        // FNV-1a 64-bit of the empty string is the offset basis itself.
        assert_eq!(
            ComponentTypeId::from_name(""),
            ComponentTypeId(0xcbf2_9ce4_8422_2325)
        );
        // "a" -> 0xaf63dc4c8601ec8c
        assert_eq!(
            ComponentTypeId::from_name("a"),
            ComponentTypeId(0xaf63_dc4c_8601_ec8c)
        );
    }

    #[test]
    fn test_component_allocator_starts_at_one() {
        let mut alloc = ComponentAllocator::new();
        assert_eq!(alloc.allocate(), ComponentId(1));
        assert_eq!(alloc.allocate(), ComponentId(2));
    }
}
