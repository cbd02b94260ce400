//! System registry: priority ordering and type-to-system resolution.
//!
//! Systems are kept sorted by ascending priority (stable for ties) after
//! every registration. A `ComponentTypeId -> index` map is rebuilt after
//! each sort, so resolving a component's system walks its type chain and
//! does one map lookup per link instead of testing every system.

use std::collections::HashMap;

use engine_component::ComponentTypeId;

use crate::component::ComponentType;
use crate::system::{System, SystemDescriptor};

struct SystemEntry {
    id: String,
    priority: i32,
    component: String,
    type_id: ComponentTypeId,
    /// `None` while the system's own hook is running.
    system: Option<Box<dyn System>>,
}

/// Registered systems in execution order.
#[derive(Default)]
pub struct SystemRegistry {
    entries: Vec<SystemEntry>,
    by_type: HashMap<ComponentTypeId, usize>,
}

impl SystemRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a system and re-sorts. Returns its index in execution order.
    pub fn register(&mut self, descriptor: SystemDescriptor) -> usize {
        let SystemDescriptor {
            id,
            priority,
            component,
            system,
        } = descriptor;
        let type_id = ComponentTypeId::from_name(&component);
        self.entries.push(SystemEntry {
            id: id.clone(),
            priority,
            component,
            type_id,
            system: Some(system),
        });
        // Stable: equal priorities keep registration order.
        self.entries.sort_by_key(|e| e.priority);
        self.by_type.clear();
        for (index, entry) in self.entries.iter().enumerate() {
            self.by_type.entry(entry.type_id).or_insert(index);
        }
        self.entries
            .iter()
            .rposition(|e| e.id == id)
            .unwrap_or_default()
    }

    /// Id of the highest-priority system bound to any type on `ty`'s chain.
    #[must_use]
    pub fn resolve(&self, ty: &'static ComponentType) -> Option<&str> {
        ty.chain()
            .filter_map(|t| self.by_type.get(&t.type_id()).copied())
            .min()
            .map(|index| self.entries[index].id.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index of the first system with this id.
    #[must_use]
    pub fn position(&self, id: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.id == id)
    }

    /// System ids in execution order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.id.as_str())
    }

    /// Priority of the system at `index`.
    #[must_use]
    pub fn priority(&self, index: usize) -> Option<i32> {
        self.entries.get(index).map(|e| e.priority)
    }

    #[must_use]
    pub fn component(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(|e| e.component.as_str())
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&dyn System> {
        self.entries.get(index)?.system.as_deref()
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut (dyn System + 'static)> {
        self.entries.get_mut(index)?.system.as_deref_mut()
    }

    /// Lends the system at `index` out, with its id.
    pub(crate) fn take(&mut self, index: usize) -> Option<(String, Box<dyn System>)> {
        let entry = self.entries.get_mut(index)?;
        let system = entry.system.take()?;
        Some((entry.id.clone(), system))
    }

    pub(crate) fn restore(&mut self, index: usize, system: Box<dyn System>) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.system = Some(system);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::component::Component;

    use super::*;

    struct Noop;
    impl System for Noop {}

    struct Dummy;
    impl Component for Dummy {
        fn component_type(&self) -> &'static ComponentType {
            &BUTTON
        }
    }
    fn new_dummy() -> Box<dyn Component> {
        Box::new(Dummy)
    }

    static WIDGET: ComponentType = ComponentType::new("Widget", new_dummy);
    static BUTTON: ComponentType = ComponentType::new("Button", new_dummy).extends(&WIDGET);
    static LABEL: ComponentType = ComponentType::new("Label", new_dummy);

    fn descriptor(id: &str, component: &str, priority: i32) -> SystemDescriptor {
        SystemDescriptor::new(id, component, Noop).with_priority(priority)
    }

    #[test]
    fn test_sorted_by_priority() {
        let mut registry = SystemRegistry::new();
        registry.register(descriptor("late", "Label", 2));
        registry.register(descriptor("early", "Widget", 1));
        assert_eq!(registry.ids().collect::<Vec<_>>(), ["early", "late"]);
        assert_eq!(registry.priority(0), Some(1));
    }

    #[test]
    fn test_equal_priority_keeps_registration_order() {
        let mut registry = SystemRegistry::new();
        registry.register(descriptor("a", "Label", 0));
        registry.register(descriptor("b", "Label", 0));
        registry.register(descriptor("c", "Label", -1));
        assert_eq!(registry.ids().collect::<Vec<_>>(), ["c", "a", "b"]);
    }

    #[test]
    fn test_resolve_walks_type_chain() {
        let mut registry = SystemRegistry::new();
        registry.register(descriptor("widgets", "Widget", 5));
        assert_eq!(registry.resolve(&BUTTON), Some("widgets"));
        assert_eq!(registry.resolve(&LABEL), None);
    }

    #[test]
    fn test_resolve_prefers_highest_priority_along_chain() {
        let mut registry = SystemRegistry::new();
        registry.register(descriptor("buttons", "Button", 5));
        registry.register(descriptor("widgets", "Widget", 1));
        assert_eq!(registry.resolve(&BUTTON), Some("widgets"));
        assert_eq!(registry.resolve(&WIDGET), Some("widgets"));
    }

    #[test]
    fn test_take_and_restore() {
        let mut registry = SystemRegistry::new();
        let index = registry.register(descriptor("s", "Label", 0));
        let (id, system) = registry.take(index).unwrap();
        assert_eq!(id, "s");
        assert!(registry.get(index).is_none());
        assert!(registry.take(index).is_none());
        registry.restore(index, system);
        assert!(registry.get(index).is_some());
    }
}
