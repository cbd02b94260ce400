//! The component behaviour contract and static type descriptors.
//!
//! A component type is described once by a `static` [`ComponentType`]: its
//! name, an optional base type, the entity events it listens to and its
//! schema. The base link forms the type chain used for event binding,
//! schema inheritance and system lookup:
//!
//! ```rust,ignore
//! static WIDGET: ComponentType = ComponentType::new("Widget", new_widget)
//!     .with_events(&[EventBinding::new("ready", "layout")]);
//! static BUTTON: ComponentType = ComponentType::new("Button", new_button)
//!     .extends(&WIDGET)
//!     .with_schema(button_schema);
//! ```

use std::any::Any;
use std::ops::{Deref, DerefMut};

use engine_component::{ComponentId, ComponentTypeId, Entity};
use engine_schema::{FieldValue, Schema};

use crate::error::CallbackResult;
use crate::event::EntityEvent;
use crate::world::World;

/// Upcast to [`Any`] for downcasting trait objects to their concrete type.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Behaviour attached to one entity.
///
/// Every callback is optional. Callbacks run synchronously with full access
/// to the world through [`Context`]; structural changes made from inside
/// them are deferred to the next flush. While a callback runs, the component
/// is lent out of the world, so looking itself up through the context
/// returns `None`.
pub trait Component: AsAny {
    fn component_type(&self) -> &'static ComponentType;

    /// Called once, when the owning entity becomes ready (or immediately if
    /// it already is).
    fn on_init(&mut self, _ctx: &mut Context<'_>) -> CallbackResult {
        Ok(())
    }

    fn on_enable(&mut self, _ctx: &mut Context<'_>) -> CallbackResult {
        Ok(())
    }

    fn on_disable(&mut self, _ctx: &mut Context<'_>) -> CallbackResult {
        Ok(())
    }

    /// Called once, during the flush that finalizes this component.
    fn on_destroy(&mut self, _ctx: &mut Context<'_>) -> CallbackResult {
        Ok(())
    }

    /// Called on a freshly cloned component; `source` is still alive.
    fn on_clone(&mut self, _source: ComponentId, _ctx: &mut Context<'_>) -> CallbackResult {
        Ok(())
    }

    /// Dispatch for an [`EventBinding`] declared along this type's chain.
    fn on_event(
        &mut self,
        _handler: &str,
        _event: &EntityEvent,
        _ctx: &mut Context<'_>,
    ) -> CallbackResult {
        Ok(())
    }

    /// Assigns a schema field. Values arrive already checked against the
    /// field's declared type.
    fn set_field(&mut self, _name: &str, _value: FieldValue) {}

    /// Reads a schema field back, for cloning.
    fn field(&self, _name: &str) -> Option<FieldValue> {
        None
    }

    /// A full copy of this component's state, if the type supports it.
    fn clone_component(&self) -> Option<Box<dyn Component>> {
        None
    }
}

/// One `event -> handler` entry of a type's event table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventBinding {
    pub event: &'static str,
    pub handler: &'static str,
}

impl EventBinding {
    #[must_use]
    pub const fn new(event: &'static str, handler: &'static str) -> Self {
        Self { event, handler }
    }
}

/// Static descriptor of a component type.
pub struct ComponentType {
    pub name: &'static str,
    pub base: Option<&'static ComponentType>,
    pub events: &'static [EventBinding],
    /// Fields declared at this level of the chain only.
    pub schema: fn() -> Schema,
    pub construct: fn() -> Box<dyn Component>,
}

impl ComponentType {
    #[must_use]
    pub const fn new(name: &'static str, construct: fn() -> Box<dyn Component>) -> Self {
        Self {
            name,
            base: None,
            events: &[],
            schema: Schema::new,
            construct,
        }
    }

    #[must_use]
    pub const fn extends(mut self, base: &'static ComponentType) -> Self {
        self.base = Some(base);
        self
    }

    #[must_use]
    pub const fn with_events(mut self, events: &'static [EventBinding]) -> Self {
        self.events = events;
        self
    }

    #[must_use]
    pub const fn with_schema(mut self, schema: fn() -> Schema) -> Self {
        self.schema = schema;
        self
    }

    #[must_use]
    pub const fn type_id(&self) -> ComponentTypeId {
        ComponentTypeId::from_name(self.name)
    }

    /// This type followed by its bases, most-derived first.
    pub fn chain(&'static self) -> impl Iterator<Item = &'static ComponentType> {
        std::iter::successors(Some(self), |t| t.base)
    }

    /// Returns `true` if `name` is this type or one of its bases.
    #[must_use]
    pub fn is_a(&'static self, name: &str) -> bool {
        self.chain().any(|t| t.name == name)
    }

    /// The schema of the whole chain, base fields first.
    #[must_use]
    pub fn full_schema(&self) -> Schema {
        let own = (self.schema)();
        match self.base {
            Some(base) => base.full_schema().extend(own),
            None => own,
        }
    }
}

impl std::fmt::Debug for ComponentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentType")
            .field("name", &self.name)
            .field("base", &self.base.map(|b| b.name))
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

/// Access to the world from inside a component callback.
///
/// Dereferences to [`World`].
pub struct Context<'w> {
    world: &'w mut World,
    component: ComponentId,
    entity: Entity,
}

impl<'w> Context<'w> {
    pub(crate) fn new(world: &'w mut World, component: ComponentId, entity: Entity) -> Self {
        Self {
            world,
            component,
            entity,
        }
    }

    /// The component whose callback is running.
    #[must_use]
    pub fn component_id(&self) -> ComponentId {
        self.component
    }

    /// The entity owning that component.
    #[must_use]
    pub fn entity(&self) -> Entity {
        self.entity
    }

    /// Id of the system bound to the running component, if any.
    #[must_use]
    pub fn system_id(&self) -> Option<&str> {
        self.world.component_system(self.component)
    }
}

impl Deref for Context<'_> {
    type Target = World;

    fn deref(&self) -> &World {
        self.world
    }
}

impl DerefMut for Context<'_> {
    fn deref_mut(&mut self) -> &mut World {
        self.world
    }
}

#[cfg(test)]
mod tests {
    use engine_schema::FieldType;

    use super::*;

    struct Plain;

    impl Component for Plain {
        fn component_type(&self) -> &'static ComponentType {
            &DERIVED
        }
    }

    fn new_plain() -> Box<dyn Component> {
        Box::new(Plain)
    }

    fn base_schema() -> Schema {
        Schema::new()
            .field("a", FieldType::Int, 1)
            .field("b", FieldType::Int, 2)
    }

    fn derived_schema() -> Schema {
        Schema::new().field("b", FieldType::Int, 3)
    }

    static BASE: ComponentType = ComponentType::new("Base", new_plain)
        .with_events(&[EventBinding::new("ready", "base_ready")])
        .with_schema(base_schema);

    static DERIVED: ComponentType = ComponentType::new("Derived", new_plain)
        .extends(&BASE)
        .with_events(&[EventBinding::new("ready", "derived_ready")])
        .with_schema(derived_schema);

    #[test]
    fn test_chain_is_most_derived_first() {
        let names: Vec<_> = DERIVED.chain().map(|t| t.name).collect();
        assert_eq!(names, ["Derived", "Base"]);
        assert!(DERIVED.is_a("Base"));
        assert!(!BASE.is_a("Derived"));
    }

    #[test]
    fn test_full_schema_applies_base_first() {
        let schema = DERIVED.full_schema();
        assert_eq!(schema.len(), 2);
        assert_eq!(schema.get("b").map(|f| &f.default), Some(&FieldValue::Int(3)));
    }

    #[test]
    fn test_type_id_matches_name_hash() {
        assert_eq!(DERIVED.type_id(), ComponentTypeId::from_name("Derived"));
    }

    #[test]
    fn test_construct_reports_its_type() {
        let c = (DERIVED.construct)();
        assert_eq!(c.component_type().name, "Derived");
    }
}
