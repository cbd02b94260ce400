//! Serializable "call this handler on that component" records.
//!
//! A [`ComponentEvent`] names a target entity, a component type on it, a
//! handler and an optional string payload. Components store them in object
//! fields so that level data can wire one component to another:
//!
//! ```json
//! { "type": "Button",
//!   "properties": { "on_click": [
//!       { "target": "e3", "component": "Door", "handler": "open", "custom_data": "north" }
//!   ] } }
//! ```

use engine_component::Entity;
use engine_schema::{FieldType, FieldValue, ObjectValue, Schema};
use serde_json::Value;
use tracing::trace;

use crate::event::EntityEvent;
use crate::world::World;

/// Object type name the world registers [`ComponentEvent`] under.
pub const COMPONENT_EVENT: &str = "ComponentEvent";

pub fn component_event_schema() -> Schema {
    Schema::new()
        .field("target", FieldType::Entity, None::<Entity>)
        .field("component", FieldType::String, "")
        .field("handler", FieldType::String, "")
        .field("custom_data", FieldType::String, "")
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentEvent {
    pub target: Option<Entity>,
    pub component: String,
    pub handler: String,
    pub custom_data: String,
}

impl ComponentEvent {
    /// Reads a `ComponentEvent` object. `None` for objects of another type.
    #[must_use]
    pub fn from_object(object: &ObjectValue) -> Option<Self> {
        if object.ty != COMPONENT_EVENT {
            return None;
        }
        let text = |name: &str| {
            object
                .get(name)
                .and_then(FieldValue::as_str)
                .unwrap_or_default()
                .to_owned()
        };
        Some(Self {
            target: object.get("target").and_then(FieldValue::as_entity),
            component: text("component"),
            handler: text("handler"),
            custom_data: text("custom_data"),
        })
    }

    /// Every `ComponentEvent` in an object list field.
    #[must_use]
    pub fn list(value: &FieldValue) -> Vec<Self> {
        value
            .as_objects()
            .unwrap_or_default()
            .iter()
            .filter_map(Self::from_object)
            .collect()
    }

    /// Calls the handler on the first component of type `component` on the
    /// target, through [`Component::on_event`](crate::Component::on_event).
    /// The event's detail is the custom data, or `null` when there is none.
    ///
    /// Returns whether a handler ran. Nothing runs without a target or a
    /// handler name, when the target has no such component, or when that
    /// component is busy in one of its own callbacks.
    pub fn emit(&self, world: &mut World) -> bool {
        let Some(target) = self.target else {
            return false;
        };
        if self.handler.is_empty() {
            return false;
        }
        let Some(component) = world.find_component(target, &self.component) else {
            trace!(
                entity = %target,
                component = %self.component,
                "component event has no receiver"
            );
            return false;
        };
        let detail = if self.custom_data.is_empty() {
            Value::Null
        } else {
            Value::String(self.custom_data.clone())
        };
        let event = EntityEvent {
            name: self.handler.clone(),
            entity: target,
            detail,
        };
        world.with_component(component, "on_event", |c, ctx| {
            c.on_event(&self.handler, &event, ctx)
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::component::{Component, ComponentType, Context};
    use crate::error::CallbackResult;
    use crate::level::LevelDocument;
    use crate::test_support::world;

    use super::*;

    /// Records `handler:detail` for every handler call. A `press` call
    /// emits its own `clicks`.
    #[derive(Debug, Default)]
    struct Panel {
        clicks: Vec<ComponentEvent>,
        heard: Vec<String>,
        delivered: usize,
    }

    impl Component for Panel {
        fn component_type(&self) -> &'static ComponentType {
            &PANEL
        }

        fn on_event(
            &mut self,
            handler: &str,
            event: &EntityEvent,
            ctx: &mut Context<'_>,
        ) -> CallbackResult {
            let detail = event.detail.as_str().unwrap_or("-");
            self.heard.push(format!("{handler}:{detail}"));
            if handler == "press" {
                for click in &self.clicks {
                    if click.emit(ctx) {
                        self.delivered += 1;
                    }
                }
            }
            Ok(())
        }

        fn set_field(&mut self, name: &str, value: FieldValue) {
            if name == "clicks" {
                self.clicks = ComponentEvent::list(&value);
            }
        }
    }

    fn new_panel() -> Box<dyn Component> {
        Box::new(Panel::default())
    }

    fn panel_schema() -> Schema {
        Schema::new().objects("clicks", COMPONENT_EVENT)
    }

    static PANEL: ComponentType = ComponentType::new("Panel", new_panel).with_schema(panel_schema);

    fn wired_level() -> LevelDocument {
        let click = |target: &str, data: &str| {
            json!({
                "target": target,
                "component": "Panel",
                "handler": "open",
                "custom_data": data
            })
        };
        LevelDocument::from_value(json!({
            "name": "wired",
            "children": [0, 1, 2],
            "entities": [
                { "name": "button", "components": [{
                    "type": "Panel",
                    "properties": { "clicks": [
                        click("e1", "north"),
                        click("e2", ""),
                        click("e0", "self"),
                        { "target": "e1", "component": "Missing", "handler": "open" }
                    ] }
                }] },
                { "name": "north door", "components": [{ "type": "Panel" }] },
                { "name": "south door", "components": [{ "type": "Panel" }] }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_level_wired_events_reach_their_targets() {
        let mut world = world();
        world.register_type(&PANEL);
        let level = world.build_level(&wired_level()).unwrap();
        world.load_level(level).unwrap();
        world.tick().unwrap();

        let roots = world.hierarchy().level_children(level).to_vec();
        let panels: Vec<_> = roots
            .iter()
            .map(|e| world.find_component(*e, "Panel").unwrap())
            .collect();
        let button = world.component::<Panel>(panels[0]).unwrap();
        assert_eq!(button.clicks.len(), 4);
        assert_eq!(button.clicks[0].target, Some(roots[1]));

        let press = ComponentEvent {
            target: Some(roots[0]),
            component: "Panel".into(),
            handler: "press".into(),
            custom_data: String::new(),
        };
        assert!(press.emit(&mut world));

        let heard = |c| world.component::<Panel>(c).unwrap().heard.clone();
        assert_eq!(heard(panels[0]), ["press:-"]);
        assert_eq!(heard(panels[1]), ["open:north"]);
        assert_eq!(heard(panels[2]), ["open:-"]);
        // The button is busy handling `press`; the missing type has no receiver.
        assert_eq!(world.component::<Panel>(panels[0]).unwrap().delivered, 2);
    }

    #[test]
    fn test_emit_needs_target_and_handler() {
        let mut world = world();
        world.register_type(&PANEL);
        let e = world.create_entity("e", None).unwrap();
        let c = world.create_component(e, "Panel", &Value::Null).unwrap();

        let mut event = ComponentEvent {
            target: None,
            component: "Panel".into(),
            handler: "open".into(),
            custom_data: "x".into(),
        };
        assert!(!event.emit(&mut world));
        event.target = Some(e);
        event.handler.clear();
        assert!(!event.emit(&mut world));
        event.handler = "open".into();
        assert!(event.emit(&mut world));
        assert_eq!(world.component::<Panel>(c).unwrap().heard, ["open:x"]);
    }

    #[test]
    fn test_world_creates_component_event_objects() {
        let mut world = world();
        let e = world.create_entity("e", None).unwrap();
        let object = world
            .create_object(COMPONENT_EVENT, &json!({ "target": e.id(), "handler": "go" }))
            .unwrap();
        let event = ComponentEvent::from_object(&object).unwrap();
        assert_eq!(event.target, Some(e));
        assert_eq!(event.handler, "go");
        assert_eq!(event.component, "");
    }
}
