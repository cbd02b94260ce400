//! Recording components and systems shared by the scenario tests.

use std::cell::RefCell;

use engine_component::{ComponentId, Entity};
use engine_schema::{FieldType, FieldValue, Schema};

use crate::component::{Component, ComponentType, Context, EventBinding};
use crate::config::WorldConfig;
use crate::error::CallbackResult;
use crate::event::EntityEvent;
use crate::system::{System, SystemContext, SystemDescriptor};
use crate::world::World;

thread_local! {
    static LOG: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

pub(crate) fn record(line: impl Into<String>) {
    LOG.with(|log| log.borrow_mut().push(line.into()));
}

/// Drains the calling thread's log.
pub(crate) fn take_log() -> Vec<String> {
    LOG.with(|log| std::mem::take(&mut *log.borrow_mut()))
}

/// Logs `callback:tag` for every lifecycle callback. The callback named in
/// `fail` returns an error after logging.
#[derive(Debug, Clone, Default)]
pub(crate) struct Recorder {
    pub(crate) tag: String,
    pub(crate) fail: String,
    pub(crate) hits: i64,
    pub(crate) target: Option<Entity>,
}

impl Recorder {
    fn log(&self, callback: &str) -> CallbackResult {
        record(format!("{callback}:{}", self.tag));
        if self.fail == callback {
            anyhow::bail!("{callback} failed for {}", self.tag);
        }
        Ok(())
    }
}

impl Component for Recorder {
    fn component_type(&self) -> &'static ComponentType {
        &RECORDER
    }

    fn on_init(&mut self, _ctx: &mut Context<'_>) -> CallbackResult {
        self.log("init")
    }

    fn on_enable(&mut self, _ctx: &mut Context<'_>) -> CallbackResult {
        self.log("enable")
    }

    fn on_disable(&mut self, _ctx: &mut Context<'_>) -> CallbackResult {
        self.log("disable")
    }

    fn on_destroy(&mut self, _ctx: &mut Context<'_>) -> CallbackResult {
        self.log("destroy")
    }

    fn on_clone(&mut self, _source: ComponentId, _ctx: &mut Context<'_>) -> CallbackResult {
        self.log("clone")
    }

    fn on_event(
        &mut self,
        handler: &str,
        _event: &EntityEvent,
        _ctx: &mut Context<'_>,
    ) -> CallbackResult {
        self.hits += 1;
        self.log(handler)
    }

    fn set_field(&mut self, name: &str, value: FieldValue) {
        match name {
            "tag" => self.tag = value.as_str().unwrap_or_default().to_owned(),
            "fail" => self.fail = value.as_str().unwrap_or_default().to_owned(),
            "hits" => self.hits = value.as_i64().unwrap_or_default(),
            "target" => self.target = value.as_entity(),
            _ => {}
        }
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "tag" => Some(self.tag.as_str().into()),
            "fail" => Some(self.fail.as_str().into()),
            "hits" => Some(self.hits.into()),
            "target" => Some(self.target.into()),
            _ => None,
        }
    }

    fn clone_component(&self) -> Option<Box<dyn Component>> {
        Some(Box::new(self.clone()))
    }
}

fn new_recorder() -> Box<dyn Component> {
    Box::new(Recorder::default())
}

fn recorder_schema() -> Schema {
    Schema::new()
        .field("tag", FieldType::String, "")
        .field("fail", FieldType::String, "")
        .field("hits", FieldType::Int, 0)
        .field("target", FieldType::Entity, None::<Entity>)
}

pub(crate) static RECORDER: ComponentType = ComponentType::new("Recorder", new_recorder)
    .with_events(&[EventBinding::new("ping", "ping")])
    .with_schema(recorder_schema);

/// Same behaviour, one more `ping` binding on the derived level.
pub(crate) static LOUD_RECORDER: ComponentType = ComponentType::new("LoudRecorder", new_recorder)
    .extends(&RECORDER)
    .with_events(&[EventBinding::new("ping", "ping_loud")]);

/// Logs `tick:id` and `post_tick:id`, then runs an optional hook during
/// `tick`.
pub(crate) struct RecordingSystem {
    pub(crate) on_tick: Option<Box<dyn FnMut(&mut SystemContext<'_>) -> CallbackResult>>,
    pub(crate) seen: usize,
}

impl RecordingSystem {
    pub(crate) fn new() -> Self {
        Self {
            on_tick: None,
            seen: 0,
        }
    }

    pub(crate) fn with_hook<F>(hook: F) -> Self
    where
        F: FnMut(&mut SystemContext<'_>) -> CallbackResult + 'static,
    {
        Self {
            on_tick: Some(Box::new(hook)),
            seen: 0,
        }
    }
}

impl System for RecordingSystem {
    fn tick(&mut self, ctx: &mut SystemContext<'_>) -> CallbackResult {
        record(format!("tick:{}", ctx.system_id()));
        self.seen = ctx.components().len();
        match self.on_tick.as_mut() {
            Some(hook) => hook(ctx),
            None => Ok(()),
        }
    }

    fn post_tick(&mut self, ctx: &mut SystemContext<'_>) -> CallbackResult {
        record(format!("post_tick:{}", ctx.system_id()));
        Ok(())
    }
}

/// A world with both recorder types and one system driving `Recorder`.
pub(crate) fn world_with(config: WorldConfig) -> World {
    World::with_systems(
        config,
        &[&LOUD_RECORDER],
        vec![SystemDescriptor::new("recorders", "Recorder", RecordingSystem::new())],
    )
}

pub(crate) fn world() -> World {
    world_with(WorldConfig::default())
}
