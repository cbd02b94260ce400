//! # engine_app
//!
//! Runs the entity/component scheduler at a fixed rate.
//!
//! ## Startup sequence
//!
//! 1. Read the optional JSON configuration file (`world` and `tick`
//!    sections), then apply command-line overrides.
//! 2. Build a world with the demo component types and systems.
//! 3. Build the level document (`--level`, or the embedded demo level) into
//!    a new level and load it.
//! 4. Enter the frame loop.

mod demo;
mod tick;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use engine_component::OverflowPolicy;
use engine_ecs::{CallbackErrorPolicy, LevelDocument, WorldConfig};
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tick::{TickConfig, TickLoop};

#[derive(Debug, Parser)]
#[command(name = "engine_app", about = "Runs the entity/component scheduler on a level document")]
struct Args {
    /// Number of ticks to run (0 = unlimited)
    #[arg(long)]
    ticks: Option<u64>,

    /// Target ticks per second
    #[arg(long)]
    tick_rate: Option<f64>,

    /// Initial capacity of the entity and component queues
    #[arg(long)]
    pool_size: Option<usize>,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Level document to load instead of the demo level
    #[arg(long)]
    level: Option<PathBuf>,

    /// Refuse queue overflow instead of growing
    #[arg(long)]
    strict_pools: bool,

    /// Stop a frame's flush at the first callback error
    #[arg(long)]
    abort_on_error: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AppConfig {
    world: WorldConfig,
    tick: TickConfig,
}

impl AppConfig {
    fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    fn apply(mut self, args: &Args) -> Self {
        if let Some(ticks) = args.ticks {
            self.tick.max_ticks = ticks;
        }
        if let Some(rate) = args.tick_rate {
            self.tick.tick_rate = rate;
        }
        if let Some(size) = args.pool_size {
            self.world.pool_size = size;
        }
        if args.strict_pools {
            self.world.overflow = OverflowPolicy::Reject;
        }
        if args.abort_on_error {
            self.world.callback_errors = CallbackErrorPolicy::AbortFlush;
        }
        self
    }
}

fn load_level(path: Option<&Path>) -> Result<LevelDocument> {
    let Some(path) = path else {
        return Ok(LevelDocument::from_json(demo::DEMO_LEVEL)?);
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading level {}", path.display()))?;
    LevelDocument::from_json(&text).with_context(|| format!("loading level {}", path.display()))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("engine_app=info".parse()?)
                .add_directive("engine_ecs=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    }
    .apply(&args);
    anyhow::ensure!(config.tick.tick_rate > 0.0, "--tick-rate must be positive");

    info!(
        pool_size = config.world.pool_size,
        overflow = ?config.world.overflow,
        callback_errors = ?config.world.callback_errors,
        "engine starting"
    );

    let mut world = demo::build_world(config.world, config.tick.step() as f32);
    let doc = load_level(args.level.as_deref())?;
    let level = world.build_level(&doc)?;
    world.load_level(level)?;

    let mut tick_loop = TickLoop::new(config.tick, world);
    tick_loop.run()?;

    info!(frames = tick_loop.world().frame(), "engine shut down");
    Ok(())
}
