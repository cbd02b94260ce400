//! Fixed-rate frame loop.
//!
//! Each iteration runs one [`World::tick`]: systems' `tick` and `post_tick`
//! passes followed by the deferred flush. An aborted flush is logged and the
//! loop keeps going, since the unprocessed work carries over to the next
//! frame.

use std::time::{Duration, Instant};

use engine_ecs::{FrameStats, World, WorldError};
use serde::Deserialize;
use tracing::{debug, info, warn};

/// Configuration for the frame loop.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TickConfig {
    /// Frames per second.
    pub tick_rate: f64,
    /// Frames to run before returning; 0 runs forever.
    pub max_ticks: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60.0,
            max_ticks: 0,
        }
    }
}

impl TickConfig {
    /// Seconds per tick.
    #[must_use]
    pub fn step(&self) -> f64 {
        1.0 / self.tick_rate
    }
}

/// Drives a [`World`] one frame at a time at a fixed rate.
#[derive(Debug)]
pub struct TickLoop {
    tick_id: u64,
    config: TickConfig,
    world: World,
    last_stats: Option<FrameStats>,
    aborted: u64,
}

impl TickLoop {
    /// Creates a loop that has not run any frame yet.
    #[must_use]
    pub fn new(config: TickConfig, world: World) -> Self {
        Self {
            tick_id: 0,
            config,
            world,
            last_stats: None,
            aborted: 0,
        }
    }

    /// Number of frames this loop has started.
    #[must_use]
    pub fn tick_id(&self) -> u64 {
        self.tick_id
    }

    /// The world being driven.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Mutable access to the world between frames.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Stats of the last frame whose flush completed.
    #[must_use]
    pub fn last_stats(&self) -> Option<FrameStats> {
        self.last_stats
    }

    /// Frames whose flush was aborted by a callback error.
    #[must_use]
    pub fn aborted(&self) -> u64 {
        self.aborted
    }

    /// Runs one frame.
    ///
    /// # Errors
    ///
    /// Any world error other than an aborted flush.
    pub fn tick(&mut self) -> Result<(), WorldError> {
        self.tick_id += 1;
        match self.world.tick() {
            Ok(stats) => {
                debug!(
                    tick_id = self.tick_id,
                    activated = stats.entities_activated,
                    destroyed = stats.entities_destroyed,
                    live = stats.live_entities,
                    errors = stats.callback_errors,
                    "tick complete"
                );
                self.last_stats = Some(stats);
                Ok(())
            }
            Err(WorldError::FlushAborted { frame, reason }) => {
                warn!(tick_id = self.tick_id, frame, %reason, "flush aborted, work carried over");
                self.aborted += 1;
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Runs frames back to back at the configured rate until `max_ticks`
    /// frames have run, or forever when it is 0.
    ///
    /// # Errors
    ///
    /// A non-positive tick rate, or a world error from [`TickLoop::tick`].
    pub fn run(&mut self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.config.tick_rate > 0.0,
            "tick rate must be positive, got {}",
            self.config.tick_rate
        );
        let budget = Duration::from_secs_f64(self.config.step());
        let status_every = (self.config.tick_rate.ceil() as u64).max(1);
        info!(rate = self.config.tick_rate, limit = self.config.max_ticks, "frame loop started");

        let mut frames = 0u64;
        while self.config.max_ticks == 0 || frames < self.config.max_ticks {
            let began = Instant::now();
            self.tick()?;
            frames += 1;
            if frames % status_every == 0 {
                self.log_status();
            }
            if frames != self.config.max_ticks {
                self.pace(began, budget);
            }
        }
        info!(frames, aborted = self.aborted, "frame loop finished");
        Ok(())
    }

    fn log_status(&self) {
        info!(
            tick_id = self.tick_id,
            live = self.world.live_entities().len(),
            pending = self.world.pending_entities().len(),
            "world status"
        );
    }

    /// Sleeps off whatever is left of the frame budget.
    fn pace(&self, began: Instant, budget: Duration) {
        let spent = began.elapsed();
        match budget.checked_sub(spent) {
            Some(rest) if !rest.is_zero() => std::thread::sleep(rest),
            _ => warn!(
                tick_id = self.tick_id,
                spent_ms = spent.as_millis() as u64,
                budget_ms = budget.as_millis() as u64,
                "frame over budget"
            ),
        }
    }
}
