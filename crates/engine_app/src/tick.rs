//! Fixed-rate tick loop.
//!
//! Each frame measures the wall-clock time since the previous frame, passes
//! it to [`Scheduler::advance`], then sleeps for whatever is left of the
//! frame budget. The loop ends after `max_ticks` frames or when the shutdown
//! flag is raised.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info, warn};

use engine_system::Scheduler;

/// Configuration for the tick loop.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Target ticks per second.
    pub tick_rate: f64,
    /// Maximum number of ticks to run (0 = unlimited).
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
    #[must_use]
    pub fn with_tick_rate(mut self, tick_rate: f64) -> Self {
        self.tick_rate = tick_rate;
        self
    }

    #[must_use]
    pub fn with_max_ticks(mut self, max_ticks: u64) -> Self {
        self.max_ticks = max_ticks;
        self
    }

    /// Time budget of one frame.
    ///
    /// # Errors
    ///
    /// Fails if the tick rate is not a positive finite number or is so small
    /// that one frame does not fit in a [`Duration`].
    pub fn frame_budget(&self) -> Result<Duration> {
        anyhow::ensure!(
            self.tick_rate.is_finite() && self.tick_rate > 0.0,
            "tick rate must be a positive number, got {}",
            self.tick_rate
        );
        Duration::try_from_secs_f64(1.0 / self.tick_rate)
            .with_context(|| format!("tick rate {} is too low", self.tick_rate))
    }
}

/// Totals for a finished run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub ticks: u64,
    /// Ticks that returned an error from `advance`.
    pub aborted_ticks: u64,
    /// Ticks whose report listed failed, skipped or stalled systems.
    pub degraded_ticks: u64,
    pub mean_tick_seconds: f64,
    pub max_tick_seconds: f64,
    pub over_budget: u64,
}

/// Drives a scheduler at a fixed rate.
#[derive(Debug)]
pub struct TickLoop {
    config: TickConfig,
    budget: Duration,
    scheduler: Arc<Scheduler>,
}

impl TickLoop {
    /// # Errors
    ///
    /// Fails if the configured tick rate has no valid frame budget.
    pub fn new(config: TickConfig, scheduler: Arc<Scheduler>) -> Result<Self> {
        let budget = config.frame_budget()?;
        Ok(Self {
            config,
            budget,
            scheduler,
        })
    }

    /// Run until `max_ticks` is reached or `shutdown` is set.
    ///
    /// A tick that fails is logged and counted; the loop carries on with the
    /// next frame.
    pub fn run(&self, shutdown: &AtomicBool) -> RunSummary {
        let budget = self.budget;
        let mut summary = RunSummary::default();
        let mut total_seconds = 0.0;

        info!(
            tick_rate = self.config.tick_rate,
            max_ticks = self.config.max_ticks,
            systems = self.scheduler.len(),
            "starting tick loop"
        );

        // The first frame has no predecessor; it gets a nominal delta.
        let mut last = Instant::now().checked_sub(budget).unwrap_or_else(Instant::now);

        while !shutdown.load(Ordering::Acquire) {
            let start = Instant::now();
            let dt = start.duration_since(last).as_secs_f64();
            last = start;

            match self.scheduler.advance(dt) {
                Ok(report) => {
                    if !report.is_clean() {
                        summary.degraded_ticks += 1;
                    }
                }
                Err(err) => {
                    warn!(tick = summary.ticks + 1, %err, "tick aborted");
                    summary.aborted_ticks += 1;
                }
            }

            let tick_seconds = self.scheduler.last_tick_duration();
            total_seconds += tick_seconds;
            summary.max_tick_seconds = summary.max_tick_seconds.max(tick_seconds);
            summary.ticks += 1;

            if self.config.max_ticks > 0 && summary.ticks >= self.config.max_ticks {
                info!(ticks = summary.ticks, "tick loop complete");
                break;
            }

            let elapsed = start.elapsed();
            if elapsed < budget {
                std::thread::sleep(budget - elapsed);
            } else {
                summary.over_budget += 1;
                warn!(
                    tick = summary.ticks,
                    elapsed_ms = elapsed.as_millis() as u64,
                    budget_ms = budget.as_millis() as u64,
                    "tick exceeded time budget"
                );
            }
        }

        if shutdown.load(Ordering::Acquire) {
            debug!(ticks = summary.ticks, "tick loop stopped by shutdown");
        }
        if summary.ticks > 0 {
            summary.mean_tick_seconds = total_seconds / summary.ticks as f64;
        }
        summary
    }
}
