//! Dependency-ordered scheduler.
//!
//! Each call to [`Scheduler::advance`] runs one tick:
//!
//! 1. Snapshot the registered systems and mark them all pending.
//! 2. Collect every pending system whose dependencies completed into a wave.
//! 3. If the wave is empty, the tick is over.
//! 4. Run the wave's systems in parallel and wait for all of them (barrier).
//! 5. Record each outcome and go back to 2.
//! 6. Record the tick's wall-clock duration.
//!
//! Registration may happen concurrently with a tick; because the tick works
//! from its snapshot, a system registered mid-tick first runs on the next
//! tick.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use rayon::ThreadPool;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::config::{FailurePolicy, SchedulerConfig};
use crate::error::ScheduleError;
use crate::plan::{DependencyGraph, Progress};
use crate::registry::{Registration, SystemRegistry};
use crate::system::{System, SystemEntry};

/// What happened during one tick.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TickReport {
    /// Tick counter, starting at 1.
    pub tick_id: u64,
    /// The delta passed to every system.
    pub delta_time: f64,
    /// Number of waves executed.
    pub waves: usize,
    /// Systems that updated successfully, in completion order by wave.
    pub completed: Vec<String>,
    /// Systems whose update failed or panicked.
    pub failed: Vec<String>,
    /// Systems not run because a dependency failed.
    pub skipped: Vec<String>,
    /// Systems not run because a dependency is no longer registered.
    pub stalled: Vec<String>,
    /// Wall-clock time spent in `advance`.
    pub duration: Duration,
}

impl TickReport {
    /// Returns `true` if every system in the snapshot ran successfully.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty() && self.stalled.is_empty()
    }
}

/// Runs registered systems once per tick in dependency order.
///
/// All methods take `&self`; share a scheduler behind an `Arc` to register
/// systems from other threads.
#[derive(Debug)]
pub struct Scheduler {
    config: SchedulerConfig,
    /// Present when `config.threads` asks for a dedicated pool.
    pool: Option<ThreadPool>,
    registry: RwLock<SystemRegistry>,
    /// Held for the whole of `advance`.
    ticking: Mutex<()>,
    tick_count: AtomicU64,
    last_tick_nanos: AtomicU64,
}

impl Scheduler {
    /// Create a scheduler with the default configuration, running waves on
    /// rayon's global pool.
    #[must_use]
    pub fn new() -> Self {
        Self::from_parts(SchedulerConfig::default(), None)
    }

    /// Create a scheduler with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::ThreadPool`] if `config.threads` is set and
    /// the pool cannot be started.
    pub fn with_config(config: SchedulerConfig) -> Result<Self, ScheduleError> {
        let pool = match config.threads {
            Some(threads) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|idx| format!("scheduler-{idx}"))
                    .build()?,
            ),
            None => None,
        };
        if let Some(pool) = &pool {
            debug!(threads = pool.current_num_threads(), "scheduler pool started");
        }
        Ok(Self::from_parts(config, pool))
    }

    fn from_parts(config: SchedulerConfig, pool: Option<ThreadPool>) -> Self {
        Self {
            config,
            pool,
            registry: RwLock::new(SystemRegistry::new()),
            ticking: Mutex::new(()),
            tick_count: AtomicU64::new(0),
            last_tick_nanos: AtomicU64::new(0),
        }
    }

    /// The scheduler configuration.
    #[must_use]
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Register a system.
    ///
    /// A name collision is logged and ignored ([`Registration::Duplicate`]).
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::MissingDependency`] if the system depends on
    /// a name that is not registered yet. Register systems after their
    /// dependencies.
    pub fn register(&self, system: impl System + 'static) -> Result<Registration, ScheduleError> {
        self.register_boxed(Box::new(system))
    }

    /// Register an already boxed system. See [`Scheduler::register`].
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::MissingDependency`] on an unknown dependency.
    pub fn register_boxed(&self, system: Box<dyn System>) -> Result<Registration, ScheduleError> {
        self.registry.write().register(system)
    }

    /// Remove a system immediately. Returns `false` if it was not registered.
    ///
    /// The caller is responsible for not leaving systems that depend on it;
    /// such dependents stop running until the name is registered again.
    pub fn unregister(&self, name: &str) -> bool {
        self.registry.write().unregister(name).is_some()
    }

    /// Returns `true` if a system with this name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.registry.read().contains(name)
    }

    /// Names of all registered systems, sorted.
    #[must_use]
    pub fn system_names(&self) -> Vec<String> {
        self.registry
            .read()
            .iter()
            .map(|entry| entry.name().to_string())
            .collect()
    }

    /// Number of registered systems.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registry.read().len()
    }

    /// Returns `true` if no systems are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registry.read().is_empty()
    }

    /// The waves the next tick would run if every system succeeds, as
    /// sorted system names.
    #[must_use]
    pub fn plan(&self) -> Vec<Vec<String>> {
        let snapshot = self.registry.read().snapshot();
        let graph = graph_of(&snapshot);
        graph
            .waves()
            .into_iter()
            .map(|wave| {
                wave.system_indices
                    .iter()
                    .map(|&idx| snapshot[idx].name().to_string())
                    .collect()
            })
            .collect()
    }

    /// Number of ticks started so far.
    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.tick_count.load(Ordering::Acquire)
    }

    /// Wall-clock duration of the previous tick, in seconds. `0.0` before the
    /// first tick.
    #[must_use]
    pub fn last_tick_duration(&self) -> f64 {
        self.last_tick_elapsed().as_secs_f64()
    }

    /// Wall-clock duration of the previous tick.
    #[must_use]
    pub fn last_tick_elapsed(&self) -> Duration {
        Duration::from_nanos(self.last_tick_nanos.load(Ordering::Acquire))
    }

    /// Run every registered system once, in dependency order.
    ///
    /// # Errors
    ///
    /// - [`ScheduleError::TickInProgress`] if another `advance` is running
    ///   (including one calling back into the scheduler from a system).
    /// - [`ScheduleError::SystemFailed`] if a system fails and the policy is
    ///   [`FailurePolicy::AbortTick`].
    pub fn advance(&self, delta_time: f64) -> Result<TickReport, ScheduleError> {
        let Some(_ticking) = self.ticking.try_lock() else {
            return Err(ScheduleError::TickInProgress);
        };

        let start = Instant::now();
        let tick_id = self.tick_count.fetch_add(1, Ordering::AcqRel) + 1;
        let snapshot = self.registry.read().snapshot();
        let graph = graph_of(&snapshot);

        let mut progress = vec![Progress::Pending; snapshot.len()];
        let mut report = TickReport {
            tick_id,
            delta_time,
            ..TickReport::default()
        };

        let outcome = loop {
            let wave = graph.next_wave(&progress);
            if wave.is_empty() {
                break Ok(());
            }

            debug!(tick_id, wave = report.waves, systems = wave.len(), "running wave");
            let results = self.run_wave(&snapshot, &wave.system_indices, delta_time);
            report.waves += 1;

            let mut first_failure = None;
            for (idx, result) in results {
                let name = snapshot[idx].name();
                match result {
                    Ok(()) => {
                        progress[idx] = Progress::Completed;
                        report.completed.push(name.to_string());
                    }
                    Err(reason) => {
                        error!(tick_id, system = name, %reason, "system update failed");
                        progress[idx] = Progress::Failed;
                        report.failed.push(name.to_string());
                        if first_failure.is_none() {
                            first_failure = Some(ScheduleError::SystemFailed {
                                system: name.to_string(),
                                reason,
                            });
                        }
                    }
                }
            }

            if let Some(err) = first_failure {
                match self.config.failure_policy {
                    FailurePolicy::AbortTick => break Err(err),
                    FailurePolicy::SkipDependents => graph.propagate_failures(&mut progress),
                }
            }
        };

        for (idx, state) in progress.iter().enumerate() {
            let name = snapshot[idx].name().to_string();
            match state {
                Progress::Skipped => report.skipped.push(name),
                Progress::Pending if outcome.is_ok() => {
                    warn!(
                        tick_id,
                        system = %name,
                        dependencies = ?snapshot[idx].dependencies(),
                        "system stalled: a dependency is not registered"
                    );
                    report.stalled.push(name);
                }
                _ => {}
            }
        }
        if !report.skipped.is_empty() {
            warn!(tick_id, skipped = ?report.skipped, "dependents of failed systems skipped");
        }

        let elapsed = start.elapsed();
        self.last_tick_nanos.store(
            u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX).max(1),
            Ordering::Release,
        );
        report.duration = elapsed;

        debug!(
            tick_id,
            waves = report.waves,
            completed = report.completed.len(),
            failed = report.failed.len(),
            elapsed_us = elapsed.as_micros() as u64,
            "tick complete"
        );

        outcome.map(|()| report)
    }

    /// Run one wave and wait for all of its systems.
    fn run_wave(
        &self,
        snapshot: &[SystemEntry],
        wave: &[usize],
        delta_time: f64,
    ) -> Vec<(usize, Result<(), String>)> {
        let run = |&idx: &usize| (idx, snapshot[idx].run(delta_time));
        if !self.config.parallel || wave.len() < 2 {
            return wave.iter().map(run).collect();
        }
        match &self.pool {
            Some(pool) => pool.install(|| wave.par_iter().map(run).collect()),
            None => wave.par_iter().map(run).collect(),
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

fn graph_of(snapshot: &[SystemEntry]) -> DependencyGraph {
    DependencyGraph::new(
        snapshot
            .iter()
            .map(|entry| (entry.name(), entry.dependencies())),
    )
}
