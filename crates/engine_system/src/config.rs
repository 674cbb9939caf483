//! Scheduler configuration.

use serde::{Deserialize, Serialize};

/// What happens to a tick when a system update fails or panics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// Log the failure and keep going. The failed system is not marked
    /// completed, so everything that depends on it (directly or
    /// transitively) is skipped for this tick.
    #[default]
    SkipDependents,
    /// Stop after the failing wave's barrier and return the failure from
    /// `advance`.
    AbortTick,
}

/// Configuration for a [`Scheduler`](crate::Scheduler).
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// How per-system failures are handled.
    pub failure_policy: FailurePolicy,
    /// Run the systems of a wave on the rayon pool. When `false` each wave
    /// runs its systems one after another on the calling thread.
    pub parallel: bool,
    /// Size of a thread pool owned by the scheduler. `None` runs waves on
    /// rayon's global pool, whose size follows the host's CPU count.
    pub threads: Option<usize>,
}

impl SchedulerConfig {
    /// Create the default configuration: parallel waves, failures isolated.
    #[must_use]
    pub fn new() -> Self {
        Self {
            failure_policy: FailurePolicy::default(),
            parallel: true,
            threads: None,
        }
    }

    /// Override the failure policy.
    #[must_use]
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Enable or disable parallel execution within a wave.
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Run waves on a dedicated pool of `threads` workers.
    #[must_use]
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::new()
    }
}
