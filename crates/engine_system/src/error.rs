//! Scheduler error types.

/// Errors surfaced by system registration and tick execution.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    /// A system named a dependency that is not registered yet. Systems must
    /// be registered after everything they depend on.
    #[error("can't register system '{system}': missing dependency '{dependency}'")]
    MissingDependency { system: String, dependency: String },

    /// `advance` was called while another tick was still running.
    #[error("tick already in progress")]
    TickInProgress,

    /// A system update failed and the scheduler is configured to abort the
    /// tick on failure.
    #[error("system '{system}' failed: {reason}")]
    SystemFailed { system: String, reason: String },

    /// The scheduler's worker pool could not be started.
    #[error("failed to build scheduler thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
