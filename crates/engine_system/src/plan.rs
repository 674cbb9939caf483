//! Wave planning: turning declared dependencies into runnable groups.
//!
//! A tick runs in **waves**. Each wave holds every not-yet-run system whose
//! dependencies have all completed in this tick. Systems within a wave are
//! independent by construction and may run in parallel; waves run strictly
//! one after another with a barrier between them.

use std::collections::HashMap;

/// Per-tick progress of one system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Not run yet this tick.
    Pending,
    /// Update finished successfully.
    Completed,
    /// Update returned an error or panicked.
    Failed,
    /// Not run because a dependency failed or was skipped.
    Skipped,
}

/// A wave is a group of systems that can run in parallel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Wave {
    /// Indices into the graph's system list.
    pub system_indices: Vec<usize>,
}

impl Wave {
    /// Returns `true` if the wave holds no systems.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.system_indices.is_empty()
    }

    /// Number of systems in the wave.
    #[must_use]
    pub fn len(&self) -> usize {
        self.system_indices.len()
    }
}

/// Dependency edges of a fixed set of systems, resolved to indices.
///
/// A dependency that names a system outside the set (one unregistered after
/// its dependents were added) resolves to nothing, and the dependent can
/// never become ready.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    /// `Some(indices)` when every dependency resolved, `None` otherwise.
    edges: Vec<Option<Vec<usize>>>,
}

impl DependencyGraph {
    /// Build the graph for `systems`, given as `(name, dependencies)` pairs.
    /// Indices in the graph follow the iteration order.
    pub fn new<'a, I, D>(systems: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, D)>,
        D: AsRef<[String]>,
    {
        let systems: Vec<(&str, D)> = systems.into_iter().collect();
        let index_of: HashMap<&str, usize> = systems
            .iter()
            .enumerate()
            .map(|(idx, (name, _))| (*name, idx))
            .collect();

        let edges = systems
            .iter()
            .map(|(_, deps)| {
                deps.as_ref()
                    .iter()
                    .map(|dep| index_of.get(dep.as_str()).copied())
                    .collect::<Option<Vec<usize>>>()
            })
            .collect();

        Self { edges }
    }

    /// Number of systems in the graph.
    #[must_use]
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Returns `true` if the graph holds no systems.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Returns `false` if some dependency of `idx` is not in the graph.
    #[must_use]
    pub fn is_resolved(&self, idx: usize) -> bool {
        self.edges[idx].is_some()
    }

    /// Collect every pending system whose dependencies are all completed.
    #[must_use]
    pub fn next_wave(&self, progress: &[Progress]) -> Wave {
        let system_indices = (0..self.len())
            .filter(|&idx| progress[idx] == Progress::Pending && self.is_ready(idx, progress))
            .collect();
        Wave { system_indices }
    }

    /// Mark every pending system that depends (directly or transitively) on a
    /// failed or skipped system as [`Progress::Skipped`].
    pub fn propagate_failures(&self, progress: &mut [Progress]) {
        loop {
            let mut changed = false;
            for idx in 0..self.len() {
                if progress[idx] == Progress::Pending && self.is_blocked(idx, progress) {
                    progress[idx] = Progress::Skipped;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
    }

    fn is_ready(&self, idx: usize, progress: &[Progress]) -> bool {
        match &self.edges[idx] {
            Some(deps) => deps.iter().all(|&dep| progress[dep] == Progress::Completed),
            None => false,
        }
    }

    fn is_blocked(&self, idx: usize, progress: &[Progress]) -> bool {
        match &self.edges[idx] {
            Some(deps) => deps
                .iter()
                .any(|&dep| matches!(progress[dep], Progress::Failed | Progress::Skipped)),
            None => false,
        }
    }

    /// The waves a tick would run if every system succeeds.
    #[must_use]
    pub fn waves(&self) -> Vec<Wave> {
        let mut progress = vec![Progress::Pending; self.len()];
        let mut waves = Vec::new();
        loop {
            let wave = self.next_wave(&progress);
            if wave.is_empty() {
                return waves;
            }
            for &idx in &wave.system_indices {
                progress[idx] = Progress::Completed;
            }
            waves.push(wave);
        }
    }
}
