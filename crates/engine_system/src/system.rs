//! The [`System`] trait and the shared handle the scheduler runs.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;

/// A named, stateful unit of per-tick behaviour.
///
/// Systems in the same wave run on different threads at the same time, so a
/// system must be `Send`. Shared simulation state (for example an
/// `Arc<EntityManager>`) is captured by the system itself.
///
/// # Examples
///
/// ```rust
/// use engine_system::System;
///
/// struct Gravity;
///
/// impl System for Gravity {
///     fn name(&self) -> &str {
///         "gravity"
///     }
///
///     fn dependencies(&self) -> Vec<String> {
///         vec!["input".to_string()]
///     }
///
///     fn update(&mut self, _delta_time: f64) -> anyhow::Result<()> {
///         Ok(())
///     }
/// }
/// ```
pub trait System: Send {
    /// Unique name, used for registration and as the dependency key.
    fn name(&self) -> &str;

    /// Names of the systems that must finish their update before this one
    /// starts, every tick.
    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    /// Advance the system by `delta_time` seconds.
    ///
    /// # Errors
    ///
    /// Returning an error marks the system as failed for this tick; what
    /// happens next is governed by the scheduler's
    /// [`FailurePolicy`](crate::FailurePolicy).
    fn update(&mut self, delta_time: f64) -> anyhow::Result<()>;
}

/// A registered system together with the dependency list captured at
/// registration. Cloning shares the underlying system.
#[derive(Clone)]
pub struct SystemEntry {
    name: Arc<str>,
    dependencies: Arc<[String]>,
    system: Arc<Mutex<Box<dyn System>>>,
}

impl SystemEntry {
    pub(crate) fn new(system: Box<dyn System>) -> Self {
        Self {
            name: Arc::from(system.name()),
            dependencies: Arc::from(system.dependencies()),
            system: Arc::new(Mutex::new(system)),
        }
    }

    /// The system's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The dependency names captured at registration.
    #[must_use]
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Run one update, turning both returned errors and panics into a
    /// failure message.
    pub(crate) fn run(&self, delta_time: f64) -> Result<(), String> {
        let mut system = self.system.lock();
        match panic::catch_unwind(AssertUnwindSafe(|| system.update(delta_time))) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(format!("{err:#}")),
            Err(payload) => Err(format!("panicked: {}", panic_message(&*payload))),
        }
    }
}

impl std::fmt::Debug for SystemEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemEntry")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
