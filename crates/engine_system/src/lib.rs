//! # engine_system
//!
//! Systems and the dependency-ordered scheduler that runs them.
//!
//! A [`System`] declares which other systems must finish before it runs each
//! tick. The [`Scheduler`] groups systems into waves: every system in a wave
//! has all of its dependencies completed, so the systems of one wave run in
//! parallel, and waves run one after another.
//!
//! ## Usage
//!
//! ```rust
//! use engine_system::{Scheduler, System};
//!
//! struct Named(&'static str, &'static [&'static str]);
//!
//! impl System for Named {
//!     fn name(&self) -> &str {
//!         self.0
//!     }
//!
//!     fn dependencies(&self) -> Vec<String> {
//!         self.1.iter().map(|d| d.to_string()).collect()
//!     }
//!
//!     fn update(&mut self, _delta_time: f64) -> anyhow::Result<()> {
//!         Ok(())
//!     }
//! }
//!
//! let scheduler = Scheduler::new();
//! scheduler.register(Named("input", &[])).unwrap();
//! scheduler.register(Named("physics", &["input"])).unwrap();
//!
//! let report = scheduler.advance(1.0 / 60.0).unwrap();
//! assert_eq!(report.waves, 2);
//! assert!(scheduler.last_tick_duration() > 0.0);
//! ```

pub mod config;
pub mod error;
pub mod plan;
pub mod registry;
pub mod scheduler;
pub mod system;

pub use config::{FailurePolicy, SchedulerConfig};
pub use error::ScheduleError;
pub use plan::{DependencyGraph, Progress, Wave};
pub use registry::{Registration, SystemRegistry};
pub use scheduler::{Scheduler, TickReport};
pub use system::{System, SystemEntry};
