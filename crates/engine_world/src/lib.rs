//! # engine_world
//!
//! Entity lifecycle management. The [`EntityManager`] owns entity identity,
//! forwards component attachment to the shared
//! [`ComponentRegistry`](engine_component::ComponentRegistry), and turns
//! entity destruction into per-listener notifications.
//!
//! There is no process-wide state: every simulation owns its own manager and
//! hands an `Arc` of it to the systems that need it.

pub mod manager;

pub use manager::EntityManager;
