//! # jobkeeper Engine
//!
//! The runtime half of jobkeeper: a dynamic scheduled-job execution
//! engine. Named background jobs are registered once at startup,
//! scheduled on cron cadences in a configured timezone, toggled and
//! rescheduled at runtime, triggered on demand, and observed through a
//! persisted execution history.
//!
//! ## Components
//!
//! - [`RunnableRegistry`] - maps registry keys to job bodies
//! - [`TriggerEngine`] - one live cron trigger per enabled job
//! - [`JobExecutor`] - runs one execution on its own task and closes its
//!   record
//! - [`JobController`] - orchestrates definition changes against live
//!   schedule state

pub mod config;
pub mod controller;
pub mod executor;
pub mod registry;
pub mod trigger;

pub use config::EngineConfig;
pub use controller::JobController;
pub use executor::JobExecutor;
pub use registry::RunnableRegistry;
pub use trigger::{next_fire_after, parse_cron, TriggerEngine};
