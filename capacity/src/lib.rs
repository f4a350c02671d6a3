//! Capacity provider: grows and shrinks the session-runner pool from
//! demand signals, and reconciles the store against the backend's truth.

pub mod backend;
pub mod config;
pub mod policy;
pub mod provider;

pub use backend::{CapacityBackend, InMemoryBackend, RunnerInstance, RunnerStatus};
pub use config::Config;
pub use policy::{plan, DemandMetrics, ScalePlan, ScaleState};
pub use provider::CapacityProvider;
