//! Channel router library.
//!
//! Decides which upstream channel (credential + endpoint) of a provider
//! scope serves each outbound request, and supervises channel health.

pub mod admin;
pub mod config;
pub mod health;
pub mod observability;
pub mod registry;
pub mod scheduler;

pub use config::RouterConfig;
pub use health::HealthTracker;
pub use registry::{ChannelRegistry, FileRegistry, InMemoryRegistry};
pub use scheduler::{AllocateOptions, Channel, ChannelLease, Scheduler, SchedulerError};
