//! Health tracking subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound caller finishes an upstream call
//!     → tracker.rs record_success / record_failure
//!     → state.rs (per-channel state machine)
//!     → on quarantine: QuarantineListener callbacks (scheduler drops bindings)
//!
//! Scheduler allocation
//!     → tracker.rs is_available (may start probing)
//! ```
//!
//! # Design Decisions
//! - Passive only: health is derived from real traffic, no synthetic probes
//! - Health state is per (scope, channel)
//! - The tracker never raises errors, it only classifies

pub mod state;
pub mod tracker;

pub use state::{HealthRecord, HealthSnapshot, HealthStatus, Transition};
pub use tracker::{HealthTracker, QuarantineListener};
