//! Channel scheduling subsystem.
//!
//! # Data Flow
//! ```text
//! allocate(scope, options)
//!     → registry (re-read channel list, keep enabled ones)
//!     → health tracker (drop quarantined channels)
//!     → capacity check (in-flight < max_concurrency)
//!     → session binding, else selection.rs weighted pick
//!     → in-flight += 1, return Channel
//!     → nothing eligible: queue with deadline
//!
//! release(scope, channel_id)
//!     → in-flight -= 1 (floored at zero)
//!     → drain queue in arrival order
//! ```
//!
//! # Design Decisions
//! - One mutex per scope guards snapshot, counters, bindings and queue
//! - No caching of registry data; edits apply on the next allocation
//! - The scheduler never retries; callers act on `SchedulerError::kind`
//! - Queue drain is FIFO-attempted, not FIFO-guaranteed

pub mod channel;
pub mod engine;
pub mod error;
pub mod scope;
pub mod selection;

pub use channel::Channel;
pub use engine::{ChannelLease, Scheduler};
pub use error::SchedulerError;
pub use scope::{AllocateOptions, ChannelState, SchedulerSnapshot};
