//! Channel registry subsystem.
//!
//! # Data Flow
//! ```text
//! Scheduler allocation attempt
//!     → ChannelRegistry::list_channels(scope)
//!         - memory.rs (arc-swap snapshot, mutated by the embedding app)
//!         - file.rs (TOML file, re-read on every call)
//!     → Vec<ChannelConfig> in listing order
//! ```
//!
//! # Design Decisions
//! - The registry owns channel definitions; the scheduler only reads them
//! - Every call reflects the latest saved configuration (no scheduler-side cache)
//! - Listing order is preserved, it breaks ties in weighted selection

pub mod file;
pub mod memory;

pub use file::FileRegistry;
pub use memory::InMemoryRegistry;

use crate::config::ChannelConfig;

/// Read-only source of channel definitions.
pub trait ChannelRegistry: Send + Sync {
    /// All channels of a scope, enabled or not, in listing order.
    fn list_channels(&self, scope: &str) -> Vec<ChannelConfig>;

    /// Names of all scopes that currently have channel definitions.
    fn scopes(&self) -> Vec<String>;
}
