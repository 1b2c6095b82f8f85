//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → RouterConfig (validated, immutable)
//!     → scheduler / health / admin settings
//!
//! Channel definitions ([[scopes.<name>]] tables) are not cached here:
//!     registry::FileRegistry re-reads them on every allocation
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AdminConfig, ChannelConfig, HealthConfig, LogFormat, ObservabilityConfig, RouterConfig,
    SchedulerConfig,
};
pub use validation::ValidationError;
