//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! optional config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → args.rs (command-line flags override file values)
//!     → validation.rs (mandatory values, ranges, addresses)
//!     → DaemonConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no reload
//! - Every field has a default except the four operator-mandatory ones
//! - Validation separates syntactic (serde) from semantic checks

pub mod args;
pub mod loader;
pub mod schema;
pub mod validation;

pub use args::Args;
pub use loader::ConfigError;
pub use schema::{
    ConnectionConfig, DaemonConfig, ListenerConfig, LogFormat, LoggingConfig,
    ObservabilityConfig, PolicyConfig, ReadFailurePolicy,
};
pub use validation::ValidationError;
