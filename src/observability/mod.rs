//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events to the log file)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → Operator reading the log file
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Each connection runs inside a span carrying its ID and peer address
//! - Metrics are cheap (atomic increments) and off unless configured

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogLevel, LoggerHandle, LoggingError};
