//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Startup
//!     → backend.rs (report the readiness mechanism in use)
//! Incoming TCP connection
//!     → listener.rs (permit, accept, interrupted-accept retry)
//!     → connection.rs (read/timeout race, protocol state machine, tracking)
//!
//! Connection States:
//!     AwaitingRequest → Responding → Closed
//!     AwaitingRequest → TimedOut
//! ```
//!
//! # Design Decisions
//! - Concurrency is bounded by permits taken before accept
//! - Each connection owns its socket, timer and permit; drop releases all three

pub mod backend;
pub mod connection;
pub mod listener;

pub use backend::Backend;
pub use connection::{
    Connection, ConnectionError, ConnectionOutcome, ConnectionStats, ConnectionTracker,
};
pub use listener::{Listener, ListenerError};
