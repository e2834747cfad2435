//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Connection accepted:
//!     → timeouts.rs (arm one-shot deadline)
//!     → deadline fires before a request: client evicted
//!     → request or disconnect first: deadline cancelled
//! ```
//!
//! # Design Decisions
//! - Every client has a deadline; idle sockets cannot pile up
//! - No retries anywhere: responses are single best-effort writes

pub mod timeouts;

pub use timeouts::OneShotTimer;
