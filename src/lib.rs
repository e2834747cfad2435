//! Flash socket policy daemon library.
//!
//! Answers `<policy-file-request/>` with a preloaded policy document and
//! evicts clients that stay silent past their deadline.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────┐
//!                 │                 FLASH-POLICYD                │
//!   client        │  ┌──────────┐   ┌────────────┐   ┌────────┐  │
//!   ──────────────┼─▶│ listener │──▶│ connection │──▶│protocol│  │
//!                 │  │ (permit) │   │ read/timer │   │Session │  │
//!   policy bytes  │  └──────────┘   └─────┬──────┘   └────────┘  │
//!   ◀─────────────┼───────────────────────┘                      │
//!                 │        ▲ Arc<PolicyDocument> (read-only)     │
//!                 │  ┌─────┴────┐ ┌─────────┐ ┌───────────────┐  │
//!                 │  │  policy  │ │ config  │ │ observability │  │
//!                 │  └──────────┘ └─────────┘ └───────────────┘  │
//!                 └──────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod policy;
pub mod protocol;
pub mod resilience;
pub mod server;

pub use config::DaemonConfig;
pub use error::DaemonError;
pub use lifecycle::Shutdown;
pub use policy::PolicyDocument;
pub use server::PolicyServer;
