//! Policy document storage.
//!
//! The document is read once during startup and shared read-only by every
//! connection. Its content is opaque: no XML parsing or validation happens.

pub mod store;

pub use store::{PolicyDocument, PolicyError, DEFAULT_CAPACITY};
