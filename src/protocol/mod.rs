//! Flash socket policy protocol.
//!
//! # Data Flow
//! ```text
//! bytes from client
//!     → token.rs (is this a policy request?)
//!     → state.rs (Session decides: ignore, respond, close, evict)
//!     → net::connection carries out the action
//! ```

pub mod state;
pub mod token;

pub use state::{Action, ConnectionState, Session};
pub use token::{is_policy_request, INPUT_BUFFER_SIZE, REQUEST_TOKEN};
