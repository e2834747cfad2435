//! Per-connection protocol state machine.
//!
//! # State Transitions
//! ```text
//! AwaitingRequest ── read 0 bytes ──────────▶ Closed
//! AwaitingRequest ── read token ────────────▶ Responding ── sent ──▶ Closed
//! AwaitingRequest ── read other bytes ──────▶ AwaitingRequest
//! AwaitingRequest ── timer fired ───────────▶ TimedOut
//! ```
//!
//! The machine performs no I/O. The connection handler feeds it events and
//! carries out the returned [`Action`].

use crate::protocol::token::is_policy_request;

/// Where a connection is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Waiting for the client to send the request token.
    AwaitingRequest,
    /// Token received, policy is being written.
    Responding,
    /// Connection finished normally.
    Closed,
    /// Client was evicted because the timer fired first.
    TimedOut,
}

/// What the handler has to do after feeding an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Nothing; keep waiting for the next read or the timer.
    Ignore,
    /// Write the policy document, then report it sent.
    SendPolicy,
    /// Stop the timer and close the socket.
    Close,
    /// Close the socket without responding.
    Evict,
}

/// State machine for one connection.
#[derive(Debug)]
pub struct Session {
    state: ConnectionState,
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: ConnectionState::AwaitingRequest,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Feed the bytes of one read. An empty slice means the peer closed.
    pub fn on_read(&mut self, received: &[u8]) -> Action {
        if self.state != ConnectionState::AwaitingRequest {
            return Action::Ignore;
        }

        if received.is_empty() {
            self.state = ConnectionState::Closed;
            Action::Close
        } else if is_policy_request(received) {
            self.state = ConnectionState::Responding;
            Action::SendPolicy
        } else {
            Action::Ignore
        }
    }

    /// The response write finished (successfully or not).
    pub fn on_response_sent(&mut self) -> Action {
        if self.state != ConnectionState::Responding {
            return Action::Ignore;
        }
        self.state = ConnectionState::Closed;
        Action::Close
    }

    /// The one-shot timer fired.
    pub fn on_timeout(&mut self) -> Action {
        if self.state != ConnectionState::AwaitingRequest {
            return Action::Ignore;
        }
        self.state = ConnectionState::TimedOut;
        Action::Evict
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
