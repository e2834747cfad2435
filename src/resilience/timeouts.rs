//! Timeout enforcement.
//!
//! # Responsibilities
//! - Give every connection a deadline for sending its request
//! - Cancel the deadline cleanly when the connection ends first
//!
//! # Design Decisions
//! - Uses Tokio's timer wheel; the timer is registered on creation
//! - Dropping the timer deregisters it, so every exit path cancels it

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::time::{Instant, Sleep};

/// Fires once, `duration` after it was started, unless cancelled first.
#[derive(Debug)]
pub struct OneShotTimer {
    sleep: Pin<Box<Sleep>>,
    duration: Duration,
}

impl OneShotTimer {
    /// Arm a new timer.
    pub fn start(duration: Duration) -> Self {
        Self {
            sleep: Box::pin(tokio::time::sleep(duration)),
            duration,
        }
    }

    /// The configured delay.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Time left before the timer fires.
    pub fn remaining(&self) -> Duration {
        self.sleep.deadline().saturating_duration_since(Instant::now())
    }

    /// Stop the timer without it firing.
    pub fn cancel(self) {
        drop(self);
    }
}

impl Future for OneShotTimer {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        self.sleep.as_mut().poll(cx)
    }
}
