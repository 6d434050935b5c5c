//! Stall detection for a quiet connection
//!
//! A receiver that has nothing to report sends nothing, so silence alone does
//! not mean the link is dead. One deadline, measured from the last successful
//! read, drives three steps:
//!
//! 1. quiet for `read_timeout`: send a keep-alive query
//! 2. still quiet `window` after the query: mark the link suspect
//! 3. still quiet `read_timeout` after the query: the link is dead
//!
//! Any successful read resets to step 1.

use std::time::Duration;
use tokio::time::Instant;

/// What the read loop should do when the deadline passes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessCheck {
    /// Send a keep-alive query
    Probe,
    /// No answer to the keep-alive query yet; keep waiting
    Suspect,
    /// The device stopped answering; close the session
    Dead,
}

/// Liveness marker for one connection
#[derive(Debug, Clone)]
pub struct Liveness {
    last_read: Instant,
    probe_sent: Option<Instant>,
    suspect: bool,
    read_timeout: Duration,
    window: Duration,
}

impl Liveness {
    /// Start tracking from `now`
    pub fn new(now: Instant, read_timeout: Duration, window: Duration) -> Self {
        Self {
            last_read: now,
            probe_sent: None,
            suspect: false,
            read_timeout,
            window,
        }
    }

    /// Record a successful read
    pub fn on_read(&mut self, now: Instant) {
        self.last_read = now;
        self.probe_sent = None;
        self.suspect = false;
    }

    /// Instant at which the read loop must call `on_deadline`
    pub fn deadline(&self) -> Instant {
        match self.probe_sent {
            None => self.last_read + self.read_timeout,
            Some(sent) if !self.suspect => sent + self.window,
            Some(sent) => sent + self.read_timeout,
        }
    }

    /// Advance after the deadline passed without a read
    pub fn on_deadline(&mut self, now: Instant) -> LivenessCheck {
        match self.probe_sent {
            None => {
                self.probe_sent = Some(now);
                LivenessCheck::Probe
            }
            Some(_) if !self.suspect => {
                self.suspect = true;
                LivenessCheck::Suspect
            }
            Some(_) => {
                self.suspect = false;
                self.probe_sent = None;
                LivenessCheck::Dead
            }
        }
    }

    pub fn is_suspect(&self) -> bool {
        self.suspect
    }

    pub fn last_read(&self) -> Instant {
        self.last_read
    }
}
