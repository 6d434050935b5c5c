//! Connection session state machine

use eiscp_core::{EiscpError, EiscpResult};
use std::fmt;

/// Connection session state
///
/// # State Transitions
/// ```text
/// Disconnected -> Connecting   (dial started)
/// Connecting   -> Connected    (dial succeeded)
/// Connecting   -> Disconnected (dial cancelled)
/// Connected    -> Draining     (teardown requested, stall, EOF or read error)
/// Draining     -> Disconnected (socket closed, writer stopped)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No socket (initial state)
    #[default]
    Disconnected,
    /// Dialling the device, retrying on failure
    Connecting,
    /// Socket open, read loop running
    Connected,
    /// Read loop stopped, socket being closed
    Draining,
}

impl SessionState {
    /// Check if commands can be written
    pub fn is_connected(&self) -> bool {
        matches!(self, SessionState::Connected)
    }

    /// Validate state transition
    ///
    /// Self-transitions are accepted so repeated teardown is harmless.
    pub fn validate_transition(&self, new_state: SessionState) -> EiscpResult<()> {
        use SessionState::*;

        let valid = matches!(
            (*self, new_state),
            (Disconnected, Connecting)
                | (Connecting, Connected)
                | (Connecting, Disconnected)
                | (Connected, Draining)
                | (Draining, Disconnected)
        ) || *self == new_state;

        if valid {
            Ok(())
        } else {
            Err(EiscpError::InvalidTransition {
                from: self.as_str(),
                to: new_state.as_str(),
            })
        }
    }

    /// Get human-readable state name
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Disconnected => "Disconnected",
            SessionState::Connecting => "Connecting",
            SessionState::Connected => "Connected",
            SessionState::Draining => "Draining",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
