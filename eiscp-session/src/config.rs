//! Session timing and framing configuration

use crate::decoder::DEFAULT_MAX_PAYLOAD;
use crate::model::ModelProfile;
use eiscp_core::Command;
use std::time::Duration;

/// Settings shared by every connection a link makes
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Quiet time before a keep-alive query is sent (default: 10 seconds)
    pub read_timeout: Duration,
    /// Time a keep-alive query may go unanswered before the link is suspect
    /// (default: 5 seconds)
    pub liveness_window: Duration,
    /// Pause between failed dial attempts (default: 1 second)
    pub dial_backoff: Duration,
    /// Upper bound for one dial attempt (default: 3 seconds)
    pub connect_timeout: Option<Duration>,
    /// Query sent when the link is quiet (default: `!1PWRQSTN`)
    pub keepalive: Command,
    /// Largest inbound payload accepted (default: 64 KiB)
    pub max_payload: usize,
    /// Header bytes and terminator for outbound frames
    pub model: ModelProfile,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(10),
            liveness_window: Duration::from_secs(5),
            dial_backoff: Duration::from_secs(1),
            connect_timeout: Some(Duration::from_secs(3)),
            keepalive: Command::power_query(),
            max_payload: DEFAULT_MAX_PAYLOAD,
            model: ModelProfile::default(),
        }
    }
}
