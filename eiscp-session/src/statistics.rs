//! Session traffic statistics

/// Counters for one device link
///
/// Updated by the read loop and writer task, read by anyone holding the link.
/// Counters accumulate across reconnects of the same link.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStatistics {
    /// Frames handed to the socket
    pub frames_sent: u64,
    /// Valid frames received
    pub frames_received: u64,
    /// Frames or byte runs discarded as malformed
    pub frames_rejected: u64,
    /// Failed socket writes
    pub write_failures: u64,
    /// Keep-alive queries sent after a quiet period
    pub keepalive_probes: u64,
    /// Sessions closed because the device stopped answering
    pub stalls: u64,
    /// Successful dials
    pub connects: u64,
}

impl SessionStatistics {
    /// Create new statistics with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all statistics counters
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn increment_frames_sent(&mut self) {
        self.frames_sent += 1;
    }

    pub fn increment_frames_received(&mut self) {
        self.frames_received += 1;
    }

    pub fn increment_frames_rejected(&mut self) {
        self.frames_rejected += 1;
    }

    pub fn increment_write_failures(&mut self) {
        self.write_failures += 1;
    }

    pub fn increment_keepalive_probes(&mut self) {
        self.keepalive_probes += 1;
    }

    pub fn increment_stalls(&mut self) {
        self.stalls += 1;
    }

    pub fn increment_connects(&mut self) {
        self.connects += 1;
    }

    /// Share of received traffic that was rejected, as a percentage
    ///
    /// Returns 0.0 if nothing has been received.
    pub fn reject_rate(&self) -> f64 {
        let total = self.frames_received + self.frames_rejected;
        if total == 0 {
            0.0
        } else {
            (self.frames_rejected as f64 / total as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let mut stats = SessionStatistics::new();
        assert_eq!(stats.reject_rate(), 0.0);

        stats.increment_frames_received();
        stats.increment_frames_received();
        stats.increment_frames_received();
        stats.increment_frames_rejected();
        stats.increment_frames_sent();
        assert_eq!(stats.frames_received, 3);
        assert_eq!(stats.frames_sent, 1);
        assert_eq!(stats.reject_rate(), 25.0);

        stats.clear();
        assert_eq!(stats, SessionStatistics::default());
    }
}
