//! Metrics emission
//!
//! Stats are fire-and-forget. [`StatsdMetrics`] hands them to a `cadence`
//! client that queues them off the caller's task and packs them into UDP
//! datagrams in statsd line format:
//!
//! ```text
//! eiscp.update.MVL:42|g
//! eiscp.get.MVL:30|c
//! ```

use cadence::prelude::*;
use cadence::{BufferedUdpMetricSink, MetricError, QueuingMetricSink, StatsdClient};
use eiscp_core::{EiscpError, EiscpResult};
use std::net::UdpSocket;
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Flush interval for buffered stats
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(2);

/// Destination for gateway stats
#[cfg_attr(test, mockall::automock)]
pub trait MetricsSink: Send + Sync {
    /// Record the current value of `name`
    fn gauge(&self, name: &str, value: i64);
    /// Record an absolute sample for `name`
    fn absolute(&self, name: &str, value: i64);
}

/// Sink used when stats are disabled
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn gauge(&self, _name: &str, _value: i64) {}
    fn absolute(&self, _name: &str, _value: i64) {}
}

/// Buffered statsd client over UDP
///
/// Gauges are sent as `|g`. Absolute samples are sent as counters (`|c`) so
/// the statsd server sums them per interval.
#[derive(Debug, Clone)]
pub struct StatsdMetrics {
    client: Arc<StatsdClient>,
}

impl StatsdMetrics {
    /// Open the UDP socket and start the flush task
    ///
    /// Every stat name is sent as `<prefix>.<name>`. The task flushes the
    /// buffer every `interval` and exits once every clone of the returned sink
    /// is dropped; whatever is still buffered then goes out with the sink.
    pub async fn connect(address: &str, prefix: &str, interval: Duration) -> EiscpResult<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.set_nonblocking(true)?;
        let udp = BufferedUdpMetricSink::from(address, socket).map_err(|e| {
            EiscpError::Protocol(format!("Cannot reach statsd at {}: {}", address, e))
        })?;
        let client = StatsdClient::builder(prefix, QueuingMetricSink::from(udp))
            .with_error_handler(|e| log::warn!("Failed to send stats: {}", e))
            .build();
        log::info!("Sending stats to statsd at {}", address);

        let client = Arc::new(client);
        tokio::spawn(flush_loop(Arc::downgrade(&client), interval));
        Ok(Self { client })
    }

    fn report(&self, name: &str, sent: Result<impl Sized, MetricError>) {
        if let Err(e) = sent {
            log::debug!("Dropping stat {}: {}", name, e);
        }
    }
}

impl MetricsSink for StatsdMetrics {
    fn gauge(&self, name: &str, value: i64) {
        self.report(name, self.client.gauge(name, value as f64));
    }

    fn absolute(&self, name: &str, value: i64) {
        self.report(name, self.client.count(name, value));
    }
}

async fn flush_loop(client: Weak<StatsdClient>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let Some(client) = client.upgrade() else {
            break;
        };
        if let Err(e) = client.flush() {
            log::warn!("Failed to flush stats: {}", e);
        }
    }
    log::debug!("Stats sink dropped, flush task exiting");
}
