//! Command-line configuration

use clap::Parser;
use eiscp_session::DEFAULT_MODEL;
use eiscp_transport::DEFAULT_DEVICE_PORT;

/// eISCP (ethernet Integra Serial Communication Protocol) gateway
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose debugging
    #[arg(long)]
    pub debug: bool,

    /// Enable stats collecting
    #[arg(long)]
    pub stats: bool,

    /// IP address of device to connect to
    #[arg(long, default_value = "127.0.0.1")]
    pub device: String,

    /// Port on device to communicate with
    #[arg(long, default_value_t = DEFAULT_DEVICE_PORT)]
    pub port: u16,

    /// Port to host REST API on
    #[arg(long, default_value_t = 3000)]
    pub serve: u16,

    /// IP and port of statsd server
    #[arg(long, default_value = "localhost:8125")]
    pub statsd: String,

    /// Prefix prepended to all stats
    #[arg(long, default_value = "eiscp")]
    pub prefix: String,

    /// Receiver model, selects the frame header bytes
    #[arg(long, default_value = DEFAULT_MODEL)]
    pub model: String,
}

impl Args {
    /// Default log filter when `RUST_LOG` is not set
    pub fn log_filter(&self) -> &'static str {
        if self.debug { "debug" } else { "info" }
    }
}
