//! TCP transport implementation

use crate::stream::{StreamReader, StreamWriter};
use async_trait::async_trait;
use eiscp_core::{EiscpError, EiscpResult};
use std::fmt;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

/// Default eISCP port on receivers
pub const DEFAULT_DEVICE_PORT: u16 = 60128;

/// Host and port of a receiver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceAddress {
    pub host: String,
    pub port: u16,
}

impl DeviceAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// TCP transport layer settings
#[derive(Debug, Clone)]
pub struct TcpSettings {
    pub address: DeviceAddress,
    /// Upper bound for a single dial attempt. None waits for the OS.
    pub connect_timeout: Option<Duration>,
}

impl TcpSettings {
    /// Create new TCP settings
    pub fn new(address: DeviceAddress) -> Self {
        Self {
            address,
            connect_timeout: Some(Duration::from_secs(3)),
        }
    }

    /// Create TCP settings with a connect timeout
    pub fn with_timeout(address: DeviceAddress, timeout: Duration) -> Self {
        Self {
            address,
            connect_timeout: Some(timeout),
        }
    }
}

/// TCP transport layer implementation
#[derive(Debug)]
pub struct TcpTransport;

impl TcpTransport {
    /// Dial the receiver once and split the stream into its halves
    pub async fn open(settings: &TcpSettings) -> EiscpResult<(TcpReader, TcpWriter)> {
        let target = (settings.address.host.as_str(), settings.address.port);
        let stream = if let Some(timeout) = settings.connect_timeout {
            tokio::time::timeout(timeout, TcpStream::connect(target))
                .await
                .map_err(|_| EiscpError::Timeout)??
        } else {
            TcpStream::connect(target).await?
        };
        Self::from_connected_stream(stream)
    }

    /// Split an already-connected stream
    pub fn from_connected_stream(stream: TcpStream) -> EiscpResult<(TcpReader, TcpWriter)> {
        // Commands are tiny; don't let Nagle hold them back.
        stream.set_nodelay(true)?;
        let (read_half, write_half) = stream.into_split();
        Ok((
            TcpReader { inner: read_half },
            TcpWriter {
                inner: Some(write_half),
            },
        ))
    }
}

/// Read half of a TCP connection
pub struct TcpReader {
    inner: OwnedReadHalf,
}

impl fmt::Debug for TcpReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TcpReader").finish()
    }
}

#[async_trait]
impl StreamReader for TcpReader {
    async fn read(&mut self, buf: &mut [u8]) -> EiscpResult<usize> {
        Ok(self.inner.read(buf).await?)
    }
}

/// Write half of a TCP connection
pub struct TcpWriter {
    inner: Option<OwnedWriteHalf>,
}

impl fmt::Debug for TcpWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TcpWriter")
            .field("closed", &self.inner.is_none())
            .finish()
    }
}

impl TcpWriter {
    fn stream(&mut self) -> EiscpResult<&mut OwnedWriteHalf> {
        self.inner.as_mut().ok_or_else(|| {
            EiscpError::Connection(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "TCP stream not connected",
            ))
        })
    }
}

#[async_trait]
impl StreamWriter for TcpWriter {
    async fn write(&mut self, buf: &[u8]) -> EiscpResult<usize> {
        Ok(self.stream()?.write(buf).await?)
    }

    async fn flush(&mut self) -> EiscpResult<()> {
        Ok(self.stream()?.flush().await?)
    }

    async fn close(&mut self) -> EiscpResult<()> {
        if let Some(mut stream) = self.inner.take() {
            let _ = stream.shutdown().await;
        }
        Ok(())
    }
}
