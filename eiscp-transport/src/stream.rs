//! Stream accessor traits for the transport layer

use eiscp_core::{EiscpError, EiscpResult};
use async_trait::async_trait;

/// Read half of a connection to a receiver
#[async_trait]
pub trait StreamReader: Send {
    /// Read data from the stream
    ///
    /// # Returns
    ///
    /// Number of bytes read, or 0 if the peer closed the connection.
    /// Must be cancellation safe: dropping the future before it completes
    /// loses no data.
    async fn read(&mut self, buf: &mut [u8]) -> EiscpResult<usize>;
}

/// Write half of a connection to a receiver
#[async_trait]
pub trait StreamWriter: Send {
    /// Write data to the stream
    ///
    /// # Returns
    ///
    /// Number of bytes written
    async fn write(&mut self, buf: &[u8]) -> EiscpResult<usize>;

    /// Write all data to the stream
    async fn write_all(&mut self, buf: &[u8]) -> EiscpResult<()> {
        let mut written = 0;
        while written < buf.len() {
            let n = self.write(&buf[written..]).await?;
            if n == 0 {
                return Err(EiscpError::Connection(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    "Failed to write all data",
                )));
            }
            written += n;
        }
        Ok(())
    }

    /// Flush any buffered data
    async fn flush(&mut self) -> EiscpResult<()>;

    /// Close the stream
    async fn close(&mut self) -> EiscpResult<()>;
}
