//! Trait abstraction for the raw byte source to enable testing

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::{timeout_at, Instant};
use tokio_serial::{ClearBuffer, SerialPort};

/// Raw byte source and sink the core reads frames from
///
/// `read` never blocks until full: it returns whatever arrived before the
/// per-read timeout, possibly nothing.
#[async_trait]
pub trait ByteSource: Send {
    /// Read up to `n` bytes
    async fn read(&mut self, n: usize) -> io::Result<Bytes>;

    /// Write all data to the device
    async fn write(&mut self, data: &[u8]) -> io::Result<()>;

    /// Discard pending input
    async fn purge(&mut self) -> io::Result<()>;

    /// Number of bytes waiting to be read
    async fn available(&mut self) -> io::Result<usize>;
}

/// Wrapper around tokio_serial::SerialStream that implements ByteSource
pub struct TokioSerialPort {
    port: tokio_serial::SerialStream,
    read_timeout: Duration,
}

impl TokioSerialPort {
    pub fn new(port: tokio_serial::SerialStream, read_timeout: Duration) -> Self {
        Self { port, read_timeout }
    }
}

fn serial_to_io(e: tokio_serial::Error) -> io::Error {
    io::Error::new(io::ErrorKind::Other, e)
}

#[async_trait]
impl ByteSource for TokioSerialPort {
    async fn read(&mut self, n: usize) -> io::Result<Bytes> {
        let deadline = Instant::now() + self.read_timeout;
        let mut buf = BytesMut::zeroed(n);
        let mut filled = 0;

        while filled < n {
            match timeout_at(deadline, self.port.read(&mut buf[filled..])).await {
                Ok(Ok(0)) => break,
                Ok(Ok(count)) => filled += count,
                Ok(Err(e)) => return Err(e),
                // Timed out: hand back what arrived
                Err(_) => break,
            }
        }

        buf.truncate(filled);
        Ok(buf.freeze())
    }

    async fn write(&mut self, data: &[u8]) -> io::Result<()> {
        self.port.write_all(data).await?;
        self.port.flush().await
    }

    async fn purge(&mut self) -> io::Result<()> {
        self.port.clear(ClearBuffer::Input).map_err(serial_to_io)
    }

    async fn available(&mut self) -> io::Result<usize> {
        self.port
            .bytes_to_read()
            .map(|count| count as usize)
            .map_err(serial_to_io)
    }
}
