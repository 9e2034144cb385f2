use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::error::LinkError;

/// A freshly opened line-oriented TCP transport.
///
/// Splitting hands the read side to exactly one owner (the listener task)
/// while the write side can be cloned to every task that sends.
#[derive(Debug)]
pub struct Connection {
    reader: LineReader,
    writer: LineWriter,
}

impl Connection {
    /// Opens a TCP connection to `host:port`.
    pub async fn open(host: &str, port: u16, read_timeout: Duration) -> Result<Self, LinkError> {
        let addr = format!("{}:{}", host, port);
        debug!("Opening connection to {}", addr);

        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|source| LinkError::Connect {
                addr: addr.clone(),
                source,
            })?;

        // Input frames are small and latency matters more than throughput.
        if let Err(e) = stream.set_nodelay(true) {
            warn!("Could not set TCP_NODELAY on {}: {}", addr, e);
        }

        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            reader: LineReader {
                inner: read_half,
                read_timeout,
                buf: Vec::with_capacity(1024),
            },
            writer: LineWriter {
                inner: Arc::new(Mutex::new(write_half)),
            },
        })
    }

    pub fn split(self) -> (LineReader, LineWriter) {
        (self.reader, self.writer)
    }
}

/// Buffered, idle-timeout-aware line reads.
///
/// Buffering lives in the reader itself rather than in a read future, so a
/// timed-out or cancelled read never loses a partial line: the bytes stay
/// in `buf` and the next call picks up where the last one stopped.
#[derive(Debug)]
pub struct LineReader {
    inner: OwnedReadHalf,
    read_timeout: Duration,
    buf: Vec<u8>,
}

impl LineReader {
    /// Reads the next full line, waiting at most the configured idle timeout
    /// for each chunk to arrive. EOF maps to [`LinkError::Closed`].
    pub async fn read_line(&mut self) -> Result<String, LinkError> {
        loop {
            if let Some(end) = self.buf.iter().position(|&byte| byte == b'\n') {
                let line: Vec<u8> = self.buf.drain(..=end).collect();
                return Ok(String::from_utf8_lossy(&line).trim_end().to_string());
            }

            // read_buf is cancel safe; a timeout here drops no data.
            let read = tokio::time::timeout(self.read_timeout, self.inner.read_buf(&mut self.buf))
                .await
                .map_err(|_| LinkError::ReadTimeout)?
                .map_err(LinkError::Io)?;
            if read == 0 {
                return Err(LinkError::Closed);
            }
        }
    }
}

/// Cloneable write side. The inner lock keeps concurrent senders from
/// interleaving partial lines.
#[derive(Clone, Debug)]
pub struct LineWriter {
    inner: Arc<Mutex<OwnedWriteHalf>>,
}

impl LineWriter {
    /// Writes one message line, newline-terminated and flushed.
    pub async fn write_line(&self, line: &str) -> Result<(), LinkError> {
        let mut half = self.inner.lock().await;
        half.write_all(line.as_bytes()).await?;
        half.write_all(b"\n").await?;
        half.flush().await?;
        Ok(())
    }

    /// Shuts the write direction down. Safe to call repeatedly and from
    /// concurrent callers.
    pub async fn shutdown(&self) {
        let mut half = self.inner.lock().await;
        if let Err(e) = half.shutdown().await {
            debug!("Write half already closed: {}", e);
        }
    }
}
