//! Network transport for talking to the hddtemp daemon.
//!
//! hddtemp writes its whole report as soon as a client connects and then
//! closes the socket, so one connection carries exactly one exchange.

use async_trait::async_trait;
use std::io;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Upper bound on a single hddtemp report. A few hundred bytes per drive is
/// typical.
pub const MAX_RESPONSE_BYTES: u64 = 64 * 1024;

/// Opens connections to the daemon.
#[async_trait]
pub trait Dialer: Send + Sync {
    async fn connect(&self, address: &str) -> io::Result<Box<dyn Exchange>>;
}

/// A single request/response exchange on an open connection.
#[async_trait]
pub trait Exchange: Send {
    /// Reads until the daemon signals the end of the exchange.
    async fn read_all(&mut self) -> io::Result<String>;

    async fn close(&mut self) -> io::Result<()>;
}

/// Plain TCP dialer.
#[derive(Debug, Clone)]
pub struct TcpDialer {
    max_response_bytes: u64,
}

impl Default for TcpDialer {
    fn default() -> Self {
        Self {
            max_response_bytes: MAX_RESPONSE_BYTES,
        }
    }
}

impl TcpDialer {
    pub fn with_max_response_bytes(max_response_bytes: u64) -> Self {
        Self { max_response_bytes }
    }
}

#[async_trait]
impl Dialer for TcpDialer {
    async fn connect(&self, address: &str) -> io::Result<Box<dyn Exchange>> {
        let stream = TcpStream::connect(address).await?;
        Ok(Box::new(TcpExchange {
            stream,
            limit: self.max_response_bytes,
        }))
    }
}

struct TcpExchange {
    stream: TcpStream,
    limit: u64,
}

#[async_trait]
impl Exchange for TcpExchange {
    async fn read_all(&mut self) -> io::Result<String> {
        let mut buf = Vec::new();
        // One byte past the limit tells an oversized report from one that
        // fits exactly.
        (&mut self.stream)
            .take(self.limit + 1)
            .read_to_end(&mut buf)
            .await?;
        if buf.len() as u64 > self.limit {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("hddtemp response exceeds {} bytes", self.limit),
            ));
        }
        // Drive ids are not guaranteed to be UTF-8.
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    async fn close(&mut self) -> io::Result<()> {
        match self.stream.shutdown().await {
            // The daemon already hung up after writing its report.
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn serve_once(payload: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(payload).await.unwrap();
        });
        addr.to_string()
    }

    #[tokio::test]
    async fn test_reads_until_daemon_closes() {
        let addr = serve_once(b"|/dev/sda|WDC|35|C|").await;
        let mut exchange = TcpDialer::default().connect(&addr).await.unwrap();
        assert_eq!(exchange.read_all().await.unwrap(), "|/dev/sda|WDC|35|C|");
        exchange.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_oversized_response_is_rejected() {
        let addr = serve_once(b"|/dev/sda|WDC|35|C|").await;
        let mut exchange = TcpDialer::with_max_response_bytes(8)
            .connect(&addr)
            .await
            .unwrap();
        let err = exchange.read_all().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
