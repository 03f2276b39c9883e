use crate::error::{ProbeStage, QueryError};
use std::future::Future;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::{lookup_host, TcpStream, UdpSocket};
use tokio::time::timeout;
use tracing::trace;

pub const UDP_RECV_BUFFER: usize = 4096;

/// Runs one socket operation under its own deadline.
pub async fn deadline<T, F>(stage: ProbeStage, limit: Duration, op: F) -> Result<T, QueryError>
where
    F: Future<Output = io::Result<T>>,
{
    trace!("probe stage: {}", stage);
    match timeout(limit, op).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(io_failure(stage, e)),
        Err(_) => Err(QueryError::Timeout(stage)),
    }
}

fn io_failure(stage: ProbeStage, e: io::Error) -> QueryError {
    match e.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => QueryError::Timeout(stage),
        io::ErrorKind::UnexpectedEof => QueryError::malformed("Connection closed mid-response"),
        _ => QueryError::ConnectionFailed(e.to_string()),
    }
}

pub async fn connect_tcp(host: &str, port: u16, limit: Duration) -> Result<TcpStream, QueryError> {
    deadline(ProbeStage::Connecting, limit, TcpStream::connect((host, port))).await
}

/// Binds an ephemeral UDP socket of the right address family and associates it
/// with the target, so `send`/`recv` only see that peer.
pub async fn connect_udp(host: &str, port: u16, limit: Duration) -> Result<UdpSocket, QueryError> {
    let target: SocketAddr = deadline(ProbeStage::Connecting, limit, lookup_host((host, port)))
        .await?
        .next()
        .ok_or_else(|| QueryError::ConnectionFailed(format!("no address for {}", host)))?;

    let local: SocketAddr = if target.is_ipv4() {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    };

    let socket = UdpSocket::bind(local)
        .await
        .map_err(|e| QueryError::Internal(format!("Failed to create socket: {}", e)))?;
    socket
        .connect(target)
        .await
        .map_err(|e| QueryError::ConnectionFailed(e.to_string()))?;
    Ok(socket)
}

/// Sends one datagram and waits for one reply.
pub async fn udp_exchange(socket: &UdpSocket, request: &[u8], limit: Duration) -> Result<Vec<u8>, QueryError> {
    deadline(ProbeStage::Sending, limit, socket.send(request)).await?;

    let mut buffer = vec![0u8; UDP_RECV_BUFFER];
    let size = deadline(ProbeStage::AwaitingResponse, limit, socket.recv(&mut buffer)).await?;
    buffer.truncate(size);
    Ok(buffer)
}

/// Reads from a text protocol stream until `marker` shows up, the peer closes,
/// or `limit` bytes have been collected.
pub async fn read_until_marker(
    stream: &mut TcpStream,
    marker: &str,
    limit: usize,
    per_read: Duration,
) -> Result<String, QueryError> {
    let mut collected = Vec::new();
    let mut chunk = [0u8; 1024];

    loop {
        let n = deadline(ProbeStage::AwaitingResponse, per_read, stream.read(&mut chunk)).await?;
        if n == 0 {
            break;
        }
        collected.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&collected);
        if text.contains(marker) {
            break;
        }
        if collected.len() > limit {
            return Err(QueryError::malformed("Response too large"));
        }
    }

    Ok(String::from_utf8_lossy(&collected).into_owned())
}

/// Bounds-checked reader over a response buffer. Every read that would run
/// past the end fails with `MalformedResponse` instead of truncating.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    pub fn position(&self) -> usize {
        self.offset
    }

    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.offset..]
    }

    pub fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8], QueryError> {
        if len > self.remaining() {
            return Err(QueryError::malformed(format!("Invalid {} data", what)));
        }
        let bytes = &self.data[self.offset..self.offset + len];
        self.offset += len;
        Ok(bytes)
    }

    pub fn skip(&mut self, len: usize, what: &str) -> Result<(), QueryError> {
        self.take(len, what).map(|_| ())
    }

    pub fn u8(&mut self, what: &str) -> Result<u8, QueryError> {
        Ok(self.take(1, what)?[0])
    }

    pub fn u16_le(&mut self, what: &str) -> Result<u16, QueryError> {
        let bytes = self.take(2, what)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn i32_le(&mut self, what: &str) -> Result<i32, QueryError> {
        let bytes = self.take(4, what)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// NUL-terminated string; a missing terminator is a malformed response.
    /// Invalid UTF-8 is replaced rather than rejected, game servers are sloppy.
    pub fn cstring(&mut self, what: &str) -> Result<String, QueryError> {
        let rest = self.rest();
        let end = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| QueryError::malformed(format!("Invalid {} data", what)))?;
        let value = String::from_utf8_lossy(&rest[..end]).into_owned();
        self.offset += end + 1;
        Ok(value)
    }

    pub fn expect(&mut self, expected: &[u8], what: &str) -> Result<(), QueryError> {
        let actual = self.take(expected.len(), what)?;
        if actual != expected {
            return Err(QueryError::malformed(format!("Invalid {}", what)));
        }
        Ok(())
    }
}
