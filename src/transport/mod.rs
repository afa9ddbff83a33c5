//! Message transports.
//!
//! A connection is split into an [`Inbound`] half, drained by one background
//! receiver task, and an [`Outbound`] half used by whoever needs to send.
//! Every `recv` gives up after the transport's poll interval with
//! [`NetworkError::Timeout`] so receiver loops can notice shutdown requests;
//! partially received data stays buffered across timeouts.

use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};

use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::time::{sleep, Duration};

use crate::protocol::{Frame, ProtocolError};

pub mod in_memory;
pub mod json_lines;
pub mod tcp;

/// Bound on a single write.
pub(crate) const SEND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("no message within the receive window")]
    Timeout,
    #[error("connection closed by peer")]
    Disconnected,
    #[error("connection refused after {attempts} attempts")]
    Refused { attempts: u32 },
    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: u32 },
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("i/o error: {0}")]
    Io(std::io::Error),
}

impl NetworkError {
    /// Errors after which the connection cannot be used any more. A message
    /// of an unknown type is skipped; a malformed one ends the connection.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            NetworkError::Timeout | NetworkError::Protocol(ProtocolError::UnknownType(_))
        )
    }
}

impl From<std::io::Error> for NetworkError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            ErrorKind::UnexpectedEof
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe => NetworkError::Disconnected,
            ErrorKind::TimedOut | ErrorKind::WouldBlock => NetworkError::Timeout,
            _ => NetworkError::Io(e),
        }
    }
}

/// Sending half of a connection.
#[async_trait::async_trait]
pub trait Outbound<M: Frame>: Send {
    async fn send(&mut self, msg: M) -> Result<(), NetworkError>;
}

/// Receiving half of a connection.
#[async_trait::async_trait]
pub trait Inbound<M: Frame>: Send {
    async fn recv(&mut self) -> Result<M, NetworkError>;
}

#[async_trait::async_trait]
impl<M: Frame> Outbound<M> for Box<dyn Outbound<M>> {
    async fn send(&mut self, msg: M) -> Result<(), NetworkError> {
        (**self).send(msg).await
    }
}

#[async_trait::async_trait]
impl<M: Frame> Inbound<M> for Box<dyn Inbound<M>> {
    async fn recv(&mut self) -> Result<M, NetworkError> {
        (**self).recv().await
    }
}

/// Connect to `addr`, retrying a bounded number of times with a fixed pause.
pub async fn connect_with_retry<A>(addr: A, attempts: u32, backoff: Duration) -> Result<TcpStream, NetworkError>
where
    A: ToSocketAddrs + Clone + std::fmt::Debug,
{
    let attempts = attempts.max(1);
    for attempt in 1..=attempts {
        match TcpStream::connect(addr.clone()).await {
            Ok(stream) => {
                let _ = stream.set_nodelay(true);
                log::info!("connected to {:?} on attempt {}", addr, attempt);
                return Ok(stream);
            }
            Err(e) => {
                log::warn!("connect to {:?} failed (attempt {}/{}): {}", addr, attempt, attempts, e);
                if attempt < attempts {
                    sleep(backoff).await;
                }
            }
        }
    }
    Err(NetworkError::Refused { attempts })
}

/// The address other machines should use to reach a listener on `port`:
/// the local IP of the interface that routes outward, or loopback when
/// there is none. No packet is sent.
pub fn advertised_addr(port: u16) -> SocketAddr {
    let ip = UdpSocket::bind(("0.0.0.0", 0))
        .and_then(|sock| {
            sock.connect(("8.8.8.8", 80))?;
            sock.local_addr()
        })
        .map(|a| a.ip())
        .ok()
        .filter(|ip| !ip.is_unspecified())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));
    SocketAddr::new(ip, port)
}
