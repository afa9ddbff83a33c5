//! Newline-delimited framing: one encoded message per line.

use std::marker::PhantomData;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};

use super::{Inbound, NetworkError, Outbound, SEND_TIMEOUT};
use crate::config::NetConfig;
use crate::protocol::Frame;

const CHUNK: usize = 4096;

/// Reassembles lines from a byte stream.
pub struct LineReader<M, R = OwnedReadHalf> {
    inner: R,
    buf: Vec<u8>,
    recv_timeout: Duration,
    max_line: usize,
    _msg: PhantomData<fn() -> M>,
}

impl<M: Frame, R: AsyncRead + Unpin + Send> LineReader<M, R> {
    pub fn new(inner: R, recv_timeout: Duration, max_line: usize) -> Self {
        Self {
            inner,
            buf: Vec::new(),
            recv_timeout,
            max_line,
            _msg: PhantomData,
        }
    }

    /// Next complete non-blank line, without the terminator.
    fn take_line(&mut self) -> Option<Vec<u8>> {
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if !line.iter().all(u8::is_ascii_whitespace) {
                return Some(line);
            }
        }
        None
    }

    async fn next_message(&mut self) -> Result<M, NetworkError> {
        loop {
            if let Some(line) = self.take_line() {
                return Ok(M::decode(&line)?);
            }
            if self.buf.len() > self.max_line {
                let len = self.buf.len();
                self.buf.clear();
                return Err(NetworkError::FrameTooLarge {
                    len,
                    max: self.max_line as u32,
                });
            }
            let mut chunk = [0u8; CHUNK];
            let n = self.inner.read(&mut chunk).await?;
            if n == 0 {
                return Err(NetworkError::Disconnected);
            }
            self.buf.extend_from_slice(&chunk[..n]);
        }
    }
}

#[async_trait::async_trait]
impl<M: Frame, R: AsyncRead + Unpin + Send> Inbound<M> for LineReader<M, R> {
    async fn recv(&mut self) -> Result<M, NetworkError> {
        // `read` is cancel safe and buffered bytes live in `self`, so a
        // timeout never loses part of a line.
        match timeout(self.recv_timeout, self.next_message()).await {
            Ok(res) => res,
            Err(_) => Err(NetworkError::Timeout),
        }
    }
}

/// Writes each message followed by `\n`.
pub struct LineWriter<M, W = OwnedWriteHalf> {
    inner: W,
    _msg: PhantomData<fn(M)>,
}

impl<M: Frame, W: AsyncWrite + Unpin + Send> LineWriter<M, W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            _msg: PhantomData,
        }
    }
}

#[async_trait::async_trait]
impl<M: Frame, W: AsyncWrite + Unpin + Send> Outbound<M> for LineWriter<M, W> {
    async fn send(&mut self, msg: M) -> Result<(), NetworkError> {
        let mut data = msg.encode()?;
        data.push(b'\n');
        let write = async {
            self.inner.write_all(&data).await?;
            self.inner.flush().await?;
            Ok::<(), NetworkError>(())
        };
        timeout(SEND_TIMEOUT, write).await.map_err(|_| NetworkError::Timeout)?
    }
}

/// Split a TCP stream into line-framed halves.
pub fn split<In: Frame, Out: Frame>(
    stream: TcpStream,
    config: &NetConfig,
) -> (LineReader<In>, LineWriter<Out>) {
    let (read, write) = stream.into_split();
    (
        LineReader::new(read, config.recv_timeout, config.max_frame_size as usize),
        LineWriter::new(write),
    )
}
