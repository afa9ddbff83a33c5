//! Length-prefixed framing: a 4-byte big-endian length, then the body.

use std::marker::PhantomData;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};

use super::{Inbound, NetworkError, Outbound, SEND_TIMEOUT};
use crate::config::NetConfig;
use crate::protocol::{Frame, ProtocolError};

const HEADER: usize = 4;

pub struct FrameReader<M, R = OwnedReadHalf> {
    stream: R,
    buf: Vec<u8>,
    recv_timeout: Duration,
    max_frame: u32,
    _msg: PhantomData<fn() -> M>,
}

impl<M: Frame, R: AsyncRead + Unpin + Send> FrameReader<M, R> {
    pub fn new(stream: R, recv_timeout: Duration, max_frame: u32) -> Self {
        Self {
            stream,
            buf: Vec::with_capacity(1024),
            recv_timeout,
            max_frame,
            _msg: PhantomData,
        }
    }

    /// Pops a complete frame body off the buffer if one has arrived.
    fn take_frame(&mut self) -> Result<Option<Vec<u8>>, NetworkError> {
        if self.buf.len() < HEADER {
            return Ok(None);
        }
        let len = u32::from_be_bytes([self.buf[0], self.buf[1], self.buf[2], self.buf[3]]);
        if len == 0 {
            self.buf.drain(..HEADER);
            return Err(ProtocolError::Malformed("zero-length frame".into()).into());
        }
        if len > self.max_frame {
            // The stream cannot be resynchronised after this.
            self.buf.clear();
            return Err(NetworkError::FrameTooLarge {
                len: len as usize,
                max: self.max_frame,
            });
        }
        let end = HEADER + len as usize;
        if self.buf.len() < end {
            return Ok(None);
        }
        let body = self.buf[HEADER..end].to_vec();
        self.buf.drain(..end);
        Ok(Some(body))
    }

    async fn next_message(&mut self) -> Result<M, NetworkError> {
        loop {
            if let Some(body) = self.take_frame()? {
                return Ok(M::decode(&body)?);
            }
            let mut chunk = [0u8; 4096];
            let n = self.stream.read(&mut chunk).await?;
            if n == 0 {
                return Err(NetworkError::Disconnected);
            }
            self.buf.extend_from_slice(&chunk[..n]);
        }
    }
}

#[async_trait::async_trait]
impl<M: Frame, R: AsyncRead + Unpin + Send> Inbound<M> for FrameReader<M, R> {
    async fn recv(&mut self) -> Result<M, NetworkError> {
        match timeout(self.recv_timeout, self.next_message()).await {
            Ok(res) => res,
            Err(_) => Err(NetworkError::Timeout),
        }
    }
}

pub struct FrameWriter<M, W = OwnedWriteHalf> {
    stream: W,
    max_frame: u32,
    _msg: PhantomData<fn(M)>,
}

impl<M: Frame, W: AsyncWrite + Unpin + Send> FrameWriter<M, W> {
    pub fn new(stream: W, max_frame: u32) -> Self {
        Self {
            stream,
            max_frame,
            _msg: PhantomData,
        }
    }
}

#[async_trait::async_trait]
impl<M: Frame, W: AsyncWrite + Unpin + Send> Outbound<M> for FrameWriter<M, W> {
    async fn send(&mut self, msg: M) -> Result<(), NetworkError> {
        let body = msg.encode()?;
        if body.len() > self.max_frame as usize {
            return Err(NetworkError::FrameTooLarge {
                len: body.len(),
                max: self.max_frame,
            });
        }
        let mut data = Vec::with_capacity(HEADER + body.len());
        data.extend_from_slice(&(body.len() as u32).to_be_bytes());
        data.extend_from_slice(&body);
        let write = async {
            self.stream.write_all(&data).await?;
            self.stream.flush().await?;
            Ok::<(), NetworkError>(())
        };
        timeout(SEND_TIMEOUT, write).await.map_err(|_| NetworkError::Timeout)?
    }
}

/// Split a TCP stream into length-prefixed halves.
pub fn split<In: Frame, Out: Frame>(
    stream: TcpStream,
    config: &NetConfig,
) -> (FrameReader<In>, FrameWriter<Out>) {
    let (read, write) = stream.into_split();
    (
        FrameReader::new(read, config.recv_timeout, config.max_frame_size),
        FrameWriter::new(write, config.max_frame_size),
    )
}
