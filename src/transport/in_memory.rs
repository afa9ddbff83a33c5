//! Channel-backed transport for tests and same-process games.

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::time::{timeout, Duration};

use super::{Inbound, NetworkError, Outbound};
use crate::protocol::Frame;

const DEFAULT_POLL: Duration = Duration::from_millis(100);

pub struct MemorySender<M> {
    tx: UnboundedSender<M>,
}

pub struct MemoryReceiver<M> {
    rx: UnboundedReceiver<M>,
    poll: Duration,
}

impl<M> MemoryReceiver<M> {
    pub fn with_poll(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }
}

/// One-directional link.
pub fn channel<M: Frame>() -> (MemorySender<M>, MemoryReceiver<M>) {
    let (tx, rx) = unbounded_channel();
    (MemorySender { tx }, MemoryReceiver { rx, poll: DEFAULT_POLL })
}

/// Both ends of a bidirectional link. `A` flows from the first end to the
/// second, `B` the other way.
#[allow(clippy::type_complexity)]
pub fn pair<A: Frame, B: Frame>() -> (
    (MemorySender<A>, MemoryReceiver<B>),
    (MemorySender<B>, MemoryReceiver<A>),
) {
    let (a_tx, a_rx) = channel::<A>();
    let (b_tx, b_rx) = channel::<B>();
    ((a_tx, b_rx), (b_tx, a_rx))
}

#[async_trait::async_trait]
impl<M: Frame> Outbound<M> for MemorySender<M> {
    async fn send(&mut self, msg: M) -> Result<(), NetworkError> {
        self.tx.send(msg).map_err(|_| NetworkError::Disconnected)
    }
}

#[async_trait::async_trait]
impl<M: Frame> Inbound<M> for MemoryReceiver<M> {
    async fn recv(&mut self) -> Result<M, NetworkError> {
        match timeout(self.poll, self.rx.recv()).await {
            Ok(Some(msg)) => Ok(msg),
            Ok(None) => Err(NetworkError::Disconnected),
            Err(_) => Err(NetworkError::Timeout),
        }
    }
}
