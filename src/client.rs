//! Client side of the server variant.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::net::tcp::OwnedWriteHalf;
use tokio::task::JoinHandle;

use crate::common::lock;
use crate::config::NetConfig;
use crate::protocol::{Action, GameStateUpdate};
use crate::transport::tcp::{self, FrameWriter};
use crate::transport::{connect_with_retry, Inbound, NetworkError, Outbound};

/// What the front end polls once per frame.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClientStatus {
    pub connected: bool,
    /// Most recent snapshot from the server.
    pub latest: Option<GameStateUpdate>,
    pub message: String,
}

pub struct Client {
    writer: FrameWriter<Action, OwnedWriteHalf>,
    status: Arc<Mutex<ClientStatus>>,
    shutdown: Arc<AtomicBool>,
    receiver: Option<JoinHandle<()>>,
}

impl Client {
    pub async fn connect(addr: SocketAddr, net: NetConfig) -> Result<Self, NetworkError> {
        let stream = connect_with_retry(addr, net.connect_attempts, net.retry_backoff).await?;
        let (mut reader, writer) = tcp::split::<GameStateUpdate, Action>(stream, &net);
        let status = Arc::new(Mutex::new(ClientStatus {
            connected: true,
            latest: None,
            message: format!("connected to {}", addr),
        }));
        let shutdown = Arc::new(AtomicBool::new(false));

        let task_status = Arc::clone(&status);
        let task_shutdown = Arc::clone(&shutdown);
        let receiver = tokio::spawn(async move {
            while !task_shutdown.load(Ordering::SeqCst) {
                match reader.recv().await {
                    Ok(update) => lock(&task_status).latest = Some(update),
                    Err(NetworkError::Timeout) => continue,
                    Err(e) if !e.is_fatal() => log::warn!("dropping server message: {}", e),
                    Err(e) => {
                        log::warn!("lost server connection: {}", e);
                        let mut status = lock(&task_status);
                        status.connected = false;
                        status.latest = None;
                        status.message = format!("disconnected: {}", e);
                        return;
                    }
                }
            }
        });

        Ok(Self {
            writer,
            status,
            shutdown,
            receiver: Some(receiver),
        })
    }

    pub async fn send(&mut self, action: Action) -> Result<(), NetworkError> {
        if !lock(&self.status).connected {
            return Err(NetworkError::Disconnected);
        }
        let result = self.writer.send(action).await;
        if let Err(e) = &result {
            if e.is_fatal() {
                let mut status = lock(&self.status);
                status.connected = false;
                status.message = format!("disconnected: {}", e);
            }
        }
        result
    }

    pub fn status(&self) -> ClientStatus {
        lock(&self.status).clone()
    }

    pub fn latest(&self) -> Option<GameStateUpdate> {
        lock(&self.status).latest.clone()
    }

    /// Stop the receiver and close the connection.
    pub async fn shutdown(mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.receiver.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}
