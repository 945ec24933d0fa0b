use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use log::trace;
use tokio::net::UdpSocket;
use tokio::sync::RwLock;

/// Read-only list of receiver endpoints, shared between the sender and
/// whatever provisions it (static configuration or the refresh loop).
#[derive(Clone, Default)]
pub struct Targets {
    inner: Arc<RwLock<Vec<SocketAddr>>>,
}

impl Targets {
    pub fn new(addrs: Vec<SocketAddr>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(addrs)),
        }
    }

    pub async fn replace(&self, addrs: Vec<SocketAddr>) {
        *self.inner.write().await = addrs;
    }

    pub async fn all(&self) -> Vec<SocketAddr> {
        self.inner.read().await.clone()
    }

    pub async fn has_targets(&self) -> bool {
        !self.inner.read().await.is_empty()
    }
}

/// Fire-and-forget UDP sender for WLED realtime frames.
pub struct WledSender {
    socket: UdpSocket,
    targets: Targets,
}

impl WledSender {
    /// Bind an ephemeral local socket with broadcast enabled.
    pub async fn bind(targets: Targets) -> io::Result<Self> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
        socket.set_broadcast(true)?;
        Ok(Self { socket, targets })
    }

    pub fn targets(&self) -> &Targets {
        &self.targets
    }

    /// Send one frame to every known target. The first send error is
    /// returned after all targets have been attempted.
    pub async fn send(&self, frame: &[u8]) -> io::Result<()> {
        let targets = self.targets.all().await;
        let mut first_error = None;
        for target in &targets {
            match self.socket.send_to(frame, target).await {
                Ok(sent) => trace!("sent {sent} bytes to {target}"),
                Err(err) => {
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
