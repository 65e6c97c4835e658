//! Goal state inbound shell.
//!
//! One UDP datagram carries one encoded goal state. The server decodes it,
//! runs the reconciler, and answers the sender with the JSON summary of the
//! aggregate result. The loop stops on cancellation; a goal state already
//! being applied finishes its in-flight work first.

use crate::config::AgentConfig;
use crate::dispatch::Reconciler;
use crate::rpc::{TransitClient, TransitRpc};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Largest goal state datagram accepted.
const MAX_DATAGRAM_BYTES: usize = 64 * 1024;

/// UDP server feeding goal states into a [`Reconciler`].
pub struct GoalStateServer {
    socket: UdpSocket,
    reconciler: Reconciler,
    cancel: CancellationToken,
}

impl GoalStateServer {
    /// Binds the listen socket and wires a real transit client from config.
    pub async fn bind(config: &AgentConfig, cancel: CancellationToken) -> io::Result<Self> {
        let rpc: Arc<dyn TransitRpc> = Arc::new(TransitClient::from_config(config));
        let server = Self::bind_with_rpc(config.listen, rpc, cancel).await?;
        info!(
            listen = %server.local_addr()?,
            transit = %config.transit_server,
            protocol = %config.transit_protocol,
            "goal state server ready"
        );
        Ok(server)
    }

    /// Binds the listen socket around an injected transit client.
    pub async fn bind_with_rpc(
        listen: SocketAddr,
        rpc: Arc<dyn TransitRpc>,
        cancel: CancellationToken,
    ) -> io::Result<Self> {
        let socket = UdpSocket::bind(listen).await?;
        let reconciler = Reconciler::with_cancellation(rpc, cancel.clone());
        Ok(Self {
            socket,
            reconciler,
            cancel,
        })
    }

    /// Address the server actually bound (relevant when listening on port 0).
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Receives and applies goal states until cancelled.
    ///
    /// # Errors
    ///
    /// Returns the socket error if receiving fails; per-message decode and
    /// reconcile failures are answered to the sender, not returned.
    pub async fn run(&mut self) -> io::Result<()> {
        let mut buf = vec![0u8; MAX_DATAGRAM_BYTES];
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!(stats = ?self.reconciler.stats(), "goal state server stopping");
                    return Ok(());
                }
                received = self.socket.recv_from(&mut buf) => {
                    let (len, peer) = received?;
                    self.handle_datagram(&buf[..len], peer).await;
                }
            }
        }
    }

    async fn handle_datagram(&mut self, datagram: &[u8], peer: SocketAddr) {
        debug!(%peer, bytes = datagram.len(), "goal state received");

        let reply = match self.reconciler.apply_buffer(datagram).await {
            Ok(result) => result.summary_json(),
            Err(e) => {
                // Nothing was dispatched; the sender learns why.
                warn!(%peer, error = %e, "goal state rejected");
                serde_json::json!({
                    "status": "hard_failure",
                    "error": e.to_string(),
                })
            }
        };

        // The reply is best effort; the sender may already be gone.
        if let Err(e) = self.socket.send_to(reply.to_string().as_bytes(), peer).await {
            warn!(%peer, error = %e, "failed to send goal state summary");
        }
    }
}
