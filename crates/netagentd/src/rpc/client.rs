//! Transit daemon RPC client.

use super::{TransitAck, TransitCommand, TransitRpc, TransportError};
use crate::config::{AgentConfig, TransitProtocol};
use async_trait::async_trait;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tracing::{debug, instrument};

/// Upper bound for one reply, datagram or framed.
const MAX_REPLY_BYTES: u32 = 64 * 1024;

/// Connects to the transit daemon configured at startup.
///
/// Every call is a self-contained round trip: UDP binds a fresh socket and
/// exchanges one datagram each way, TCP opens a connection and exchanges one
/// length-prefixed frame each way. The per-call timeout covers the whole
/// exchange, and there is no retry. Calls hold no shared state, so
/// concurrent callers are fine.
pub struct TransitClient {
    server: SocketAddr,
    protocol: TransitProtocol,
    timeout: Duration,
}

impl TransitClient {
    /// Creates a client for the given endpoint and transport.
    pub fn new(server: SocketAddr, protocol: TransitProtocol, timeout: Duration) -> Self {
        Self {
            server,
            protocol,
            timeout,
        }
    }

    /// Creates a client from the agent configuration.
    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(
            config.transit_server,
            config.transit_protocol,
            config.rpc_timeout,
        )
    }

    async fn exchange(&self, payload: &[u8]) -> Result<Vec<u8>, TransportError> {
        match self.protocol {
            TransitProtocol::Udp => self.exchange_udp(payload).await,
            TransitProtocol::Tcp => self.exchange_tcp(payload).await,
        }
    }

    async fn exchange_udp(&self, payload: &[u8]) -> Result<Vec<u8>, TransportError> {
        let bind_ip = match self.server {
            SocketAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            SocketAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        };
        let socket = UdpSocket::bind(SocketAddr::new(bind_ip, 0)).await?;
        socket.connect(self.server).await?;
        socket.send(payload).await?;

        let mut buf = vec![0u8; MAX_REPLY_BYTES as usize];
        let n = socket.recv(&mut buf).await?;
        buf.truncate(n);
        Ok(buf)
    }

    async fn exchange_tcp(&self, payload: &[u8]) -> Result<Vec<u8>, TransportError> {
        let mut stream = TcpStream::connect(self.server).await?;

        let len = u32::try_from(payload.len()).map_err(|_| TransportError::Frame {
            message: format!("command too large: {} bytes", payload.len()),
        })?;
        stream.write_u32(len).await?;
        stream.write_all(payload).await?;
        stream.flush().await?;

        let reply_len = stream.read_u32().await?;
        if reply_len > MAX_REPLY_BYTES {
            return Err(TransportError::Frame {
                message: format!("oversized reply: {reply_len} bytes"),
            });
        }
        let mut buf = vec![0u8; reply_len as usize];
        stream.read_exact(&mut buf).await?;
        Ok(buf)
    }
}

#[async_trait]
impl TransitRpc for TransitClient {
    #[instrument(skip(self, command), fields(cmd = command.name(), target = command.target_id(), server = %self.server))]
    async fn send(&self, command: &TransitCommand) -> Result<TransitAck, TransportError> {
        let payload = serde_json::to_vec(command)?;

        let reply = tokio::time::timeout(self.timeout, self.exchange(&payload))
            .await
            .map_err(|_| TransportError::Timeout {
                ms: self.timeout.as_millis() as u64,
            })??;

        let ack: TransitAck = serde_json::from_slice(&reply)?;
        debug!(code = ack.code, "transit ack");
        Ok(ack)
    }
}
