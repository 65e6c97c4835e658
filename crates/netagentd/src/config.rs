//! Agent process configuration.
//!
//! Settings are fixed at startup; the reconciliation engine never mutates
//! them. Defaults target a transit daemon on the local host.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

/// Default transit daemon RPC port.
pub const DEFAULT_TRANSIT_PORT: u16 = 9075;

/// Default goal state listen port.
pub const DEFAULT_LISTEN_PORT: u16 = 9074;

/// Default per-call RPC timeout.
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_millis(3000);

/// Transport used for transit daemon RPC exchanges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransitProtocol {
    #[default]
    Udp,
    Tcp,
}

/// Parse failure for a transit protocol name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown transit protocol: {0} (expected udp or tcp)")]
pub struct ProtocolParseError(String);

impl FromStr for TransitProtocol {
    type Err = ProtocolParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "udp" => Ok(TransitProtocol::Udp),
            "tcp" => Ok(TransitProtocol::Tcp),
            _ => Err(ProtocolParseError(s.to_string())),
        }
    }
}

impl fmt::Display for TransitProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransitProtocol::Udp => "udp",
            TransitProtocol::Tcp => "tcp",
        };
        write!(f, "{name}")
    }
}

/// Agent configuration resolved from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    /// Transit daemon RPC endpoint.
    pub transit_server: SocketAddr,
    /// Transport for transit RPC exchanges.
    pub transit_protocol: TransitProtocol,
    /// Per-call RPC timeout.
    pub rpc_timeout: Duration,
    /// Endpoint goal state messages arrive on.
    pub listen: SocketAddr,
    /// Verbose logging.
    pub debug: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        let loopback = IpAddr::V4(Ipv4Addr::LOCALHOST);
        Self {
            transit_server: SocketAddr::new(loopback, DEFAULT_TRANSIT_PORT),
            transit_protocol: TransitProtocol::default(),
            rpc_timeout: DEFAULT_RPC_TIMEOUT,
            listen: SocketAddr::new(loopback, DEFAULT_LISTEN_PORT),
            debug: false,
        }
    }
}

impl AgentConfig {
    /// Creates a configuration with localhost defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the transit daemon endpoint.
    pub fn with_transit_server(mut self, server: SocketAddr) -> Self {
        self.transit_server = server;
        self
    }

    /// Sets the transit RPC transport.
    pub fn with_protocol(mut self, protocol: TransitProtocol) -> Self {
        self.transit_protocol = protocol;
        self
    }

    /// Sets the per-call RPC timeout.
    pub fn with_rpc_timeout(mut self, timeout: Duration) -> Self {
        self.rpc_timeout = timeout;
        self
    }

    /// Sets the goal state listen endpoint.
    pub fn with_listen(mut self, listen: SocketAddr) -> Self {
        self.listen = listen;
        self
    }

    /// Enables verbose logging.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}
