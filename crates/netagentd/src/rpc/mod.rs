//! Transit daemon RPC surface.
//!
//! The reconciliation engine programs the dataplane through [`TransitRpc`],
//! a synchronous command/ack exchange. Handlers hold the trait object, so
//! tests swap in [`MockTransitClient`] without touching handler code.

mod client;
mod command;
mod mock;

pub use client::TransitClient;
pub use command::{RouteEntry, TransitCommand};
pub use mock::MockTransitClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Reply from the transit daemon to one command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitAck {
    /// Result code; see the associated constants.
    pub code: i32,
    /// Last applied entity version, present on version query replies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    /// Daemon-supplied detail for non-success codes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TransitAck {
    /// Command applied.
    pub const OK: i32 = 0;
    /// Command refused by policy or capacity.
    pub const REJECTED: i32 = 1;
    /// Entity unknown to the daemon.
    pub const NOT_FOUND: i32 = 2;
    /// Command not understood by this daemon build.
    pub const UNSUPPORTED: i32 = 3;

    /// Creates a success ack.
    pub fn ok() -> Self {
        TransitAck {
            code: Self::OK,
            version: None,
            message: None,
        }
    }

    /// Creates a success ack carrying a version.
    pub fn ok_with_version(version: u32) -> Self {
        TransitAck {
            code: Self::OK,
            version: Some(version),
            message: None,
        }
    }

    /// Creates a not-found ack.
    pub fn not_found() -> Self {
        TransitAck {
            code: Self::NOT_FOUND,
            version: None,
            message: None,
        }
    }

    /// Creates a rejection ack.
    pub fn rejected(message: impl Into<String>) -> Self {
        TransitAck {
            code: Self::REJECTED,
            version: None,
            message: Some(message.into()),
        }
    }

    /// Returns true for a success ack.
    pub fn is_ok(&self) -> bool {
        self.code == Self::OK
    }

    /// Returns true for a not-found ack.
    pub fn is_not_found(&self) -> bool {
        self.code == Self::NOT_FOUND
    }
}

/// Transport-level failures talking to the transit daemon.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Socket-level failure (bind, connect, send, receive).
    #[error("transit I/O failure: {0}")]
    Io(#[from] std::io::Error),

    /// No reply inside the configured per-call timeout.
    #[error("transit RPC timed out after {ms} ms")]
    Timeout { ms: u64 },

    /// Command or reply failed JSON encoding or decoding.
    #[error("transit codec failure: {0}")]
    Codec(#[from] serde_json::Error),

    /// Length-prefixed framing violated on a TCP exchange.
    #[error("bad transit frame: {message}")]
    Frame { message: String },
}

/// Synchronous command/ack exchange with the transit daemon.
///
/// One call is one round trip. There is no internal retry; the caller owns
/// the failure policy.
#[async_trait]
pub trait TransitRpc: Send + Sync {
    async fn send(&self, command: &TransitCommand) -> Result<TransitAck, TransportError>;
}
