//! Error types for reconciliation.
//!
//! A [`ReconcileError`] is the per-entity failure cause recorded in the
//! aggregate result; it is `Clone` because the same value lands in both the
//! outcome list and the log stream.

use crate::rpc::TransportError;
use crate::types::ParseError;
use thiserror::Error;

/// Result type alias for handler operations.
pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// Why applying one entity state failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    /// The configuration is semantically invalid (bad field value, dangling
    /// reference, wrong operation for the kind).
    #[error("validation failed: {message}")]
    Validation {
        /// What was wrong.
        message: String,
    },

    /// The dataplane already holds a newer revision of this entity.
    #[error("stale version: proposed {proposed}, dataplane has {current}")]
    StaleVersion {
        /// Version carried by the goal state.
        proposed: u32,
        /// Version the dataplane reported.
        current: u32,
    },

    /// The transit daemon could not be reached or did not answer in time.
    #[error("transport failure: {message}")]
    Transport {
        /// Flattened transport error.
        message: String,
    },

    /// The transit daemon answered with a non-success code.
    #[error("dataplane rejected command (code {code}): {message}")]
    DataplaneRejected {
        /// Ack code returned by the daemon.
        code: i32,
        /// Daemon-supplied detail, if any.
        message: String,
    },

    /// Shutdown began before this entity was dispatched.
    #[error("reconciliation cancelled before dispatch")]
    Cancelled,
}

impl ReconcileError {
    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a stale version error.
    pub fn stale_version(proposed: u32, current: u32) -> Self {
        Self::StaleVersion { proposed, current }
    }

    /// Creates a transport error from a flattened message.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates a dataplane rejection error.
    pub fn rejected(code: i32, message: impl Into<String>) -> Self {
        Self::DataplaneRejected {
            code,
            message: message.into(),
        }
    }

    /// Returns true if resending the same goal state may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ReconcileError::Transport { .. } | ReconcileError::Cancelled
        )
    }
}

impl From<ParseError> for ReconcileError {
    fn from(e: ParseError) -> Self {
        ReconcileError::validation(e.to_string())
    }
}

impl From<TransportError> for ReconcileError {
    fn from(e: TransportError) -> Self {
        ReconcileError::transport(e.to_string())
    }
}
