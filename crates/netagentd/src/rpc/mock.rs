//! In-memory transit daemon double.
//!
//! Records every command and simulates daemon-side version bookkeeping, so
//! handler and dispatcher tests can assert exactly what was issued. Public
//! rather than test-gated because the integration suites build reconcilers
//! against it.

use super::{TransitAck, TransitCommand, TransitRpc, TransportError};
use async_trait::async_trait;
use netagent_goalstate::EntityKind;
use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::Mutex;

#[derive(Default)]
struct MockInner {
    sent: Vec<TransitCommand>,
    versions: HashMap<(EntityKind, String), u32>,
    offline: bool,
    reject_ids: HashSet<String>,
}

/// Test double for the transit daemon.
#[derive(Default)]
pub struct MockTransitClient {
    inner: Mutex<MockInner>,
}

impl MockTransitClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seeds the daemon-side version of an entity.
    pub fn set_version(&self, kind: EntityKind, id: &str, version: u32) {
        self.inner
            .lock()
            .unwrap()
            .versions
            .insert((kind, id.to_string()), version);
    }

    /// Simulates the daemon being unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.inner.lock().unwrap().offline = offline;
    }

    /// Makes every mutation targeting `id` come back rejected.
    pub fn reject_id(&self, id: &str) {
        self.inner.lock().unwrap().reject_ids.insert(id.to_string());
    }

    /// All commands received, in order.
    pub fn sent(&self) -> Vec<TransitCommand> {
        self.inner.lock().unwrap().sent.clone()
    }

    /// Wire names of all commands received, in order.
    pub fn sent_names(&self) -> Vec<&'static str> {
        self.inner.lock().unwrap().sent.iter().map(|c| c.name()).collect()
    }

    /// Number of state-changing commands received.
    pub fn mutation_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap()
            .sent
            .iter()
            .filter(|c| c.is_mutation())
            .count()
    }

    /// Version the simulated daemon currently holds for an entity.
    pub fn version_of(&self, kind: EntityKind, id: &str) -> Option<u32> {
        self.inner
            .lock()
            .unwrap()
            .versions
            .get(&(kind, id.to_string()))
            .copied()
    }
}

fn command_kind(command: &TransitCommand) -> EntityKind {
    match command {
        TransitCommand::UpdateVpc { .. } | TransitCommand::DeleteVpc { .. } => EntityKind::Vpc,
        TransitCommand::UpdateSubnet { .. } | TransitCommand::DeleteSubnet { .. } => {
            EntityKind::Subnet
        }
        TransitCommand::UpdateEndpoint { .. } | TransitCommand::DeleteEndpoint { .. } => {
            EntityKind::Port
        }
        TransitCommand::QueryVersion { kind, .. } => *kind,
    }
}

#[async_trait]
impl TransitRpc for MockTransitClient {
    async fn send(&self, command: &TransitCommand) -> Result<TransitAck, TransportError> {
        let mut inner = self.inner.lock().unwrap();

        if inner.offline {
            return Err(TransportError::Io(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "transit daemon offline",
            )));
        }

        inner.sent.push(command.clone());

        if command.is_mutation() && inner.reject_ids.contains(command.target_id()) {
            return Ok(TransitAck::rejected("rejected by test fixture"));
        }

        let kind = command_kind(command);
        let key = (kind, command.target_id().to_string());
        match command {
            TransitCommand::QueryVersion { .. } => match inner.versions.get(&key) {
                Some(v) => Ok(TransitAck::ok_with_version(*v)),
                None => Ok(TransitAck::not_found()),
            },
            TransitCommand::UpdateVpc { version, .. }
            | TransitCommand::UpdateSubnet { version, .. }
            | TransitCommand::UpdateEndpoint { version, .. } => {
                inner.versions.insert(key, *version);
                Ok(TransitAck::ok())
            }
            TransitCommand::DeleteVpc { .. }
            | TransitCommand::DeleteSubnet { .. }
            | TransitCommand::DeleteEndpoint { .. } => {
                if inner.versions.remove(&key).is_some() {
                    Ok(TransitAck::ok())
                } else {
                    Ok(TransitAck::not_found())
                }
            }
        }
    }
}
