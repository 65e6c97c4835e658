//! Commands the agent issues to the transit daemon.
//!
//! This is the agent side of the transit wire contract: JSON objects with a
//! `cmd` discriminator. Field values are the validated net types, so a
//! command that exists is a command that parses.

use crate::types::{CidrBlock, MacAddress, TunnelId};
use netagent_goalstate::EntityKind;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// One dataplane programming or query command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum TransitCommand {
    /// Program or refresh a VPC routing scope.
    UpdateVpc {
        id: String,
        version: u32,
        tunnel_id: Option<TunnelId>,
        cidr: CidrBlock,
        router_ips: Vec<IpAddr>,
        routes: Vec<RouteEntry>,
    },
    /// Remove a VPC.
    DeleteVpc { id: String },
    /// Program or refresh a subnet switching scope.
    UpdateSubnet {
        id: String,
        version: u32,
        tunnel_id: Option<TunnelId>,
        cidr: CidrBlock,
        switch_ips: Vec<IpAddr>,
    },
    /// Remove a subnet.
    DeleteSubnet { id: String },
    /// Program or refresh one endpoint address of a port.
    UpdateEndpoint {
        port_id: String,
        version: u32,
        tunnel_id: Option<TunnelId>,
        ip: IpAddr,
        mac: Option<MacAddress>,
        veth: Option<String>,
        host_ip: Option<IpAddr>,
        admin_state_up: bool,
    },
    /// Remove a port and its endpoint addresses.
    ///
    /// Addresses are passed through unvalidated; a delete must never be
    /// blocked by an unparsable hint.
    DeleteEndpoint { port_id: String, ips: Vec<String> },
    /// Read the version the daemon last applied for an entity.
    QueryVersion { kind: EntityKind, id: String },
}

impl TransitCommand {
    /// Wire name of the command, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            TransitCommand::UpdateVpc { .. } => "update_vpc",
            TransitCommand::DeleteVpc { .. } => "delete_vpc",
            TransitCommand::UpdateSubnet { .. } => "update_subnet",
            TransitCommand::DeleteSubnet { .. } => "delete_subnet",
            TransitCommand::UpdateEndpoint { .. } => "update_endpoint",
            TransitCommand::DeleteEndpoint { .. } => "delete_endpoint",
            TransitCommand::QueryVersion { .. } => "query_version",
        }
    }

    /// Id of the entity the command targets.
    pub fn target_id(&self) -> &str {
        match self {
            TransitCommand::UpdateVpc { id, .. }
            | TransitCommand::DeleteVpc { id }
            | TransitCommand::UpdateSubnet { id, .. }
            | TransitCommand::DeleteSubnet { id }
            | TransitCommand::QueryVersion { id, .. } => id,
            TransitCommand::UpdateEndpoint { port_id, .. }
            | TransitCommand::DeleteEndpoint { port_id, .. } => port_id,
        }
    }

    /// Returns true for commands that change dataplane state.
    ///
    /// Version queries are reads and never count as programming.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, TransitCommand::QueryVersion { .. })
    }
}

/// Static route entry inside an [`TransitCommand::UpdateVpc`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteEntry {
    pub destination: CidrBlock,
    pub next_hop: IpAddr,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_command_json_shape() {
        let cmd = TransitCommand::QueryVersion {
            kind: EntityKind::Port,
            id: "port-1".to_string(),
        };
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"cmd": "query_version", "kind": "port", "id": "port-1"})
        );
    }

    #[test]
    fn test_command_round_trip() {
        let cmd = TransitCommand::UpdateEndpoint {
            port_id: "port-1".to_string(),
            version: 2,
            tunnel_id: Some(TunnelId::new(22222).unwrap()),
            ip: "10.0.0.2".parse().unwrap(),
            mac: Some("fa:16:3e:d7:f2:6c".parse().unwrap()),
            veth: None,
            host_ip: None,
            admin_state_up: true,
        };
        let bytes = serde_json::to_vec(&cmd).unwrap();
        let back: TransitCommand = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back, cmd);
    }

    #[test]
    fn test_command_classification() {
        let query = TransitCommand::QueryVersion {
            kind: EntityKind::Vpc,
            id: "v".to_string(),
        };
        assert!(!query.is_mutation());
        assert_eq!(query.name(), "query_version");
        assert_eq!(query.target_id(), "v");

        let delete = TransitCommand::DeleteVpc {
            id: "v".to_string(),
        };
        assert!(delete.is_mutation());
        assert_eq!(delete.target_id(), "v");
    }
}
