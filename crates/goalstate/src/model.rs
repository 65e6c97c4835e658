//! Goal state message schema.
//!
//! Hand-written prost bindings for the goal state message the network
//! controller pushes to hosts. Field numbers are part of the wire contract
//! and must not be reordered.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Operation requested for a single entity state.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    ::prost::Enumeration,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum OperationType {
    Create = 0,
    Update = 1,
    Get = 2,
    Delete = 3,
    Info = 4,
    /// Compound apply of VPC-scoped switch state (create or update as needed).
    CreateUpdateSwitch = 5,
}

impl OperationType {
    /// Returns true for the read-only operations (GET and INFO).
    pub fn is_query(self) -> bool {
        matches!(self, OperationType::Get | OperationType::Info)
    }

    /// Returns true for DELETE.
    pub fn is_delete(self) -> bool {
        self == OperationType::Delete
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationType::Create => "create",
            OperationType::Update => "update",
            OperationType::Get => "get",
            OperationType::Delete => "delete",
            OperationType::Info => "info",
            OperationType::CreateUpdateSwitch => "create_update_switch",
        };
        write!(f, "{name}")
    }
}

/// The closed set of entity kinds a goal state can carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Vpc,
    Subnet,
    Port,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Vpc => "vpc",
            EntityKind::Subnet => "subnet",
            EntityKind::Port => "port",
        };
        write!(f, "{name}")
    }
}

/// One declarative goal state message: the desired VPC, subnet, and port
/// entities for this host, each tagged with an operation.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GoalState {
    #[prost(message, repeated, tag = "1")]
    pub vpc_states: Vec<VpcState>,
    #[prost(message, repeated, tag = "2")]
    pub subnet_states: Vec<SubnetState>,
    #[prost(message, repeated, tag = "3")]
    pub port_states: Vec<PortState>,
}

impl GoalState {
    /// Total number of entity states across all kinds.
    pub fn entity_count(&self) -> usize {
        self.vpc_states.len() + self.subnet_states.len() + self.port_states.len()
    }

    /// Returns true when the message carries no entity states.
    pub fn is_empty(&self) -> bool {
        self.entity_count() == 0
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct VpcState {
    #[prost(enumeration = "OperationType", tag = "1")]
    pub operation_type: i32,
    #[prost(message, optional, tag = "2")]
    pub configuration: Option<VpcConfiguration>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SubnetState {
    #[prost(enumeration = "OperationType", tag = "1")]
    pub operation_type: i32,
    #[prost(message, optional, tag = "2")]
    pub configuration: Option<SubnetConfiguration>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PortState {
    #[prost(enumeration = "OperationType", tag = "1")]
    pub operation_type: i32,
    #[prost(message, optional, tag = "2")]
    pub configuration: Option<PortConfiguration>,
}

/// Desired state of one VPC.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct VpcConfiguration {
    #[prost(string, tag = "1")]
    pub id: String,
    /// Monotonic revision assigned by the controller; 0 means unset.
    #[prost(uint32, tag = "2")]
    pub version: u32,
    #[prost(string, tag = "3")]
    pub project_id: String,
    #[prost(string, tag = "4")]
    pub name: String,
    #[prost(string, tag = "5")]
    pub cidr: String,
    /// Overlay tunnel id; 0 means unassigned.
    #[prost(uint32, tag = "6")]
    pub tunnel_id: u32,
    #[prost(message, repeated, tag = "7")]
    pub subnet_ids: Vec<SubnetId>,
    #[prost(message, repeated, tag = "8")]
    pub routes: Vec<VpcRoute>,
    #[prost(message, repeated, tag = "9")]
    pub transit_router_ips: Vec<TransitRouterIp>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SubnetId {
    #[prost(string, tag = "1")]
    pub id: String,
}

/// Static route attached to a VPC routing table.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct VpcRoute {
    #[prost(string, tag = "1")]
    pub destination: String,
    #[prost(string, tag = "2")]
    pub next_hop: String,
}

/// Transit router endpoint serving a VPC.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TransitRouterIp {
    #[prost(string, tag = "1")]
    pub vpc_id: String,
    #[prost(string, tag = "2")]
    pub ip_address: String,
}

/// Desired state of one subnet.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SubnetConfiguration {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(uint32, tag = "2")]
    pub version: u32,
    #[prost(string, tag = "3")]
    pub project_id: String,
    #[prost(string, tag = "4")]
    pub vpc_id: String,
    #[prost(string, tag = "5")]
    pub name: String,
    #[prost(string, tag = "6")]
    pub cidr: String,
    /// Overlay tunnel id shared by the subnet's endpoints; 0 means unassigned.
    #[prost(uint32, tag = "7")]
    pub tunnel_id: u32,
    #[prost(message, repeated, tag = "8")]
    pub transit_switch_ips: Vec<TransitSwitchIp>,
}

/// Transit switch endpoint serving a subnet.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TransitSwitchIp {
    #[prost(string, tag = "1")]
    pub ip_address: String,
}

/// Desired state of one port (endpoint) on this host.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PortConfiguration {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(uint32, tag = "2")]
    pub version: u32,
    #[prost(string, tag = "3")]
    pub project_id: String,
    #[prost(string, tag = "4")]
    pub network_id: String,
    #[prost(string, tag = "5")]
    pub name: String,
    #[prost(bool, tag = "6")]
    pub admin_state_up: bool,
    #[prost(string, tag = "7")]
    pub mac_address: String,
    #[prost(string, tag = "8")]
    pub veth_name: String,
    #[prost(string, tag = "9")]
    pub host_ip: String,
    #[prost(message, repeated, tag = "10")]
    pub fixed_ips: Vec<FixedIp>,
    #[prost(message, repeated, tag = "11")]
    pub security_group_ids: Vec<SecurityGroupId>,
    #[prost(message, repeated, tag = "12")]
    pub allow_address_pairs: Vec<AllowAddressPair>,
    #[prost(message, repeated, tag = "13")]
    pub extra_dhcp_options: Vec<ExtraDhcpOption>,
}

/// IP assignment binding a port to a subnet.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FixedIp {
    #[prost(string, tag = "1")]
    pub ip_address: String,
    #[prost(string, tag = "2")]
    pub subnet_id: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SecurityGroupId {
    #[prost(string, tag = "1")]
    pub id: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AllowAddressPair {
    #[prost(string, tag = "1")]
    pub ip_address: String,
    #[prost(string, tag = "2")]
    pub mac_address: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ExtraDhcpOption {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub value: String,
}

/// Common shape of the three entity state families, letting the codec and
/// dispatcher treat them uniformly.
pub trait EntityState {
    /// Configuration payload carried by this state family.
    type Config;

    /// Kind tag used in diagnostics and dataplane commands.
    const KIND: EntityKind;

    /// Raw wire value of the operation field.
    fn operation_raw(&self) -> i32;

    /// Decoded operation, `None` when the wire value is unknown.
    fn operation(&self) -> Option<OperationType>;

    /// Configuration payload, if the state carries one.
    fn configuration(&self) -> Option<&Self::Config>;

    /// Entity id from the configuration, if present.
    fn entity_id(&self) -> Option<&str>;
}

impl EntityState for VpcState {
    type Config = VpcConfiguration;
    const KIND: EntityKind = EntityKind::Vpc;

    fn operation_raw(&self) -> i32 {
        self.operation_type
    }

    fn operation(&self) -> Option<OperationType> {
        OperationType::try_from(self.operation_type).ok()
    }

    fn configuration(&self) -> Option<&VpcConfiguration> {
        self.configuration.as_ref()
    }

    fn entity_id(&self) -> Option<&str> {
        self.configuration.as_ref().map(|c| c.id.as_str())
    }
}

impl EntityState for SubnetState {
    type Config = SubnetConfiguration;
    const KIND: EntityKind = EntityKind::Subnet;

    fn operation_raw(&self) -> i32 {
        self.operation_type
    }

    fn operation(&self) -> Option<OperationType> {
        OperationType::try_from(self.operation_type).ok()
    }

    fn configuration(&self) -> Option<&SubnetConfiguration> {
        self.configuration.as_ref()
    }

    fn entity_id(&self) -> Option<&str> {
        self.configuration.as_ref().map(|c| c.id.as_str())
    }
}

impl EntityState for PortState {
    type Config = PortConfiguration;
    const KIND: EntityKind = EntityKind::Port;

    fn operation_raw(&self) -> i32 {
        self.operation_type
    }

    fn operation(&self) -> Option<OperationType> {
        OperationType::try_from(self.operation_type).ok()
    }

    fn configuration(&self) -> Option<&PortConfiguration> {
        self.configuration.as_ref()
    }

    fn entity_id(&self) -> Option<&str> {
        self.configuration.as_ref().map(|c| c.id.as_str())
    }
}
