//! Goal state wire schema and codec for the network control agent.
//!
//! A goal state is the declarative unit the network controller pushes to a
//! host: the desired VPC, subnet, and port entities, each tagged with the
//! operation to perform on it. This crate owns the wire schema (prost
//! messages) and the codec that turns raw bytes into a structurally valid
//! [`GoalState`]:
//!
//! - [`GoalState`], [`VpcState`], [`SubnetState`], [`PortState`]: message tree
//! - [`OperationType`], [`EntityKind`]: operation and kind tags
//! - [`decode`] / [`encode`]: datagram codec with structural validation

mod codec;
mod model;

pub use codec::{decode, decode_length_delimited, encode, encode_length_delimited, DecodeError};
pub use model::{
    AllowAddressPair, EntityKind, EntityState, ExtraDhcpOption, FixedIp, GoalState,
    OperationType, PortConfiguration, PortState, SecurityGroupId, SubnetConfiguration, SubnetId,
    SubnetState, TransitRouterIp, TransitSwitchIp, VpcConfiguration, VpcRoute, VpcState,
};
