//! netagentd - network control agent daemon
//!
//! Receives declarative goal states (desired VPC, subnet, and port entities
//! for this host) from the network controller and reconciles the local
//! dataplane to match, by issuing commands to the transit daemon that owns
//! packet forwarding.
//!
//! The crate is organized around the reconciliation engine:
//!
//! - [`dispatch::Reconciler`]: orders and dispatches one goal state's entity
//!   states, collecting every outcome into an [`outcome::AggregateResult`]
//! - [`handlers`]: per-kind translation of configurations into transit
//!   commands, with version-gated idempotence
//! - [`rpc`]: the transit daemon command/ack exchange (UDP or TCP) and its
//!   in-memory test double
//! - [`server`]: the UDP shell that feeds received goal states into the
//!   reconciler and answers with a JSON summary

pub mod config;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod outcome;
pub mod rpc;
pub mod server;
pub mod types;

pub use config::{AgentConfig, TransitProtocol};
pub use dispatch::{ReconcileStats, Reconciler};
pub use error::{ReconcileError, ReconcileResult};
pub use outcome::{AggregateResult, AggregateStatus, ApplyStatus, EntityOutcome};
pub use server::GoalStateServer;
pub use types::{CidrBlock, MacAddress, ParseError, TunnelId};
