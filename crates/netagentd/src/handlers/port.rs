//! Port goal state handler.
//!
//! A port becomes one endpoint programming command per fixed IP. The subnet
//! behind each fixed IP must travel in the same goal state; the controller
//! ships that context alongside ports, and the tunnel id of the endpoint
//! comes from it.

use super::{check_version, issue, issue_delete, recorded_version, EntityHandler, ReconcileContext};
use crate::error::{ReconcileError, ReconcileResult};
use crate::outcome::ApplyStatus;
use crate::rpc::{TransitCommand, TransitRpc};
use crate::types::{parse_ip, CidrBlock, MacAddress, TunnelId};
use async_trait::async_trait;
use netagent_goalstate::{EntityKind, OperationType, PortConfiguration};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Translates port states into transit endpoint commands.
pub struct PortHandler {
    rpc: Arc<dyn TransitRpc>,
}

impl PortHandler {
    pub fn new(rpc: Arc<dyn TransitRpc>) -> Self {
        Self { rpc }
    }

    #[instrument(skip(self, config, ctx), fields(id = %config.id))]
    async fn upsert(
        &self,
        op: OperationType,
        config: &PortConfiguration,
        ctx: &ReconcileContext<'_>,
    ) -> ReconcileResult<ApplyStatus> {
        let commands = translate(config, ctx)?;
        let gate = check_version(
            self.rpc.as_ref(),
            EntityKind::Port,
            &config.id,
            op,
            config.version,
        )
        .await?;
        if let Some(status) = gate {
            return Ok(status);
        }

        for command in &commands {
            issue(self.rpc.as_ref(), command).await?;
        }
        info!(
            version = config.version,
            endpoints = commands.len(),
            "port programmed"
        );
        Ok(ApplyStatus::Programmed {
            commands: commands.len(),
        })
    }

    /// Removal needs no subnet resolution; a delete must not be blocked by
    /// context the controller no longer sends.
    #[instrument(skip(self, config), fields(id = %config.id))]
    async fn remove(&self, config: &PortConfiguration) -> ReconcileResult<ApplyStatus> {
        let ips = config
            .fixed_ips
            .iter()
            .filter(|f| !f.ip_address.is_empty())
            .map(|f| f.ip_address.clone())
            .collect();
        let command = TransitCommand::DeleteEndpoint {
            port_id: config.id.clone(),
            ips,
        };
        if issue_delete(self.rpc.as_ref(), &command).await? {
            info!("port removed");
            Ok(ApplyStatus::Programmed { commands: 1 })
        } else {
            debug!("port already absent");
            Ok(ApplyStatus::Unchanged)
        }
    }

    async fn query(&self, config: &PortConfiguration) -> ReconcileResult<ApplyStatus> {
        let version = recorded_version(self.rpc.as_ref(), EntityKind::Port, &config.id).await?;
        debug!(id = %config.id, ?version, "port state fetched");
        Ok(ApplyStatus::Fetched)
    }
}

fn translate(
    config: &PortConfiguration,
    ctx: &ReconcileContext<'_>,
) -> ReconcileResult<Vec<TransitCommand>> {
    if config.fixed_ips.is_empty() {
        return Err(ReconcileError::validation(format!(
            "port {} carries no fixed ips",
            config.id
        )));
    }

    let mac = parse_mac(config)?;
    let host_ip: Option<IpAddr> = if config.host_ip.is_empty() {
        None
    } else {
        Some(parse_ip(&config.host_ip)?)
    };
    let veth = if config.veth_name.is_empty() {
        None
    } else {
        Some(config.veth_name.clone())
    };

    let mut commands = Vec::with_capacity(config.fixed_ips.len());
    for fixed_ip in &config.fixed_ips {
        if fixed_ip.subnet_id.is_empty() {
            return Err(ReconcileError::validation(format!(
                "port {} fixed ip {} carries no subnet id",
                config.id, fixed_ip.ip_address
            )));
        }
        let subnet = ctx.subnet(&fixed_ip.subnet_id).ok_or_else(|| {
            ReconcileError::validation(format!(
                "port {} references subnet {} not carried in this goal state",
                config.id, fixed_ip.subnet_id
            ))
        })?;

        let ip = parse_ip(&fixed_ip.ip_address)?;
        let subnet_cidr: CidrBlock = subnet.cidr.parse().map_err(|_| {
            ReconcileError::validation(format!(
                "subnet {} has an unusable cidr: {}",
                subnet.id, subnet.cidr
            ))
        })?;
        if !subnet_cidr.contains(ip) {
            return Err(ReconcileError::validation(format!(
                "port {} fixed ip {} is outside subnet {} ({})",
                config.id, ip, subnet.id, subnet_cidr
            )));
        }

        commands.push(TransitCommand::UpdateEndpoint {
            port_id: config.id.clone(),
            version: config.version,
            tunnel_id: TunnelId::from_wire(subnet.tunnel_id)?,
            ip,
            mac,
            veth: veth.clone(),
            host_ip,
            admin_state_up: config.admin_state_up,
        });
    }
    Ok(commands)
}

fn parse_mac(config: &PortConfiguration) -> ReconcileResult<Option<MacAddress>> {
    if config.mac_address.is_empty() {
        return Ok(None);
    }
    let mac: MacAddress = config.mac_address.parse()?;
    if mac.is_multicast() || mac.is_zero() {
        return Err(ReconcileError::validation(format!(
            "port {} mac {} is not a usable unicast address",
            config.id, mac
        )));
    }
    Ok(Some(mac))
}

#[async_trait]
impl EntityHandler for PortHandler {
    type Config = PortConfiguration;

    async fn apply(
        &self,
        op: OperationType,
        config: &PortConfiguration,
        ctx: &ReconcileContext<'_>,
    ) -> ReconcileResult<ApplyStatus> {
        match op {
            OperationType::Create | OperationType::Update => self.upsert(op, config, ctx).await,
            OperationType::CreateUpdateSwitch => Err(ReconcileError::validation(format!(
                "create_update_switch is not valid for port {}",
                config.id
            ))),
            OperationType::Delete => self.remove(config).await,
            OperationType::Get | OperationType::Info => self.query(config).await,
        }
    }
}
