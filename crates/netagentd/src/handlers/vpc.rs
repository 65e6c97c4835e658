//! VPC goal state handler.

use super::{check_version, issue, issue_delete, recorded_version, EntityHandler, ReconcileContext};
use crate::error::{ReconcileError, ReconcileResult};
use crate::outcome::ApplyStatus;
use crate::rpc::{RouteEntry, TransitCommand, TransitRpc};
use crate::types::{parse_ip, CidrBlock, TunnelId};
use async_trait::async_trait;
use netagent_goalstate::{EntityKind, OperationType, VpcConfiguration};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Translates VPC states into transit routing scope commands.
pub struct VpcHandler {
    rpc: Arc<dyn TransitRpc>,
}

impl VpcHandler {
    pub fn new(rpc: Arc<dyn TransitRpc>) -> Self {
        Self { rpc }
    }

    #[instrument(skip(self, config), fields(id = %config.id))]
    async fn upsert(
        &self,
        op: OperationType,
        config: &VpcConfiguration,
    ) -> ReconcileResult<ApplyStatus> {
        let command = translate(config)?;
        let gate = check_version(
            self.rpc.as_ref(),
            EntityKind::Vpc,
            &config.id,
            op,
            config.version,
        )
        .await?;
        if let Some(status) = gate {
            return Ok(status);
        }

        issue(self.rpc.as_ref(), &command).await?;
        info!(version = config.version, "vpc programmed");
        Ok(ApplyStatus::Programmed { commands: 1 })
    }

    #[instrument(skip(self))]
    async fn remove(&self, id: &str) -> ReconcileResult<ApplyStatus> {
        let command = TransitCommand::DeleteVpc { id: id.to_string() };
        if issue_delete(self.rpc.as_ref(), &command).await? {
            info!("vpc removed");
            Ok(ApplyStatus::Programmed { commands: 1 })
        } else {
            debug!("vpc already absent");
            Ok(ApplyStatus::Unchanged)
        }
    }

    async fn query(&self, config: &VpcConfiguration) -> ReconcileResult<ApplyStatus> {
        let version = recorded_version(self.rpc.as_ref(), EntityKind::Vpc, &config.id).await?;
        debug!(id = %config.id, ?version, "vpc state fetched");
        Ok(ApplyStatus::Fetched)
    }
}

fn translate(config: &VpcConfiguration) -> ReconcileResult<TransitCommand> {
    if config.cidr.is_empty() {
        return Err(ReconcileError::validation(format!(
            "vpc {} carries no cidr",
            config.id
        )));
    }
    let cidr: CidrBlock = config.cidr.parse()?;
    let tunnel_id = TunnelId::from_wire(config.tunnel_id)?;

    let mut router_ips = Vec::with_capacity(config.transit_router_ips.len());
    for entry in &config.transit_router_ips {
        router_ips.push(parse_ip(&entry.ip_address)?);
    }

    let mut routes = Vec::with_capacity(config.routes.len());
    for route in &config.routes {
        routes.push(RouteEntry {
            destination: route.destination.parse()?,
            next_hop: parse_ip(&route.next_hop)?,
        });
    }

    Ok(TransitCommand::UpdateVpc {
        id: config.id.clone(),
        version: config.version,
        tunnel_id,
        cidr,
        router_ips,
        routes,
    })
}

#[async_trait]
impl EntityHandler for VpcHandler {
    type Config = VpcConfiguration;

    async fn apply(
        &self,
        op: OperationType,
        config: &VpcConfiguration,
        _ctx: &ReconcileContext<'_>,
    ) -> ReconcileResult<ApplyStatus> {
        match op {
            OperationType::Create | OperationType::Update | OperationType::CreateUpdateSwitch => {
                self.upsert(op, config).await
            }
            OperationType::Delete => self.remove(&config.id).await,
            OperationType::Get | OperationType::Info => self.query(config).await,
        }
    }
}
