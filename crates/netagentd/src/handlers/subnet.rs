//! Subnet goal state handler.

use super::{check_version, issue, issue_delete, recorded_version, EntityHandler, ReconcileContext};
use crate::error::{ReconcileError, ReconcileResult};
use crate::outcome::ApplyStatus;
use crate::rpc::{TransitCommand, TransitRpc};
use crate::types::{parse_ip, CidrBlock, TunnelId};
use async_trait::async_trait;
use netagent_goalstate::{EntityKind, OperationType, SubnetConfiguration};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Translates subnet states into transit switching scope commands.
pub struct SubnetHandler {
    rpc: Arc<dyn TransitRpc>,
}

impl SubnetHandler {
    pub fn new(rpc: Arc<dyn TransitRpc>) -> Self {
        Self { rpc }
    }

    #[instrument(skip(self, config, ctx), fields(id = %config.id))]
    async fn upsert(
        &self,
        op: OperationType,
        config: &SubnetConfiguration,
        ctx: &ReconcileContext<'_>,
    ) -> ReconcileResult<ApplyStatus> {
        let command = translate(config)?;

        // Parents went first in dispatch order; an ancestor missing from
        // this message may simply pre-exist in the dataplane.
        if !config.vpc_id.is_empty() && ctx.vpc(&config.vpc_id).is_none() {
            debug!(vpc_id = %config.vpc_id, "parent vpc not carried in this goal state");
        }

        let gate = check_version(
            self.rpc.as_ref(),
            EntityKind::Subnet,
            &config.id,
            op,
            config.version,
        )
        .await?;
        if let Some(status) = gate {
            return Ok(status);
        }

        issue(self.rpc.as_ref(), &command).await?;
        info!(version = config.version, "subnet programmed");
        Ok(ApplyStatus::Programmed { commands: 1 })
    }

    #[instrument(skip(self))]
    async fn remove(&self, id: &str) -> ReconcileResult<ApplyStatus> {
        let command = TransitCommand::DeleteSubnet { id: id.to_string() };
        if issue_delete(self.rpc.as_ref(), &command).await? {
            info!("subnet removed");
            Ok(ApplyStatus::Programmed { commands: 1 })
        } else {
            debug!("subnet already absent");
            Ok(ApplyStatus::Unchanged)
        }
    }

    async fn query(&self, config: &SubnetConfiguration) -> ReconcileResult<ApplyStatus> {
        let version = recorded_version(self.rpc.as_ref(), EntityKind::Subnet, &config.id).await?;
        debug!(id = %config.id, ?version, "subnet state fetched");
        Ok(ApplyStatus::Fetched)
    }
}

fn translate(config: &SubnetConfiguration) -> ReconcileResult<TransitCommand> {
    if config.cidr.is_empty() {
        return Err(ReconcileError::validation(format!(
            "subnet {} carries no cidr",
            config.id
        )));
    }
    let cidr: CidrBlock = config.cidr.parse()?;
    let tunnel_id = TunnelId::from_wire(config.tunnel_id)?;

    let mut switch_ips = Vec::with_capacity(config.transit_switch_ips.len());
    for entry in &config.transit_switch_ips {
        switch_ips.push(parse_ip(&entry.ip_address)?);
    }

    Ok(TransitCommand::UpdateSubnet {
        id: config.id.clone(),
        version: config.version,
        tunnel_id,
        cidr,
        switch_ips,
    })
}

#[async_trait]
impl EntityHandler for SubnetHandler {
    type Config = SubnetConfiguration;

    async fn apply(
        &self,
        op: OperationType,
        config: &SubnetConfiguration,
        ctx: &ReconcileContext<'_>,
    ) -> ReconcileResult<ApplyStatus> {
        match op {
            OperationType::Create | OperationType::Update => self.upsert(op, config, ctx).await,
            OperationType::CreateUpdateSwitch => Err(ReconcileError::validation(format!(
                "create_update_switch is not valid for subnet {}",
                config.id
            ))),
            OperationType::Delete => self.remove(&config.id).await,
            OperationType::Get | OperationType::Info => self.query(config).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::MockTransitClient;
    use netagent_goalstate::{GoalState, TransitSwitchIp};
    use pretty_assertions::assert_eq;
    use std::net::IpAddr;

    fn setup() -> (Arc<MockTransitClient>, SubnetHandler) {
        let mock = Arc::new(MockTransitClient::new());
        let handler = SubnetHandler::new(mock.clone());
        (mock, handler)
    }

    fn config(id: &str, version: u32) -> SubnetConfiguration {
        SubnetConfiguration {
            id: id.to_string(),
            version,
            project_id: "proj-1".to_string(),
            vpc_id: "vpc-1".to_string(),
            cidr: "10.0.0.1/16".to_string(),
            tunnel_id: 22222,
            transit_switch_ips: vec![TransitSwitchIp {
                ip_address: "172.0.0.12".to_string(),
            }],
            ..Default::default()
        }
    }

    fn empty_ctx(gs: &GoalState) -> ReconcileContext<'_> {
        ReconcileContext::from_goal_state(gs)
    }

    #[tokio::test]
    async fn test_create_programs_subnet() {
        let (mock, handler) = setup();
        let gs = GoalState::default();

        let status = handler
            .apply(OperationType::Create, &config("subnet-1", 1), &empty_ctx(&gs))
            .await
            .unwrap();

        assert_eq!(status, ApplyStatus::Programmed { commands: 1 });
        match &mock.sent()[1] {
            TransitCommand::UpdateSubnet {
                id,
                tunnel_id,
                cidr,
                switch_ips,
                ..
            } => {
                assert_eq!(id, "subnet-1");
                assert_eq!(tunnel_id.map(|t| t.as_u32()), Some(22222));
                assert_eq!(cidr.to_string(), "10.0.0.1/16");
                assert_eq!(switch_ips, &vec!["172.0.0.12".parse::<IpAddr>().unwrap()]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unassigned_tunnel_id_passes() {
        let (mock, handler) = setup();
        let gs = GoalState::default();
        let mut cfg = config("subnet-1", 1);
        cfg.tunnel_id = 0;

        handler
            .apply(OperationType::Create, &cfg, &empty_ctx(&gs))
            .await
            .unwrap();

        match &mock.sent()[1] {
            TransitCommand::UpdateSubnet { tunnel_id, .. } => assert_eq!(*tunnel_id, None),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_update_switch_is_invalid_for_subnet() {
        let (mock, handler) = setup();
        let gs = GoalState::default();

        let err = handler
            .apply(
                OperationType::CreateUpdateSwitch,
                &config("subnet-1", 1),
                &empty_ctx(&gs),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ReconcileError::Validation { .. }));
        assert!(mock.sent().is_empty());
    }

    #[tokio::test]
    async fn test_bad_switch_ip_rejected() {
        let (mock, handler) = setup();
        let gs = GoalState::default();
        let mut cfg = config("subnet-1", 1);
        cfg.transit_switch_ips[0].ip_address = "not-an-ip".to_string();

        let err = handler
            .apply(OperationType::Create, &cfg, &empty_ctx(&gs))
            .await
            .unwrap_err();

        assert!(matches!(err, ReconcileError::Validation { .. }));
        assert!(mock.sent().is_empty());
    }

    #[tokio::test]
    async fn test_stale_update_issues_no_mutation() {
        let (mock, handler) = setup();
        let gs = GoalState::default();
        mock.set_version(EntityKind::Subnet, "subnet-1", 2);

        let err = handler
            .apply(OperationType::Update, &config("subnet-1", 2), &empty_ctx(&gs))
            .await
            .unwrap_err();

        assert_eq!(err, ReconcileError::stale_version(2, 2));
        assert_eq!(mock.mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_delete_unknown_subnet_succeeds() {
        let (mock, handler) = setup();
        let gs = GoalState::default();

        let status = handler
            .apply(OperationType::Delete, &config("subnet-9", 1), &empty_ctx(&gs))
            .await
            .unwrap();

        assert_eq!(status, ApplyStatus::Unchanged);
        assert_eq!(mock.sent_names(), vec!["delete_subnet"]);
    }

    #[tokio::test]
    async fn test_info_is_read_only() {
        let (mock, handler) = setup();
        let gs = GoalState::default();

        let status = handler
            .apply(OperationType::Info, &config("subnet-1", 1), &empty_ctx(&gs))
            .await
            .unwrap();

        assert_eq!(status, ApplyStatus::Fetched);
        assert_eq!(mock.mutation_count(), 0);
    }
}
