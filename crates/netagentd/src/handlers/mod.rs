//! Per-kind entity handlers.
//!
//! Each handler translates validated goal state configurations into transit
//! daemon commands for one entity kind. Handlers are stateless apart from
//! the shared RPC client; everything an apply needs travels in as arguments.

mod port;
mod subnet;
mod vpc;

pub use port::PortHandler;
pub use subnet::SubnetHandler;
pub use vpc::VpcHandler;

use crate::error::{ReconcileError, ReconcileResult};
use crate::outcome::ApplyStatus;
use crate::rpc::{TransitCommand, TransitRpc};
use async_trait::async_trait;
use netagent_goalstate::{EntityKind, GoalState, OperationType, SubnetConfiguration, VpcConfiguration};
use std::collections::HashMap;
use tracing::debug;

/// Same-message lookup context handed to every handler.
///
/// Indexes the subnet and VPC configurations one goal state carries, so a
/// port can resolve its fixed IP subnets without any global store. Nothing
/// here outlives the message.
pub struct ReconcileContext<'a> {
    subnets: HashMap<&'a str, &'a SubnetConfiguration>,
    vpcs: HashMap<&'a str, &'a VpcConfiguration>,
}

impl<'a> ReconcileContext<'a> {
    /// Indexes the configurations carried by one goal state.
    pub fn from_goal_state(goal_state: &'a GoalState) -> Self {
        let mut subnets = HashMap::new();
        for state in &goal_state.subnet_states {
            if let Some(cfg) = &state.configuration {
                subnets.insert(cfg.id.as_str(), cfg);
            }
        }
        let mut vpcs = HashMap::new();
        for state in &goal_state.vpc_states {
            if let Some(cfg) = &state.configuration {
                vpcs.insert(cfg.id.as_str(), cfg);
            }
        }
        Self { subnets, vpcs }
    }

    /// Looks up a subnet configuration from this message by id.
    pub fn subnet(&self, id: &str) -> Option<&'a SubnetConfiguration> {
        self.subnets.get(id).copied()
    }

    /// Looks up a VPC configuration from this message by id.
    pub fn vpc(&self, id: &str) -> Option<&'a VpcConfiguration> {
        self.vpcs.get(id).copied()
    }
}

/// Applies one operation for one entity kind.
#[async_trait]
pub trait EntityHandler: Send + Sync {
    /// Configuration family this handler accepts.
    type Config;

    /// Applies `op` for the given configuration.
    ///
    /// Must be idempotent: re-applying already-programmed state reports
    /// [`ApplyStatus::Unchanged`] rather than failing or reprogramming.
    async fn apply(
        &self,
        op: OperationType,
        config: &Self::Config,
        ctx: &ReconcileContext<'_>,
    ) -> ReconcileResult<ApplyStatus>;
}

/// Reads the version the daemon last applied for an entity.
///
/// A not-found ack means the daemon has never seen the entity.
pub(crate) async fn recorded_version(
    rpc: &dyn TransitRpc,
    kind: EntityKind,
    id: &str,
) -> ReconcileResult<Option<u32>> {
    let ack = rpc
        .send(&TransitCommand::QueryVersion {
            kind,
            id: id.to_string(),
        })
        .await?;
    if ack.is_not_found() {
        return Ok(None);
    }
    if !ack.is_ok() {
        return Err(ReconcileError::rejected(
            ack.code,
            ack.message.unwrap_or_default(),
        ));
    }
    Ok(ack.version)
}

/// Shared version gate for mutating operations.
///
/// Returns `Ok(None)` when programming should proceed, `Ok(Some(status))`
/// when the desired revision is already in place, and an error when the
/// proposal is stale or the version is missing. The only RPC issued here is
/// the read-only version query.
pub(crate) async fn check_version(
    rpc: &dyn TransitRpc,
    kind: EntityKind,
    id: &str,
    op: OperationType,
    proposed: u32,
) -> ReconcileResult<Option<ApplyStatus>> {
    if proposed == 0 {
        return Err(ReconcileError::validation(format!(
            "{kind} {id} carries no version"
        )));
    }

    let recorded = recorded_version(rpc, kind, id).await?;
    match op {
        OperationType::Create | OperationType::CreateUpdateSwitch => match recorded {
            Some(current) if current == proposed => {
                debug!(%kind, id, version = proposed, "already at requested version");
                Ok(Some(ApplyStatus::Unchanged))
            }
            Some(current) if current > proposed => {
                Err(ReconcileError::stale_version(proposed, current))
            }
            _ => Ok(None),
        },
        OperationType::Update => match recorded {
            // An update must strictly advance the revision.
            Some(current) if proposed <= current => {
                Err(ReconcileError::stale_version(proposed, current))
            }
            _ => Ok(None),
        },
        _ => Ok(None),
    }
}

/// Issues one programming command and maps the ack.
pub(crate) async fn issue(
    rpc: &dyn TransitRpc,
    command: &TransitCommand,
) -> ReconcileResult<()> {
    let ack = rpc.send(command).await?;
    if ack.is_ok() {
        Ok(())
    } else {
        Err(ReconcileError::rejected(
            ack.code,
            ack.message.unwrap_or_default(),
        ))
    }
}

/// Issues a removal command; not-found acks count as already gone.
///
/// Returns true when the daemon actually removed state.
pub(crate) async fn issue_delete(
    rpc: &dyn TransitRpc,
    command: &TransitCommand,
) -> ReconcileResult<bool> {
    let ack = rpc.send(command).await?;
    if ack.is_ok() {
        Ok(true)
    } else if ack.is_not_found() {
        Ok(false)
    } else {
        Err(ReconcileError::rejected(
            ack.code,
            ack.message.unwrap_or_default(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::MockTransitClient;
    use netagent_goalstate::{SubnetState, VpcState};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_context_indexes_configurations() {
        let gs = GoalState {
            vpc_states: vec![VpcState {
                operation_type: OperationType::Create as i32,
                configuration: Some(VpcConfiguration {
                    id: "vpc-1".to_string(),
                    ..Default::default()
                }),
            }],
            subnet_states: vec![SubnetState {
                operation_type: OperationType::Create as i32,
                configuration: Some(SubnetConfiguration {
                    id: "subnet-1".to_string(),
                    cidr: "10.0.0.0/24".to_string(),
                    ..Default::default()
                }),
            }],
            ..Default::default()
        };

        let ctx = ReconcileContext::from_goal_state(&gs);
        assert_eq!(ctx.subnet("subnet-1").map(|s| s.cidr.as_str()), Some("10.0.0.0/24"));
        assert!(ctx.subnet("subnet-2").is_none());
        assert!(ctx.vpc("vpc-1").is_some());
    }

    #[tokio::test]
    async fn test_version_gate_create() {
        let mock = MockTransitClient::new();

        // Daemon has never seen the entity.
        let gate = check_version(&mock, EntityKind::Vpc, "v", OperationType::Create, 1)
            .await
            .unwrap();
        assert_eq!(gate, None);

        // Same version already applied.
        mock.set_version(EntityKind::Vpc, "v", 1);
        let gate = check_version(&mock, EntityKind::Vpc, "v", OperationType::Create, 1)
            .await
            .unwrap();
        assert_eq!(gate, Some(ApplyStatus::Unchanged));

        // Daemon is ahead.
        mock.set_version(EntityKind::Vpc, "v", 5);
        let err = check_version(&mock, EntityKind::Vpc, "v", OperationType::Create, 1)
            .await
            .unwrap_err();
        assert_eq!(err, ReconcileError::stale_version(1, 5));
    }

    #[tokio::test]
    async fn test_version_gate_update_requires_advance() {
        let mock = MockTransitClient::new();
        mock.set_version(EntityKind::Port, "p", 3);

        let err = check_version(&mock, EntityKind::Port, "p", OperationType::Update, 3)
            .await
            .unwrap_err();
        assert_eq!(err, ReconcileError::stale_version(3, 3));

        let gate = check_version(&mock, EntityKind::Port, "p", OperationType::Update, 4)
            .await
            .unwrap();
        assert_eq!(gate, None);

        // Unknown entity: the daemon decides, not the agent.
        let gate = check_version(&mock, EntityKind::Port, "other", OperationType::Update, 1)
            .await
            .unwrap();
        assert_eq!(gate, None);
    }

    #[tokio::test]
    async fn test_version_gate_rejects_missing_version() {
        let mock = MockTransitClient::new();
        let err = check_version(&mock, EntityKind::Subnet, "s", OperationType::Create, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::Validation { .. }));
        // Nothing was queried for an unversioned proposal.
        assert!(mock.sent().is_empty());
    }
}
