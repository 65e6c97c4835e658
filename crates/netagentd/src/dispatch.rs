//! Goal state reconciliation dispatcher.
//!
//! The [`Reconciler`] walks one decoded goal state, hands every entity state
//! to its kind's handler in dependency order, and folds the per-entity
//! results into an [`AggregateResult`]. A failing entity never stops its
//! siblings; every outcome lands in the aggregate.

use crate::error::ReconcileError;
use crate::handlers::{EntityHandler, PortHandler, ReconcileContext, SubnetHandler, VpcHandler};
use crate::outcome::{AggregateResult, AggregateStatus, ApplyStatus, EntityOutcome};
use crate::rpc::TransitRpc;
use netagent_goalstate::{
    decode, DecodeError, EntityState, GoalState, PortState, SubnetState, VpcState,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Cumulative reconciliation counters across goal states.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    /// Goal state messages applied.
    pub goal_states: u64,
    /// Entities that changed dataplane state.
    pub programmed: u64,
    /// Entities already at their desired state (including already-gone deletes).
    pub unchanged: u64,
    /// Read-only operations served.
    pub fetched: u64,
    /// Entities whose apply failed.
    pub failed: u64,
    /// Entities never dispatched because shutdown began first.
    pub cancelled: u64,
}

impl ReconcileStats {
    /// Total entity states seen.
    pub fn entities(&self) -> u64 {
        self.programmed + self.unchanged + self.fetched + self.failed + self.cancelled
    }

    fn record(&mut self, outcome: &EntityOutcome) {
        match &outcome.result {
            Ok(ApplyStatus::Programmed { .. }) => self.programmed += 1,
            Ok(ApplyStatus::Unchanged) => self.unchanged += 1,
            Ok(ApplyStatus::Fetched) => self.fetched += 1,
            Err(ReconcileError::Cancelled) => self.cancelled += 1,
            Err(_) => self.failed += 1,
        }
    }
}

/// One entity state waiting for dispatch, tagged by kind.
enum WorkItem<'a> {
    Vpc(&'a VpcState),
    Subnet(&'a SubnetState),
    Port(&'a PortState),
}

/// Applies goal states to the dataplane through the per-kind handlers.
///
/// Entity kinds are processed in dependency order: upserts and queries walk
/// down the chain (VPC, subnet, port) so parents are in place before
/// children reference them; deletes walk back up (port, subnet, VPC) so no
/// parent disappears under a child. Within one kind, the insertion order of
/// the decoded message is preserved.
pub struct Reconciler {
    vpc: VpcHandler,
    subnet: SubnetHandler,
    port: PortHandler,
    cancel: CancellationToken,
    stats: ReconcileStats,
}

impl Reconciler {
    /// Creates a reconciler that is never cancelled externally.
    pub fn new(rpc: Arc<dyn TransitRpc>) -> Self {
        Self::with_cancellation(rpc, CancellationToken::new())
    }

    /// Creates a reconciler that stops dispatching once `cancel` fires.
    ///
    /// Cancellation is cooperative: the entity whose RPC exchange is in
    /// flight finishes (or times out) normally, and every entity not yet
    /// dispatched is recorded with a [`ReconcileError::Cancelled`] outcome.
    pub fn with_cancellation(rpc: Arc<dyn TransitRpc>, cancel: CancellationToken) -> Self {
        Self {
            vpc: VpcHandler::new(rpc.clone()),
            subnet: SubnetHandler::new(rpc.clone()),
            port: PortHandler::new(rpc),
            cancel,
            stats: ReconcileStats::default(),
        }
    }

    /// Counters accumulated over every goal state this reconciler applied.
    pub fn stats(&self) -> ReconcileStats {
        self.stats
    }

    /// Decodes one goal state buffer and applies it.
    ///
    /// # Errors
    ///
    /// Returns the [`DecodeError`] when the buffer is rejected; nothing is
    /// dispatched in that case.
    pub async fn apply_buffer(&mut self, buf: &[u8]) -> Result<AggregateResult, DecodeError> {
        let goal_state = decode(buf)?;
        Ok(self.apply(&goal_state).await)
    }

    /// Applies one decoded goal state and returns every entity's outcome.
    pub async fn apply(&mut self, goal_state: &GoalState) -> AggregateResult {
        info!(
            vpcs = goal_state.vpc_states.len(),
            subnets = goal_state.subnet_states.len(),
            ports = goal_state.port_states.len(),
            "applying goal state"
        );

        let ctx = ReconcileContext::from_goal_state(goal_state);
        let plan = build_plan(goal_state);

        let mut outcomes = Vec::with_capacity(plan.len());
        for item in plan {
            let outcome = if self.cancel.is_cancelled() {
                skipped(&item)
            } else {
                match item {
                    WorkItem::Vpc(state) => run_state(&self.vpc, state, &ctx).await,
                    WorkItem::Subnet(state) => run_state(&self.subnet, state, &ctx).await,
                    WorkItem::Port(state) => run_state(&self.port, state, &ctx).await,
                }
            };
            self.stats.record(&outcome);
            outcomes.push(outcome);
        }
        self.stats.goal_states += 1;

        let result = AggregateResult::from_outcomes(outcomes);
        match result.status {
            AggregateStatus::Success => {
                info!(entities = result.outcomes.len(), "goal state applied");
            }
            AggregateStatus::PartialFailure | AggregateStatus::Failure => {
                warn!(
                    succeeded = result.succeeded(),
                    failed = result.failed(),
                    "goal state applied with failures"
                );
            }
        }
        result
    }
}

/// Orders one goal state's entity states into dispatch order.
fn build_plan(goal_state: &GoalState) -> Vec<WorkItem<'_>> {
    let mut plan = Vec::with_capacity(goal_state.entity_count());

    // Upserts and queries: parents before children.
    plan.extend(upserts(&goal_state.vpc_states).map(WorkItem::Vpc));
    plan.extend(upserts(&goal_state.subnet_states).map(WorkItem::Subnet));
    plan.extend(upserts(&goal_state.port_states).map(WorkItem::Port));

    // Deletes: children before parents.
    plan.extend(deletes(&goal_state.port_states).map(WorkItem::Port));
    plan.extend(deletes(&goal_state.subnet_states).map(WorkItem::Subnet));
    plan.extend(deletes(&goal_state.vpc_states).map(WorkItem::Vpc));

    plan
}

fn is_delete<S: EntityState>(state: &S) -> bool {
    state.operation().is_some_and(|op| op.is_delete())
}

fn upserts<S: EntityState>(states: &[S]) -> impl Iterator<Item = &S> {
    states.iter().filter(|s| !is_delete(*s))
}

fn deletes<S: EntityState>(states: &[S]) -> impl Iterator<Item = &S> {
    states.iter().filter(|s| is_delete(*s))
}

/// Dispatches one entity state to its handler and records the outcome.
async fn run_state<S, H>(handler: &H, state: &S, ctx: &ReconcileContext<'_>) -> EntityOutcome
where
    S: EntityState,
    H: EntityHandler<Config = S::Config>,
{
    let operation = state.operation();
    let id = state.entity_id().unwrap_or_default().to_string();

    let result = match (operation, state.configuration()) {
        (Some(op), Some(config)) => handler.apply(op, config, ctx).await,
        // A query without a payload carries nothing to fetch; tolerated as a
        // bare diagnostic probe.
        (Some(op), None) if op.is_query() => {
            debug!(kind = %S::KIND, "query carries no configuration, nothing to fetch");
            Ok(ApplyStatus::Fetched)
        }
        // Only reachable for goal states built in process; decoded messages
        // were already screened by the codec.
        (Some(op), None) => Err(ReconcileError::validation(format!(
            "{} {op} state carries no configuration",
            S::KIND
        ))),
        (None, _) => Err(ReconcileError::validation(format!(
            "{} state carries unknown operation value {}",
            S::KIND,
            state.operation_raw()
        ))),
    };

    if let Err(e) = &result {
        warn!(kind = %S::KIND, id, error = %e, "entity apply failed");
    }
    EntityOutcome {
        kind: S::KIND,
        id,
        operation,
        result,
    }
}

/// Outcome for an entity that was never dispatched due to shutdown.
fn skipped(item: &WorkItem<'_>) -> EntityOutcome {
    let (kind, id, operation) = match item {
        WorkItem::Vpc(s) => (VpcState::KIND, s.entity_id(), s.operation()),
        WorkItem::Subnet(s) => (SubnetState::KIND, s.entity_id(), s.operation()),
        WorkItem::Port(s) => (PortState::KIND, s.entity_id(), s.operation()),
    };
    debug!(%kind, id = id.unwrap_or_default(), "entity skipped, shutdown in progress");
    EntityOutcome {
        kind,
        id: id.unwrap_or_default().to_string(),
        operation,
        result: Err(ReconcileError::Cancelled),
    }
}
