//! Per-entity and aggregate reconciliation outcomes.

use crate::error::ReconcileError;
use netagent_goalstate::{EntityKind, OperationType};
use serde::Serialize;
use serde_json::json;

/// What applying one entity state did to the dataplane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyStatus {
    /// State was changed; carries the number of programming commands issued.
    Programmed { commands: usize },
    /// Desired state already in place, nothing was issued.
    Unchanged,
    /// Read-only operation completed.
    Fetched,
}

impl ApplyStatus {
    fn label(&self) -> &'static str {
        match self {
            ApplyStatus::Programmed { .. } => "programmed",
            ApplyStatus::Unchanged => "unchanged",
            ApplyStatus::Fetched => "fetched",
        }
    }
}

/// Result of one entity state within a goal state message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityOutcome {
    pub kind: EntityKind,
    pub id: String,
    /// `None` when the state carried an operation value outside the known
    /// set (possible only for goal states that bypassed the codec).
    pub operation: Option<OperationType>,
    pub result: Result<ApplyStatus, ReconcileError>,
}

impl EntityOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    fn to_json(&self) -> serde_json::Value {
        let mut entry = json!({
            "kind": self.kind,
            "id": self.id,
            "operation": self.operation,
        });
        match &self.result {
            Ok(status) => {
                entry["status"] = json!(status.label());
                if let ApplyStatus::Programmed { commands } = status {
                    entry["commands"] = json!(commands);
                }
            }
            Err(e) => {
                entry["status"] = json!("failed");
                entry["error"] = json!(e.to_string());
                entry["retryable"] = json!(e.is_retryable());
            }
        }
        entry
    }
}

/// Rollup over every entity outcome of one goal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateStatus {
    /// Every entity applied (or the message was empty).
    Success,
    /// Some entities applied, some failed.
    PartialFailure,
    /// Every entity failed.
    Failure,
}

/// Aggregate result of applying one goal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateResult {
    pub status: AggregateStatus,
    /// One record per entity state, in dispatch order.
    pub outcomes: Vec<EntityOutcome>,
}

impl AggregateResult {
    /// Derives the rollup status from the per-entity records.
    pub fn from_outcomes(outcomes: Vec<EntityOutcome>) -> Self {
        let total = outcomes.len();
        let failed = outcomes.iter().filter(|o| !o.is_success()).count();
        let status = if failed == 0 {
            AggregateStatus::Success
        } else if failed == total {
            AggregateStatus::Failure
        } else {
            AggregateStatus::PartialFailure
        };
        Self { status, outcomes }
    }

    /// Number of entities that applied.
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    /// Number of entities that failed.
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// JSON summary sent back to the goal state sender and logged.
    pub fn summary_json(&self) -> serde_json::Value {
        json!({
            "status": self.status,
            "entities": self.outcomes.iter().map(EntityOutcome::to_json).collect::<Vec<_>>(),
        })
    }
}
