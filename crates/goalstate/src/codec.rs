//! Goal state codec: wire decode plus structural validation.
//!
//! [`decode`] is the only way bytes become a [`GoalState`]; a message that
//! clears it is structurally sound, so downstream handlers never see an
//! unknown operation tag or a mutating state without a configuration.
//! Cross-entity references are deliberately not checked here, that is the
//! dispatcher's job.

use crate::model::{EntityKind, EntityState, GoalState};
use prost::Message;

/// Rejection reasons for an incoming goal state buffer.
///
/// Any of these aborts the whole message before dispatch; per-entity
/// failures are a dispatcher concern, not a codec one.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The buffer is not a valid wire encoding of a goal state.
    #[error("malformed goal state message: {0}")]
    Malformed(#[from] prost::DecodeError),

    /// An entity state carries an operation value outside the known set.
    #[error("unknown operation type {value} on a {kind} state")]
    UnknownOperation { kind: EntityKind, value: i32 },

    /// A mutating entity state carries no configuration payload.
    #[error("{kind} state at index {index} has no configuration")]
    MissingConfiguration { kind: EntityKind, index: usize },

    /// An entity configuration has an empty id.
    #[error("{kind} configuration at index {index} has an empty id")]
    EmptyEntityId { kind: EntityKind, index: usize },
}

/// Encodes a goal state into bare message bytes (one UDP datagram's worth).
///
/// Encoding is deterministic: fields are emitted in tag order, repeated
/// entries in insertion order.
pub fn encode(goal_state: &GoalState) -> Vec<u8> {
    goal_state.encode_to_vec()
}

/// Encodes a goal state with a leading varint length, for stream transports.
pub fn encode_length_delimited(goal_state: &GoalState) -> Vec<u8> {
    goal_state.encode_length_delimited_to_vec()
}

/// Decodes and validates a bare goal state message.
///
/// # Errors
///
/// Returns a [`DecodeError`] when the buffer is not a valid encoding or any
/// entity state fails structural validation. No partially valid goal state
/// is ever returned.
pub fn decode(buf: &[u8]) -> Result<GoalState, DecodeError> {
    let goal_state = GoalState::decode(buf)?;
    validate(&goal_state)?;
    Ok(goal_state)
}

/// Decodes and validates a length-delimited goal state message.
pub fn decode_length_delimited(buf: &[u8]) -> Result<GoalState, DecodeError> {
    let goal_state = GoalState::decode_length_delimited(buf)?;
    validate(&goal_state)?;
    Ok(goal_state)
}

fn validate(goal_state: &GoalState) -> Result<(), DecodeError> {
    validate_states(&goal_state.vpc_states)?;
    validate_states(&goal_state.subnet_states)?;
    validate_states(&goal_state.port_states)?;
    Ok(())
}

fn validate_states<S: EntityState>(states: &[S]) -> Result<(), DecodeError> {
    for (index, state) in states.iter().enumerate() {
        let op = state.operation().ok_or(DecodeError::UnknownOperation {
            kind: S::KIND,
            value: state.operation_raw(),
        })?;

        // GET and INFO are reads; a missing payload there is tolerated and
        // handled downstream as a diagnostic query.
        if op.is_query() {
            continue;
        }

        match state.entity_id() {
            None => {
                return Err(DecodeError::MissingConfiguration {
                    kind: S::KIND,
                    index,
                })
            }
            Some(id) if id.is_empty() => {
                return Err(DecodeError::EmptyEntityId {
                    kind: S::KIND,
                    index,
                })
            }
            Some(_) => {}
        }
    }
    Ok(())
}
