//! Action errors.
//!
//! [`ActionError`] is raised while preparing an action for the selected
//! entity. [`InvalidExec`] is raised when a committed exec no longer fits the
//! game it is applied to. [`ExecCodecError`] covers the exec wire encoding.

use crate::entity::{EntityId, Side};
use crate::error::{ErrorSeverity, GameError};
use crate::geom::BoardPos;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    #[error("entity {0} not found")]
    EntityNotFound(EntityId),

    #[error("entity {0} is dead")]
    EntityDead(EntityId),

    #[error("entity {ent} has no action {index}")]
    UnknownAction { ent: EntityId, index: usize },

    #[error("not enough AP: need {need}, have {have}")]
    NotEnoughAp { need: i32, have: i32 },

    #[error("out of ammo")]
    OutOfAmmo,

    #[error("no valid targets")]
    NoTargets,

    #[error("it is not {0}'s turn")]
    NotYourTurn(Side),

    #[error("another action is in progress")]
    Busy,
}

impl GameError for ActionError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Busy => ErrorSeverity::Recoverable,
            _ => ErrorSeverity::Validation,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::EntityNotFound(_) => "ACTION_ENTITY_NOT_FOUND",
            Self::EntityDead(_) => "ACTION_ENTITY_DEAD",
            Self::UnknownAction { .. } => "ACTION_UNKNOWN",
            Self::NotEnoughAp { .. } => "ACTION_NOT_ENOUGH_AP",
            Self::OutOfAmmo => "ACTION_OUT_OF_AMMO",
            Self::NoTargets => "ACTION_NO_TARGETS",
            Self::NotYourTurn(_) => "ACTION_NOT_YOUR_TURN",
            Self::Busy => "ACTION_BUSY",
        }
    }
}

/// Reasons a committed exec is dropped instead of applied.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum InvalidExec {
    #[error("entity {0} no longer exists")]
    EntityGone(EntityId),

    #[error("entity {0} is dead")]
    EntityDead(EntityId),

    #[error("entity {ent} has no action {index}")]
    UnknownAction { ent: EntityId, index: usize },

    #[error("action {action} cannot run a {payload} exec")]
    PayloadMismatch {
        action: &'static str,
        payload: &'static str,
    },

    #[error("entity {ent} belongs to {side}, not the side to move")]
    WrongSide { ent: EntityId, side: Side },

    #[error("insufficient AP: need {need}, have {have}")]
    InsufficientAp { need: i32, have: i32 },

    #[error("out of ammo")]
    OutOfAmmo,

    #[error("target {0} is not valid")]
    InvalidTarget(EntityId),

    #[error("{0} is out of range")]
    OutOfRange(BoardPos),

    #[error("{0} is not in line of sight")]
    NoLos(BoardPos),

    #[error("path is empty")]
    EmptyPath,

    #[error("{0} cannot be occupied")]
    Blocked(BoardPos),

    #[error("action cannot be readied")]
    NotReadyable,

    #[error("an exec is already running")]
    Busy,
}

impl GameError for InvalidExec {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Busy => ErrorSeverity::Internal,
            _ => ErrorSeverity::Validation,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::EntityGone(_) => "EXEC_ENTITY_GONE",
            Self::EntityDead(_) => "EXEC_ENTITY_DEAD",
            Self::UnknownAction { .. } => "EXEC_UNKNOWN_ACTION",
            Self::PayloadMismatch { .. } => "EXEC_PAYLOAD_MISMATCH",
            Self::WrongSide { .. } => "EXEC_WRONG_SIDE",
            Self::InsufficientAp { .. } => "EXEC_INSUFFICIENT_AP",
            Self::OutOfAmmo => "EXEC_OUT_OF_AMMO",
            Self::InvalidTarget(_) => "EXEC_INVALID_TARGET",
            Self::OutOfRange(_) => "EXEC_OUT_OF_RANGE",
            Self::NoLos(_) => "EXEC_NO_LOS",
            Self::EmptyPath => "EXEC_EMPTY_PATH",
            Self::Blocked(_) => "EXEC_BLOCKED",
            Self::NotReadyable => "EXEC_NOT_READYABLE",
            Self::Busy => "EXEC_BUSY",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ExecCodecError {
    /// No decoder registered for the kind tag. Fatal to the replay.
    #[error("exec kind {0:?} is not registered")]
    Unregistered(String),

    #[error("failed to encode exec: {0}")]
    Encode(String),

    #[error("failed to decode {kind} exec: {reason}")]
    Decode { kind: String, reason: String },
}

impl GameError for ExecCodecError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Unregistered(_) => ErrorSeverity::Fatal,
            Self::Encode(_) => ErrorSeverity::Internal,
            Self::Decode { .. } => ErrorSeverity::Recoverable,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::Unregistered(_) => "EXEC_CODEC_UNREGISTERED",
            Self::Encode(_) => "EXEC_CODEC_ENCODE",
            Self::Decode { .. } => "EXEC_CODEC_DECODE",
        }
    }
}
