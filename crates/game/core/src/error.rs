//! Common error infrastructure for haunts-core.
//!
//! Domain errors (`SpatialError`, `ActionError`, `InvalidExec`, …) live next
//! to the code that raises them. They all implement [`GameError`] so the
//! runtime applies one recovery policy:
//!
//! - asset and network failures are recoverable in place,
//! - an invalid exec is dropped,
//! - registry/type mismatches are fatal to the replay.

use serde::{Deserialize, Serialize};

/// Severity level of an error, used for categorization and recovery strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorSeverity {
    /// Can retry with the same or an alternative input.
    ///
    /// Examples: missing asset, unreachable server
    Recoverable,

    /// Invalid input that is rejected without retry.
    ///
    /// Examples: exec naming a dead entity, insufficient AP
    Validation,

    /// Unexpected state inconsistency; indicates a bug.
    Internal,

    /// Programmer error; the replay cannot continue.
    ///
    /// Examples: exec kind with no registered decoder
    Fatal,
}

impl ErrorSeverity {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Recoverable => "recoverable",
            Self::Validation => "validation",
            Self::Internal => "internal",
            Self::Fatal => "fatal",
        }
    }

    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Recoverable)
    }

    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal)
    }
}

/// Common trait for all haunts-core errors.
pub trait GameError: core::fmt::Display + core::fmt::Debug {
    fn severity(&self) -> ErrorSeverity;

    /// Static identifier for the error variant, for logs and tests.
    fn error_code(&self) -> &'static str {
        core::any::type_name::<Self>()
    }
}
