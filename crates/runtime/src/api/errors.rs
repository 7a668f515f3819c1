//! Unified error type surfaced by the runtime API.
//!
//! Wraps failures from the script bridge, peer sync, save slots and the core
//! so hosts can bubble them up with consistent context.
use haunts_core::{ErrorSeverity, ExecCodecError, GameError, SaveError, SpatialError};
use thiserror::Error;

pub use crate::net::NetError;
pub use crate::repository::RepositoryError;
pub use crate::script::ScriptError;

pub type Result<T> = std::result::Result<T, RuntimeError>;

impl RuntimeError {
    pub(crate) fn content(err: anyhow::Error) -> Self {
        Self::Content(format!("{err:#}"))
    }
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Script(#[from] ScriptError),

    #[error(transparent)]
    Net(#[from] NetError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Save(#[from] SaveError),

    #[error(transparent)]
    Spatial(#[from] SpatialError),

    #[error(transparent)]
    Codec(#[from] ExecCodecError),

    #[error("runtime requires {0} to be configured before building")]
    Missing(&'static str),

    /// Content that failed to load, with its context chain.
    #[error("content: {0}")]
    Content(String),

    #[error("no save in slot {0}")]
    EmptySlot(String),
}

impl GameError for RuntimeError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Script(e) => e.severity(),
            Self::Net(e) => e.severity(),
            Self::Save(e) => e.severity(),
            Self::Spatial(e) => e.severity(),
            Self::Codec(e) => e.severity(),
            Self::Repository(_) | Self::EmptySlot(_) | Self::Content(_) => {
                ErrorSeverity::Recoverable
            }
            Self::Missing(_) => ErrorSeverity::Fatal,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::Script(e) => e.error_code(),
            Self::Net(e) => e.error_code(),
            Self::Save(e) => e.error_code(),
            Self::Spatial(e) => e.error_code(),
            Self::Codec(e) => e.error_code(),
            Self::Repository(_) => "RUNTIME_REPOSITORY",
            Self::Missing(_) => "RUNTIME_MISSING",
            Self::Content(_) => "RUNTIME_CONTENT",
            Self::EmptySlot(_) => "RUNTIME_EMPTY_SLOT",
        }
    }
}
