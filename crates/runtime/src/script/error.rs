use haunts_core::{ErrorSeverity, GameError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    #[error("failed to read script {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("script does not compile: {0}")]
    Compile(String),

    #[error("{callback} failed: {message}")]
    Runtime { callback: String, message: String },

    #[error("{callback} did not finish within {secs}s")]
    Timeout { callback: String, secs: u64 },

    #[error("script thread is gone")]
    Disconnected,

    #[error("bridge is busy running {0}")]
    Busy(String),

    #[error("bad saved state: {0}")]
    SavedState(String),
}

impl GameError for ScriptError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Read { .. } | Self::Compile(_) => ErrorSeverity::Fatal,
            Self::Disconnected => ErrorSeverity::Internal,
            Self::Busy(_) | Self::SavedState(_) => ErrorSeverity::Validation,
            Self::Runtime { .. } | Self::Timeout { .. } => ErrorSeverity::Recoverable,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::Read { .. } => "SCRIPT_READ",
            Self::Compile(_) => "SCRIPT_COMPILE",
            Self::Runtime { .. } => "SCRIPT_RUNTIME",
            Self::Timeout { .. } => "SCRIPT_TIMEOUT",
            Self::Disconnected => "SCRIPT_DISCONNECTED",
            Self::Busy(_) => "SCRIPT_BUSY",
            Self::SavedState(_) => "SCRIPT_SAVED_STATE",
        }
    }
}
