use haunts_core::{ErrorSeverity, GameError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetError {
    #[error("server unreachable: {0}")]
    Unreachable(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("unknown game {0}")]
    UnknownGame(String),

    #[error("gave up waiting for round {0}")]
    Timeout(u32),

    #[error("net id store: {0}")]
    Store(String),
}

impl NetError {
    /// Worth retrying after a backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unreachable(_))
    }
}

impl GameError for NetError {
    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Recoverable
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::Unreachable(_) => "NET_UNREACHABLE",
            Self::Malformed(_) => "NET_MALFORMED",
            Self::Rejected(_) => "NET_REJECTED",
            Self::UnknownGame(_) => "NET_UNKNOWN_GAME",
            Self::Timeout(_) => "NET_TIMEOUT",
            Self::Store(_) => "NET_ID_STORE",
        }
    }
}
