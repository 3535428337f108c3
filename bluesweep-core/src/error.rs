use crate::platform::PlatformError;

/// Which discovery channel a source covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Classic,
    Ble,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Classic => f.write_str("classic"),
            Self::Ble => f.write_str("ble"),
        }
    }
}

/// A discovery source failed to start or stop. Always contained by the
/// session: logged, never shown to the user.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("{kind} discovery failed to start: {error}")]
    Start {
        kind: SourceKind,
        #[source]
        error: PlatformError,
    },

    #[error("{kind} discovery failed to stop: {error}")]
    Stop {
        kind: SourceKind,
        #[source]
        error: PlatformError,
    },
}

impl SourceError {
    pub fn kind(&self) -> SourceKind {
        match self {
            Self::Start { kind, .. } | Self::Stop { kind, .. } => *kind,
        }
    }
}

/// Session-level failures
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("a scan session is already running")]
    Busy,

    #[error("{kind} discovery panicked: {message}")]
    SourcePanicked { kind: SourceKind, message: String },

    #[error("observation intake failed: {0}")]
    Intake(#[from] tokio::task::JoinError),
}
