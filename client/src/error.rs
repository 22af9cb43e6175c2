use shared::{IdsExhausted, ProtocolError};
use tokio_tungstenite::tungstenite;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Too many commands are waiting for acknowledgment.
    #[error("server is not responding: {pending} commands unacknowledged (limit {limit})")]
    Backpressure { pending: usize, limit: usize },
    #[error("connection to the server is closed")]
    Disconnected,
    #[error("websocket failure: {0}")]
    Socket(#[from] tungstenite::Error),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    /// State desynchronization; the current operation cannot continue.
    #[error("internal error: {0}")]
    Internal(String),
    #[error(transparent)]
    Ids(#[from] IdsExhausted),
    /// Some rejected commands could not be undone. The pass still undid
    /// every other command of the rolled back tail.
    #[error("{failed} rolled back commands could not be undone: {first}")]
    Rollback {
        failed: usize,
        first: Box<SyncError>,
    },
}

impl SyncError {
    pub fn internal(message: impl Into<String>) -> Self {
        SyncError::Internal(message.into())
    }

    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            SyncError::Backpressure { .. } | SyncError::Disconnected | SyncError::Socket(_)
        )
    }

    pub fn is_protocol(&self) -> bool {
        matches!(self, SyncError::Protocol(_))
    }

    /// A failed reconciliation pass; the session itself can go on.
    pub fn is_rollback(&self) -> bool {
        matches!(self, SyncError::Rollback { .. })
    }
}
