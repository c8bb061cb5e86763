use serde::{ser::SerializeStruct, Serialize, Serializer};
use thiserror::Error;

use crate::upstream::{EndpointKey, FailureClass, UpstreamError};

/// Errors recorded by the synchronization layer.
///
/// These never propagate out of a refresh cycle. They are attached to fetch outcomes and
/// surfaced through [`SyncState::last_error`](super::SyncState) so consumers can display them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Network failure, timeout or non-2xx status after the retry budget was spent.
    #[error("transport failure on {endpoint}: {message}")]
    Transport { endpoint: EndpointKey, message: String },

    /// `success=false`, missing data, or a payload that does not decode.
    #[error("envelope rejected on {endpoint}: {message}")]
    Envelope { endpoint: EndpointKey, message: String },

    /// A cycle finished without refreshing any domain. Cached values are kept.
    #[error("no domains updated ({attempted} sources attempted): {detail}")]
    TotalSyncFailure { attempted: usize, detail: String },

    /// Automatic polling stopped after too many consecutive failed cycles.
    #[error("scheduler paused after {failures} consecutive failures")]
    SchedulerPaused { failures: u32 },
}

impl SyncError {
    /// Converts an upstream error into a per-endpoint outcome error.
    #[must_use]
    pub fn from_upstream(endpoint: EndpointKey, error: &UpstreamError) -> Self {
        let message = error.to_string();
        match error.class() {
            FailureClass::Transport => Self::Transport { endpoint, message },
            FailureClass::Envelope => Self::Envelope { endpoint, message },
        }
    }

    /// Payload decoding failure for `endpoint`.
    #[must_use]
    pub fn malformed(endpoint: EndpointKey, error: &serde_json::Error) -> Self {
        Self::Envelope { endpoint, message: format!("malformed payload: {error}") }
    }

    /// Returns a static string representation for metrics labels and API responses.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "transport",
            Self::Envelope { .. } => "envelope",
            Self::TotalSyncFailure { .. } => "total_sync_failure",
            Self::SchedulerPaused { .. } => "scheduler_paused",
        }
    }
}

impl Serialize for SyncError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("SyncError", 2)?;
        state.serialize_field("kind", self.kind())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}
