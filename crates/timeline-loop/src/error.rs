use thiserror::Error;
use timeline_core::TimelineError;
use timeline_llm::LLMError;

#[derive(Error, Debug)]
pub enum TurnError {
    #[error("Message is empty")]
    EmptyInput,

    #[error("A turn is already waiting for a reply")]
    AlreadyInFlight,

    #[error("Turn cancelled")]
    Cancelled { draft: String },

    #[error("The root node has no parent to branch from")]
    NoParentToBranch,

    #[error("Turn stopped unexpectedly: {reason}")]
    Interrupted { draft: String, reason: String },

    #[error("Completion failed: {source}")]
    RemoteCompletionFailed { draft: String, source: LLMError },

    #[error(transparent)]
    Timeline(#[from] TimelineError),
}

impl TurnError {
    /// The unsent user text, when the turn got far enough to have one.
    pub fn draft(&self) -> Option<&str> {
        match self {
            TurnError::Cancelled { draft }
            | TurnError::RemoteCompletionFailed { draft, .. }
            | TurnError::Interrupted { draft, .. } => Some(draft),
            _ => None,
        }
    }
}
