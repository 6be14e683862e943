use async_trait::async_trait;
use thiserror::Error;
use timeline_core::Message;

#[derive(Error, Debug)]
pub enum LLMError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("API error: {0}")]
    Api(String),

    #[error("Completion response carried no message content")]
    EmptyResponse,
}

pub type Result<T> = std::result::Result<T, LLMError>;

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Sends the ordered transcript and returns the assistant's reply text.
    ///
    /// One request per call. Retries, if any, belong to the caller.
    async fn complete(&self, messages: &[Message]) -> Result<String>;
}
