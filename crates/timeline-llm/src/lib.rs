pub mod openai_compat;
pub mod provider;

pub use openai_compat::OpenAICompatProvider;
pub use provider::{CompletionProvider, LLMError, Result};
